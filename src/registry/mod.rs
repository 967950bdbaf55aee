//! Process-wide option registry
//!
//! Holds every currently known [`ModuleDescriptor`] behind a single
//! read/write lock. Loading takes the lock exclusively for its whole pass;
//! saving takes it shared only while rendering in memory and never while
//! touching the disk.
//!
//! Option names are unique across all registered modules, so a bare key
//! read from the persisted file always resolves to at most one item.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::models::{ModuleDescriptor, OptionItem, OptionKind, OptionValue};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Module already registered: {0}")]
    DuplicateModule(String),
    #[error("Option {option} is already registered by module {owner}")]
    DuplicateOption { option: String, owner: String },
    #[error("Option not found: {0}")]
    OptionNotFound(String),
    #[error("Option {option} holds {expected} values, got {actual}")]
    KindMismatch {
        option: String,
        expected: OptionKind,
        actual: OptionKind,
    },
    #[error("Value {value} for option {option} is outside [{min}, {max}]")]
    OutOfRange {
        option: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("Invalid value for option {option}: {message}")]
    InvalidValue { option: String, message: String },
}

/// Position of an item: (module index, item index)
type Slot = (usize, usize);

/// Lock-protected registry contents
#[derive(Debug, Default)]
pub struct RegistryState {
    modules: Vec<ModuleDescriptor>,
    index: HashMap<String, Slot>,
}

impl RegistryState {
    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn find(&self, name: &str) -> Option<&OptionItem> {
        let (m, i) = *self.index.get(name)?;
        self.modules[m].items().get(i)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut OptionItem> {
        let (m, i) = *self.index.get(name)?;
        self.modules[m].items_mut().get_mut(i)
    }

    /// Object name of the module owning `name`
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        let (m, _) = *self.index.get(name)?;
        Some(self.modules[m].object_name())
    }

    pub fn has_dirty(&self) -> bool {
        self.modules
            .iter()
            .flat_map(|module| module.items())
            .any(OptionItem::is_dirty)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (m, module) in self.modules.iter().enumerate() {
            for (i, item) in module.items().iter().enumerate() {
                self.index.insert(item.name().to_string(), (m, i));
            }
        }
    }
}

/// Shared registry of modules and their options.
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module. Fails if its object name or any of its option names is
    /// already taken.
    pub fn register(&self, module: ModuleDescriptor) -> Result<(), RegistryError> {
        let mut state = self.state.write();

        if state
            .modules
            .iter()
            .any(|m| m.object_name() == module.object_name())
        {
            return Err(RegistryError::DuplicateModule(module.object_name().to_string()));
        }

        let mut seen = HashSet::new();
        for item in module.items() {
            if let Some(owner) = state.owner_of(item.name()) {
                return Err(RegistryError::DuplicateOption {
                    option: item.name().to_string(),
                    owner: owner.to_string(),
                });
            }
            if !seen.insert(item.name()) {
                return Err(RegistryError::DuplicateOption {
                    option: item.name().to_string(),
                    owner: module.object_name().to_string(),
                });
            }
        }

        debug!(
            module = module.object_name(),
            items = module.items().len(),
            "Registered module"
        );

        let m = state.modules.len();
        for (i, item) in module.items().iter().enumerate() {
            state.index.insert(item.name().to_string(), (m, i));
        }
        state.modules.push(module);
        Ok(())
    }

    /// Remove a module. Its section becomes foreign to the next save and is
    /// preserved verbatim.
    pub fn unregister(&self, object_name: &str) -> Option<ModuleDescriptor> {
        let mut state = self.state.write();
        let position = state
            .modules
            .iter()
            .position(|m| m.object_name() == object_name)?;
        let module = state.modules.remove(position);
        state.rebuild_index();
        Some(module)
    }

    pub fn get(&self, name: &str) -> Option<OptionValue> {
        self.state.read().find(name).map(|item| item.value().clone())
    }

    /// Change a value and mark it dirty.
    pub fn set(&self, name: &str, value: impl Into<OptionValue>) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        let item = state
            .find_mut(name)
            .ok_or_else(|| RegistryError::OptionNotFound(name.to_string()))?;
        item.set_value(value.into())
    }

    /// Restore the registration-time default and mark the item dirty.
    pub fn reset(&self, name: &str) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        let item = state
            .find_mut(name)
            .ok_or_else(|| RegistryError::OptionNotFound(name.to_string()))?;
        item.reset();
        Ok(())
    }

    pub fn is_dirty(&self, name: &str) -> Option<bool> {
        self.state.read().find(name).map(OptionItem::is_dirty)
    }

    /// Snapshot of the known module object names, in registration order
    pub fn module_names(&self) -> Vec<String> {
        self.state
            .read()
            .modules
            .iter()
            .map(|m| m.object_name().to_string())
            .collect()
    }

    pub fn has_dirty(&self) -> bool {
        self.state.read().has_dirty()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write()
    }

    /// Clear the dirty flag of each written item whose value has not changed
    /// since it was rendered.
    pub(crate) fn mark_clean(&self, written: &[(String, u64)]) {
        let mut state = self.state.write();
        for (name, revision) in written {
            if let Some(item) = state.find_mut(name) {
                if item.revision() == *revision {
                    item.mark_clean();
                }
            }
        }
    }
}

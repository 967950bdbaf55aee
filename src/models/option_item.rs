//! Option item model
//!
//! A single configurable setting owned by a module: its kind, current and
//! default values, numeric bounds and persistence flags.

use serde::Serialize;
use std::fmt;

use crate::registry::RegistryError;

/// Kind of value an option holds. Fixed when the item is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Boolean,
    Integer,
    Float,
    String,
}

impl OptionKind {
    /// Name used in the `# description (kind)` comment of the persisted file
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Boolean => "boolean",
            OptionKind::Integer => "integer",
            OptionKind::Float => "float",
            OptionKind::String => "string",
        }
    }

    /// Booleans and integers share the integer parser and the bounds check
    pub fn is_integral(&self) -> bool {
        matches!(self, OptionKind::Boolean | OptionKind::Integer)
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed option value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    Float(f32),
    String(String),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Boolean(_) => OptionKind::Boolean,
            OptionValue::Integer(_) => OptionKind::Integer,
            OptionValue::Float(_) => OptionKind::Float,
            OptionValue::String(_) => OptionKind::String,
        }
    }

    /// Integer view used for bounds checks and rendering of integral kinds
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            OptionValue::Boolean(b) => Some(i64::from(*b)),
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            OptionValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Boolean(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<f32> for OptionValue {
    fn from(value: f32) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

/// One configurable setting.
///
/// Invariants: `kind` never changes after construction, and integral values
/// always satisfy `min <= value <= max`.
#[derive(Debug, Clone)]
pub struct OptionItem {
    name: String,
    description: Option<String>,
    value: OptionValue,
    default_value: OptionValue,
    min: i64,
    max: i64,
    removed: bool,
    unsaveable: bool,
    dirty: bool,
    revision: u64,
}

impl OptionItem {
    fn with_value(name: impl Into<String>, value: OptionValue, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            description: None,
            default_value: value.clone(),
            value,
            min,
            max,
            removed: false,
            unsaveable: false,
            dirty: false,
            revision: 0,
        }
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::with_value(name, OptionValue::Boolean(default), 0, 1)
    }

    /// Integer option with the full 64-bit range
    pub fn integer(name: impl Into<String>, default: i64) -> Self {
        Self::with_value(name, OptionValue::Integer(default), i64::MIN, i64::MAX)
    }

    /// Integer option restricted to `[min, max]`
    pub fn integer_range(
        name: impl Into<String>,
        default: i64,
        min: i64,
        max: i64,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if min > max || default < min || default > max {
            return Err(RegistryError::OutOfRange {
                option: name,
                value: default,
                min,
                max,
            });
        }
        Ok(Self::with_value(name, OptionValue::Integer(default), min, max))
    }

    pub fn float(name: impl Into<String>, default: f32) -> Self {
        Self::with_value(name, OptionValue::Float(default), i64::MIN, i64::MAX)
    }

    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::with_value(name, OptionValue::String(default.into()), i64::MIN, i64::MAX)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Deprecated option: still loadable, never written back
    pub fn removed(mut self) -> Self {
        self.removed = true;
        self
    }

    /// Volatile option: never written back
    pub fn unsaveable(mut self) -> Self {
        self.unsaveable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> OptionKind {
        self.value.kind()
    }

    pub fn value(&self) -> &OptionValue {
        &self.value
    }

    pub fn default_value(&self) -> &OptionValue {
        &self.default_value
    }

    /// `(min, max)` for integral kinds, `None` otherwise
    pub fn bounds(&self) -> Option<(i64, i64)> {
        self.kind().is_integral().then_some((self.min, self.max))
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_unsaveable(&self) -> bool {
        self.unsaveable
    }

    /// Whether the item takes part in saving
    pub fn is_persistable(&self) -> bool {
        !self.removed && !self.unsaveable
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the current value equals the registration-time default.
    ///
    /// Float comparison is exact, so a NaN value never equals its default.
    pub fn is_default(&self) -> bool {
        self.value == self.default_value
    }

    pub fn in_bounds(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Assign a new value, marking the item dirty.
    pub fn set_value(&mut self, value: OptionValue) -> Result<(), RegistryError> {
        self.validate(&value)?;
        self.value = value;
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.value = self.default_value.clone();
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Assign a value read from the persisted file. The item stays clean.
    pub(crate) fn load_value(&mut self, value: OptionValue) {
        debug_assert_eq!(value.kind(), self.kind());
        self.value = value;
        self.revision = self.revision.wrapping_add(1);
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn validate(&self, value: &OptionValue) -> Result<(), RegistryError> {
        if value.kind() != self.kind() {
            return Err(RegistryError::KindMismatch {
                option: self.name.clone(),
                expected: self.kind(),
                actual: value.kind(),
            });
        }

        if let Some(v) = value.as_integer() {
            if !self.in_bounds(v) {
                return Err(RegistryError::OutOfRange {
                    option: self.name.clone(),
                    value: v,
                    min: self.min,
                    max: self.max,
                });
            }
        }

        if let OptionValue::String(s) = value {
            if s.contains('\n') {
                return Err(RegistryError::InvalidValue {
                    option: self.name.clone(),
                    message: "string values cannot span multiple lines".to_string(),
                });
            }
        }

        Ok(())
    }
}

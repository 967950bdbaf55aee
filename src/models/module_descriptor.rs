//! Module descriptor model
//!
//! A named owner of option items. The object name doubles as the section
//! header in the persisted file.

use crate::models::option_item::OptionItem;

#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    object_name: String,
    display_name: Option<String>,
    items: Vec<OptionItem>,
}

impl ModuleDescriptor {
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            display_name: None,
            items: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Append an item. Registration order is the order items are saved in.
    pub fn with_item(mut self, item: OptionItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn items(&self) -> &[OptionItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [OptionItem] {
        &mut self.items
    }

    pub fn item(&self, name: &str) -> Option<&OptionItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }
}

//! Data models for the option registry

pub mod module_descriptor;
pub mod option_item;

pub use module_descriptor::ModuleDescriptor;
pub use option_item::{OptionItem, OptionKind, OptionValue};

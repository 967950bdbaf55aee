//! Persistence of the option registry

pub mod format;
pub mod loader;
pub mod locator;
pub mod merge;
pub mod persistence;

pub use format::{parse_line, FormatError, Line, NumericContext, TextEncoding};
pub use loader::{LoadError, LoadReport, LoadWarning};
pub use locator::{ConfigLocator, FsLocator};
pub use merge::SectionMatch;
pub use persistence::{ConfigPersistence, PersistenceConfig, PersistenceError};

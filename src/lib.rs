//! confstore - persistence for a process-wide option registry
//!
//! Modules register typed options in a shared [`Registry`]. At startup the
//! option file is loaded into it; later the in-memory values are written
//! back without destroying sections owned by modules that are not loaded,
//! and the file is replaced atomically.

pub mod cli;
pub mod config;
pub mod logging;
pub mod models;
pub mod registry;

pub use config::{ConfigPersistence, LoadError, LoadReport, PersistenceConfig, PersistenceError};
pub use models::*;
pub use registry::{Registry, RegistryError};

/// Result type alias for the command-line front end
pub type Result<T> = anyhow::Result<T>;

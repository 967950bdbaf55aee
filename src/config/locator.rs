//! Where the persisted option file lives
//!
//! Path resolution and directory creation are collaborators of the
//! persistence layer; [`FsLocator`] is the default filesystem-backed one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Application directory name under the platform config directory
pub const APP_DIR: &str = "confstore";
/// Default file name of the persisted options
pub const CONFIG_FILE: &str = "confstorerc";

#[cfg_attr(test, mockall::automock)]
pub trait ConfigLocator: Send + Sync {
    /// Permanent location of the option file
    fn config_path(&self) -> Option<PathBuf>;

    /// Pre-migration location, probed only when the permanent file is absent
    fn legacy_config_path(&self) -> Option<PathBuf>;

    /// Create `dir` and any missing parents
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;
}

/// Locator backed by fixed paths and the real filesystem
#[derive(Debug, Clone)]
pub struct FsLocator {
    pub config_path: PathBuf,
    pub legacy_path: Option<PathBuf>,
    pub dir_permissions: u32,
}

impl FsLocator {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            legacy_path: None,
            dir_permissions: 0o700,
        }
    }

    pub fn with_legacy_path(mut self, legacy_path: impl Into<PathBuf>) -> Self {
        self.legacy_path = Some(legacy_path.into());
        self
    }
}

impl ConfigLocator for FsLocator {
    fn config_path(&self) -> Option<PathBuf> {
        Some(self.config_path.clone())
    }

    fn legacy_config_path(&self) -> Option<PathBuf> {
        self.legacy_path.clone()
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        if dir.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.dir_permissions);
        }

        builder.create(dir)
    }
}

/// Default legacy location: `~/.confstore/confstorerc`.
///
/// Only platforms that moved to an XDG-style directory have one.
pub fn default_legacy_path() -> Option<PathBuf> {
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        dirs::home_dir().map(|home| home.join(format!(".{}", APP_DIR)).join(CONFIG_FILE))
    }

    #[cfg(not(all(unix, not(target_os = "macos"))))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_dir_all_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("c");
        let locator = FsLocator::new(nested.join(CONFIG_FILE));

        locator.create_dir_all(&nested).unwrap();
        assert!(nested.is_dir());

        // Existing directory is fine
        locator.create_dir_all(&nested).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&nested).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_legacy_path_is_optional() {
        let locator = FsLocator::new("/tmp/confstorerc");
        assert_eq!(locator.legacy_config_path(), None);

        let locator = locator.with_legacy_path("/tmp/.confstore/confstorerc");
        assert_eq!(
            locator.legacy_config_path(),
            Some(PathBuf::from("/tmp/.confstore/confstorerc"))
        );
    }
}

//! Loading and saving the option file
//!
//! Saving never destroys what it does not understand: sections belonging
//! to modules that are not registered are carried over verbatim, and the
//! new file replaces the old one with a single rename so the permanent file
//! is never observed half written.
//!
//! Lock order: the registry lock is only held while rendering in memory,
//! the save mutex only while the temporary file is written and renamed.
//! The two are never held together.

use parking_lot::{const_mutex, Mutex};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::format::{render_banner, render_item, render_section_header, NumericContext};
use crate::config::loader::{apply_stream, detect_encoding, LoadError, LoadReport};
use crate::config::locator::{default_legacy_path, ConfigLocator, FsLocator, APP_DIR, CONFIG_FILE};
use crate::config::merge::{collect_foreign_sections, SectionMatch};
use crate::registry::Registry;

/// The temporary file name is per process, so saves within the process
/// must not overlap. Maps each permanent file to the sequence number of the
/// rendering it currently holds.
static SAVE_LOCK: Mutex<BTreeMap<PathBuf, u64>> = const_mutex(BTreeMap::new());

/// Orders renderings; taken under the registry read lock
static RENDER_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("No configuration file location available")]
    NoConfigPath,
    #[error("Cannot create configuration directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot open configuration file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Configuration file {path} is read-only")]
    ReadOnly { path: PathBuf },
    #[error("Cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot replace {to} with {from}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub config_dir: PathBuf,
    pub file_name: String,
    /// Explicit file location, overrides `config_dir`/`file_name`
    pub config_path: Option<PathBuf>,
    pub legacy_path: Option<PathBuf>,
    pub section_match: SectionMatch,
    /// Text of the `###` banner at the top of saved files
    pub banner: String,
    pub dir_permissions: u32,
    pub file_permissions: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
            .join(APP_DIR);

        Self {
            config_dir,
            file_name: CONFIG_FILE.to_string(),
            config_path: None,
            legacy_path: default_legacy_path(),
            section_match: SectionMatch::default(),
            banner: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            dir_permissions: 0o700,  // rwx for owner only
            file_permissions: 0o600, // rw for owner only
        }
    }
}

impl PersistenceConfig {
    /// Defaults overridden by `CONFSTORE_CONFIG` (file path) and
    /// `CONFSTORE_CONFIG_DIR`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CONFSTORE_CONFIG_DIR") {
            if !dir.is_empty() {
                config.config_dir = PathBuf::from(dir);
            }
        }

        if let Ok(path) = std::env::var("CONFSTORE_CONFIG") {
            if !path.is_empty() {
                config.config_path = Some(PathBuf::from(path));
            }
        }

        config
    }

    /// Config rooted at `dir`, without a legacy location
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
            legacy_path: None,
            ..Self::default()
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join(&self.file_name))
    }

    pub fn locator(&self) -> FsLocator {
        FsLocator {
            config_path: self.config_file(),
            legacy_path: self.legacy_path.clone(),
            dir_permissions: self.dir_permissions,
        }
    }
}

/// Sections rendered from the registry, ready to be written
struct RenderedConfig {
    sequence: u64,
    text: String,
    known_modules: Vec<String>,
    /// Items written, with the revision they had when rendered
    written: Vec<(String, u64)>,
}

/// Temporary file removed on drop unless it was moved into place
struct TemporaryFile {
    path: PathBuf,
    persisted: bool,
}

impl TemporaryFile {
    fn persist(mut self, permanent: &Path) -> io::Result<()> {
        fs::rename(&self.path, permanent)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TemporaryFile {
    fn drop(&mut self) {
        if !self.persisted {
            if let Err(e) = fs::remove_file(&self.path) {
                debug!("Cannot remove {}: {}", self.path.display(), e);
            }
        }
    }
}

pub struct ConfigPersistence {
    config: PersistenceConfig,
    locator: Box<dyn ConfigLocator>,
    numeric: NumericContext,
}

impl ConfigPersistence {
    pub fn new(config: PersistenceConfig) -> Self {
        let locator = Box::new(config.locator());
        Self::with_locator(config, locator)
    }

    pub fn with_locator(config: PersistenceConfig, locator: Box<dyn ConfigLocator>) -> Self {
        Self {
            config,
            locator,
            numeric: NumericContext,
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.locator.config_path()
    }

    /// Read the option file into `registry`.
    ///
    /// A missing file is not an error: the report then has no `source` and
    /// every option keeps its default.
    #[instrument(skip_all)]
    pub fn load(&self, registry: &Registry) -> Result<LoadReport, LoadError> {
        let path = self.locator.config_path().ok_or(LoadError::NoConfigPath)?;
        debug!("Opening config file ({})", path.display());

        let mut report = LoadReport::default();
        let opened = self
            .open_config_file(&path)
            .map_err(|source| LoadError::Open {
                path: path.clone(),
                source,
            })?;
        let Some((file, source)) = opened else {
            debug!("No configuration file, using defaults");
            return Ok(report);
        };
        report.source = Some(source);

        let mut reader = BufReader::new(file);
        let encoding = match detect_encoding(&mut reader) {
            Ok(encoding) => encoding,
            Err(e) => {
                error!("Error reading configuration: {}", e);
                report.read_error = Some(e.to_string());
                return Ok(report);
            }
        };

        {
            let mut state = registry.write();
            apply_stream(&mut reader, encoding, &mut state, &self.numeric, &mut report);
        }

        info!(
            applied = report.applied,
            unknown = report.unknown,
            rejected = report.warnings.len(),
            "Loaded configuration"
        );
        Ok(report)
    }

    /// Write every registered module to the option file, keeping the
    /// sections of unregistered modules.
    ///
    /// On any error the permanent file is left exactly as it was.
    #[instrument(skip_all)]
    pub fn save(&self, registry: &Registry) -> Result<(), PersistenceError> {
        let permanent = self
            .locator
            .config_path()
            .ok_or(PersistenceError::NoConfigPath)?;

        if let Some(dir) = permanent.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.locator.create_dir_all(dir).map_err(|source| {
                error!("No configuration directory {}: {}", dir.display(), source);
                PersistenceError::Directory {
                    path: dir.to_path_buf(),
                    source,
                }
            })?;
        }

        let rendered = self.render(registry);
        self.commit(registry, &permanent, rendered)
    }

    /// Save only if some option changed since the last save.
    ///
    /// Returns whether a save happened.
    pub fn auto_save(&self, registry: &Registry) -> Result<bool, PersistenceError> {
        // The scan releases the registry lock before save takes it again
        if !registry.has_dirty() {
            return Ok(false);
        }
        self.save(registry)?;
        Ok(true)
    }

    /// Merge `rendered` with the foreign sections of `permanent` and move
    /// the result into place.
    ///
    /// A rendering older than the one the file already holds is dropped:
    /// the newer one reflects every change this one saw.
    fn commit(
        &self,
        registry: &Registry,
        permanent: &Path,
        rendered: RenderedConfig,
    ) -> Result<(), PersistenceError> {
        let backup = self.backup_foreign_sections(permanent, &rendered.known_modules)?;
        let temporary = temporary_path(permanent);

        {
            let mut persisted = SAVE_LOCK.lock();
            if persisted
                .get(permanent)
                .is_some_and(|&current| current > rendered.sequence)
            {
                debug!(
                    sequence = rendered.sequence,
                    "Skipping save superseded by a newer rendering"
                );
                return Ok(());
            }

            let file = self.write_temporary(&temporary, rendered.text.as_bytes(), &backup)?;
            file.persist(permanent).map_err(|source| {
                error!("Cannot replace configuration file: {}", source);
                PersistenceError::Rename {
                    from: temporary.clone(),
                    to: permanent.to_path_buf(),
                    source,
                }
            })?;
            persisted.insert(permanent.to_path_buf(), rendered.sequence);
        }

        registry.mark_clean(&rendered.written);
        info!(
            path = %permanent.display(),
            items = rendered.written.len(),
            preserved_bytes = backup.len(),
            "Saved configuration"
        );
        Ok(())
    }

    fn render(&self, registry: &Registry) -> RenderedConfig {
        let state = registry.read();
        let sequence = RENDER_SEQUENCE.fetch_add(1, Ordering::SeqCst) + 1;

        let mut text = render_banner(&self.config.banner);
        let mut known_modules = Vec::with_capacity(state.modules().len());
        let mut written = Vec::new();

        for module in state.modules() {
            known_modules.push(module.object_name().to_string());
            if !module.has_items() {
                continue;
            }

            text.push_str(&render_section_header(module));
            for item in module.items().iter().filter(|item| item.is_persistable()) {
                text.push_str(&render_item(item, &self.numeric));
                written.push((item.name().to_string(), item.revision()));
            }
        }

        RenderedConfig {
            sequence,
            text,
            known_modules,
            written,
        }
    }

    fn backup_foreign_sections(
        &self,
        permanent: &Path,
        known_modules: &[String],
    ) -> Result<Vec<u8>, PersistenceError> {
        let opened = self
            .open_config_file(permanent)
            .map_err(|source| PersistenceError::Open {
                path: permanent.to_path_buf(),
                source,
            })?;
        let Some((file, source)) = opened else {
            return Ok(Vec::new());
        };

        // A rename would replace a file the owner made read-only
        let metadata = file.metadata().map_err(|e| PersistenceError::Read {
            path: source.clone(),
            source: e,
        })?;
        if !owner_writable(&metadata) {
            error!("Configuration file {} is read-only", source.display());
            return Err(PersistenceError::ReadOnly { path: source });
        }

        let mut reader = BufReader::new(file);
        collect_foreign_sections(&mut reader, known_modules, self.config.section_match).map_err(
            |e| {
                error!("Error reading configuration: {}", e);
                PersistenceError::Read {
                    path: source,
                    source: e,
                }
            },
        )
    }

    fn write_temporary(
        &self,
        temporary: &Path,
        rendered: &[u8],
        backup: &[u8],
    ) -> Result<TemporaryFile, PersistenceError> {
        let write_error = |source: io::Error| {
            error!("Cannot write configuration file: {}", source);
            PersistenceError::Write {
                path: temporary.to_path_buf(),
                source,
            }
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.config.file_permissions);
        }

        let file = options.open(temporary).map_err(write_error)?;
        let guard = TemporaryFile {
            path: temporary.to_path_buf(),
            persisted: false,
        };

        write_synced(file, &[rendered, backup]).map_err(write_error)?;
        Ok(guard)
    }

    /// Open the permanent file, falling back to the legacy location.
    ///
    /// `Ok(None)` means neither exists.
    fn open_config_file(&self, path: &Path) -> io::Result<Option<(File, PathBuf)>> {
        match File::open(path) {
            Ok(file) => Ok(Some((file, path.to_path_buf()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(self.open_legacy_file(path)),
            Err(e) => {
                error!("Cannot open config file ({}): {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Open a pre-migration file and retire it so the next save lands at
    /// `path`.
    fn open_legacy_file(&self, path: &Path) -> Option<(File, PathBuf)> {
        let legacy = self.locator.legacy_config_path()?;
        let file = File::open(&legacy).ok()?;

        info!(
            "Found old config file at {}. {} will now use {}.",
            legacy.display(),
            env!("CARGO_PKG_NAME"),
            path.display()
        );

        if let Some(legacy_dir) = legacy.parent() {
            let readme = format!(
                "The {} configuration folder has moved. Your\nconfiguration has been \
                 copied to the new location:\n{}\nYou can delete this directory and all its \
                 contents.\n",
                env!("CARGO_PKG_NAME"),
                path.display()
            );
            if let Err(e) = fs::write(legacy_dir.join("README"), readme) {
                warn!("Cannot write migration notice: {}", e);
            }
        }

        // The open handle stays readable after the unlink on Unix
        if let Err(e) = fs::remove_file(&legacy) {
            warn!("Cannot remove old config file {}: {}", legacy.display(), e);
        }

        Some((file, legacy))
    }
}

impl Default for ConfigPersistence {
    fn default() -> Self {
        Self::new(PersistenceConfig::from_env())
    }
}

/// `<permanent>.<pid>`
fn temporary_path(permanent: &Path) -> PathBuf {
    let mut name = permanent.as_os_str().to_owned();
    name.push(format!(".{}", std::process::id()));
    PathBuf::from(name)
}

fn owner_writable(metadata: &fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o200 != 0
    }

    #[cfg(not(unix))]
    {
        !metadata.permissions().readonly()
    }
}

/// Write all parts, flush and force the data to stable storage
fn write_synced(file: File, parts: &[&[u8]]) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    for part in parts {
        writer.write_all(part)?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;

    #[cfg(target_os = "macos")]
    file.sync_all()?;
    #[cfg(not(target_os = "macos"))]
    file.sync_data()?;

    Ok(())
}

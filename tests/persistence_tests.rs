//! Integration tests for loading and saving the option file
//!
//! Covers round-trips, default commenting, preservation of foreign
//! sections and the guarantee that failed saves leave the file untouched.

use confstore::config::SectionMatch;
use confstore::{
    ConfigPersistence, ModuleDescriptor, OptionItem, OptionValue, PersistenceConfig,
    PersistenceError, Registry,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn schema() -> Vec<ModuleDescriptor> {
    vec![
        ModuleDescriptor::new("core")
            .with_display_name("Core")
            .with_item(OptionItem::boolean("fullscreen", false).with_description("Start fullscreen"))
            .with_item(
                OptionItem::integer_range("verbosity", 0, 0, 2)
                    .unwrap()
                    .with_description("Verbosity level"),
            )
            .with_item(OptionItem::float("rate", 1.0).with_description("Playback rate"))
            .with_item(OptionItem::string("title", "").with_description("Window title"))
            .with_item(OptionItem::integer("old-option", 3).removed())
            .with_item(OptionItem::string("session", "none").unsaveable()),
        ModuleDescriptor::new("network")
            .with_item(OptionItem::integer("timeout", 5000).with_description("Timeout (ms)"))
            .with_item(OptionItem::string("proxy", "")),
        // Owns its section but has nothing to write
        ModuleDescriptor::new("empty"),
    ]
}

fn fresh_registry() -> Registry {
    let registry = Registry::new();
    for module in schema() {
        registry.register(module).unwrap();
    }
    registry
}

fn persistence(dir: &TempDir) -> ConfigPersistence {
    ConfigPersistence::new(PersistenceConfig::in_dir(dir.path().join("confstore")))
}

fn config_file(persistence: &ConfigPersistence) -> PathBuf {
    persistence.config().config_file()
}

#[test]
fn test_first_run_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let registry = fresh_registry();

    let report = persistence.load(&registry).unwrap();

    assert!(!report.found());
    assert_eq!(registry.get("timeout"), Some(OptionValue::Integer(5000)));
    assert!(!registry.has_dirty());
}

#[test]
fn test_save_then_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);

    let registry = fresh_registry();
    registry.set("fullscreen", true).unwrap();
    registry.set("verbosity", 2i64).unwrap();
    registry.set("rate", 0.75f32).unwrap();
    registry.set("title", "My = title # not a comment").unwrap();
    registry.set("timeout", -1i64).unwrap();
    persistence.save(&registry).unwrap();

    let reloaded = fresh_registry();
    let report = persistence.load(&reloaded).unwrap();

    assert!(report.found());
    assert!(report.warnings.is_empty());
    for name in ["fullscreen", "verbosity", "rate", "title", "timeout", "proxy"] {
        assert_eq!(reloaded.get(name), registry.get(name), "option {}", name);
    }
    assert!(!reloaded.has_dirty());
}

#[test]
fn test_defaults_written_commented_out() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let registry = fresh_registry();
    registry.set("timeout", 100i64).unwrap();

    persistence.save(&registry).unwrap();
    let content = fs::read_to_string(config_file(&persistence)).unwrap();

    assert!(content.contains("[core] # Core\n\n"));
    assert!(content.contains("# Start fullscreen (boolean)\n#fullscreen=0\n\n"));
    assert!(content.contains("# Playback rate (float)\n#rate=1\n\n"));
    assert!(content.contains("# Timeout (ms) (integer)\ntimeout=100\n\n"));
    assert!(content.contains("# ? (string)\n#proxy=\n\n"));
    assert!(!content.contains("old-option"));
    assert!(!content.contains("session"));
    assert!(!content.contains("[empty]"));

    // Loading the commented defaults changes nothing
    let reloaded = fresh_registry();
    let report = persistence.load(&reloaded).unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(reloaded.get("fullscreen"), Some(OptionValue::Boolean(false)));
    assert_eq!(reloaded.is_dirty("fullscreen"), Some(false));
}

#[test]
fn test_save_clears_dirty_flags() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let registry = fresh_registry();

    registry.set("verbosity", 1i64).unwrap();
    registry.reset("verbosity").unwrap();
    assert!(registry.has_dirty());

    persistence.save(&registry).unwrap();
    assert!(!registry.has_dirty());
}

#[test]
fn test_unknown_section_preserved() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let path = config_file(&persistence);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "[unknownModule]\nfoo=bar\n").unwrap();

    let registry = fresh_registry();
    persistence.save(&registry).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[unknownModule]\nfoo=bar\n"));
    assert!(content.ends_with("[unknownModule]\nfoo=bar\n"));
}

#[test]
fn test_known_sections_rewritten_and_foreign_kept_across_saves() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let path = config_file(&persistence);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        "###\n[core]\ntimeout=1\nverbosity=1\n\n[plugin] # Plugin\n# Depth (integer)\ndepth=4\n\n[empty]\nstale=1\n",
    )
    .unwrap();

    let registry = fresh_registry();
    persistence.load(&registry).unwrap();
    assert_eq!(registry.get("verbosity"), Some(OptionValue::Integer(1)));

    persistence.save(&registry).unwrap();
    persistence.save(&registry).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches("[core]").count(), 1);
    assert_eq!(content.matches("[plugin] # Plugin\n").count(), 1);
    assert!(content.contains("[plugin] # Plugin\n# Depth (integer)\ndepth=4\n"));
    assert!(!content.contains("stale=1"));
    assert!(content.contains("\nverbosity=1\n"));
}

#[test]
fn test_unregistered_module_section_survives() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);

    let registry = fresh_registry();
    registry.set("timeout", 42i64).unwrap();
    persistence.save(&registry).unwrap();

    // Same process, network module no longer loaded
    registry.unregister("network").unwrap();
    registry.set("verbosity", 2i64).unwrap();
    persistence.save(&registry).unwrap();

    let reloaded = fresh_registry();
    persistence.load(&reloaded).unwrap();
    assert_eq!(reloaded.get("timeout"), Some(OptionValue::Integer(42)));
    assert_eq!(reloaded.get("verbosity"), Some(OptionValue::Integer(2)));
}

#[test]
fn test_exact_section_matching() {
    let temp_dir = TempDir::new().unwrap();
    let config = PersistenceConfig {
        section_match: SectionMatch::Exact,
        ..PersistenceConfig::in_dir(temp_dir.path())
    };
    let persistence = ConfigPersistence::new(config);
    let path = config_file(&persistence);
    fs::write(&path, "[coreplus]\nextra=1\n").unwrap();

    persistence.save(&fresh_registry()).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[coreplus]\nextra=1\n"));

    let prefix = ConfigPersistence::new(PersistenceConfig::in_dir(temp_dir.path()));
    prefix.save(&fresh_registry()).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(!content.contains("[coreplus]"));
}

#[test]
fn test_out_of_range_value_rejected_with_warning() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let path = config_file(&persistence);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "[core]\nverbosity=99\nfullscreen=1\n").unwrap();

    let registry = fresh_registry();
    let report = persistence.load(&registry).unwrap();

    assert_eq!(registry.get("verbosity"), Some(OptionValue::Integer(0)));
    assert_eq!(registry.get("fullscreen"), Some(OptionValue::Boolean(true)));
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].option, "verbosity");
}

#[cfg(unix)]
#[test]
fn test_read_only_file_refused() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let path = config_file(&persistence);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "[core]\ntimeout=1\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

    let registry = fresh_registry();
    registry.set("timeout", 7i64).unwrap();

    let result = persistence.save(&registry);
    assert!(matches!(result, Err(PersistenceError::ReadOnly { .. })));
    assert_eq!(fs::read_to_string(&path).unwrap(), "[core]\ntimeout=1\n");
    assert!(registry.has_dirty());
}

#[test]
fn test_write_failure_leaves_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let path = config_file(&persistence);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let original = b"[core]\ntimeout=1\n[foreign]\nx=y\n".to_vec();
    fs::write(&path, &original).unwrap();

    // A directory squatting on the temporary file name makes creation fail
    let mut temporary = path.clone().into_os_string();
    temporary.push(format!(".{}", std::process::id()));
    let temporary = PathBuf::from(temporary);
    fs::create_dir(&temporary).unwrap();

    let registry = fresh_registry();
    registry.set("timeout", 9i64).unwrap();

    let result = persistence.save(&registry);
    assert!(matches!(result, Err(PersistenceError::Write { .. })));
    assert_eq!(fs::read(&path).unwrap(), original);
    assert!(registry.has_dirty());
    assert!(temporary.is_dir());
}

#[cfg(unix)]
#[test]
fn test_directory_at_config_path_fails_before_writing() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let path = config_file(&persistence);

    // Reading the directory for the merge fails before any temporary file
    // is created
    fs::create_dir_all(path.join("occupied")).unwrap();

    let registry = fresh_registry();
    assert!(matches!(
        persistence.save(&registry),
        Err(PersistenceError::Read { .. })
    ));

    let mut temporary = path.clone().into_os_string();
    temporary.push(format!(".{}", std::process::id()));
    assert!(!PathBuf::from(temporary).exists());
    assert!(path.join("occupied").is_dir());
}

#[test]
fn test_legacy_encoding_file_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let persistence = persistence(&temp_dir);
    let path = config_file(&persistence);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"[core]\ntitle=Caf\xE9\n").unwrap();

    let registry = fresh_registry();
    let report = persistence.load(&registry).unwrap();

    assert!(!report.encoding_utf8);
    assert_eq!(registry.get("title"), Some(OptionValue::from("Caf\u{e9}")));

    // Saved back as UTF-8 with a byte order mark
    registry.set("timeout", 1i64).unwrap();
    persistence.save(&registry).unwrap();
    let bytes = fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    assert!(String::from_utf8(bytes).unwrap().contains("title=Caf\u{e9}\n"));
}

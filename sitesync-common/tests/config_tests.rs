//! Configuration resolution and graceful degradation
//!
//! Tests that touch SITESYNC_ROOT_FOLDER are marked #[serial] so they do not race on
//! the process environment.

use serial_test::serial;
use sitesync_common::config::{
    CompiledDefaults, ConfigOverrides, HubConfig, TomlConfig, DATABASE_FILE, ROOT_FOLDER_ENV,
};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let config = TomlConfig::load(Some(&missing)).expect("missing file is not an error");
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_config_file_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();

    assert!(TomlConfig::load(Some(file.path())).is_err());
}

#[test]
fn test_config_file_values_parsed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "bind_addr = \"0.0.0.0\"\nport = 6001\nshared_secret = 42\npersistence_timeout_ms = 750"
    )
    .unwrap();

    let config = TomlConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.bind_addr.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.port, Some(6001));
    assert_eq!(config.shared_secret, Some(42));
    assert_eq!(config.persistence_timeout_ms, Some(750));
    assert_eq!(config.outbound_capacity, None);
}

#[test]
#[serial]
fn test_resolve_uses_compiled_defaults() {
    env::remove_var(ROOT_FOLDER_ENV);
    let defaults = CompiledDefaults::for_current_platform();

    let config = HubConfig::resolve(&ConfigOverrides::default(), &TomlConfig::default()).unwrap();

    assert_eq!(config.root_folder, defaults.root_folder);
    assert_eq!(config.port, defaults.port);
    assert_eq!(config.bind_addr, defaults.bind_addr);
    assert_eq!(config.outbound_capacity, defaults.outbound_capacity);
    assert_eq!(config.shared_secret, None);
    assert_eq!(
        config.persistence_timeout,
        Duration::from_millis(defaults.persistence_timeout_ms)
    );
}

#[test]
#[serial]
fn test_override_beats_env_beats_file() {
    let file = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-file")),
        port: Some(7000),
        ..Default::default()
    };

    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let from_env = HubConfig::resolve(&ConfigOverrides::default(), &file).unwrap();
    assert_eq!(from_env.root_folder, PathBuf::from("/tmp/from-env"));
    assert_eq!(from_env.port, 7000);

    let overrides = ConfigOverrides {
        root_folder: Some(PathBuf::from("/tmp/from-cli")),
        port: Some(7100),
        ..Default::default()
    };
    let from_cli = HubConfig::resolve(&overrides, &file).unwrap();
    assert_eq!(from_cli.root_folder, PathBuf::from("/tmp/from-cli"));
    assert_eq!(from_cli.port, 7100);

    env::remove_var(ROOT_FOLDER_ENV);
    let from_file = HubConfig::resolve(&ConfigOverrides::default(), &file).unwrap();
    assert_eq!(from_file.root_folder, PathBuf::from("/tmp/from-file"));
    assert_eq!(
        from_file.database_path(),
        PathBuf::from("/tmp/from-file").join(DATABASE_FILE)
    );
}

#[test]
#[serial]
fn test_zero_limits_rejected() {
    env::remove_var(ROOT_FOLDER_ENV);
    let zero_capacity = ConfigOverrides {
        outbound_capacity: Some(0),
        ..Default::default()
    };
    assert!(HubConfig::resolve(&zero_capacity, &TomlConfig::default()).is_err());

    let zero_timeout = TomlConfig {
        persistence_timeout_ms: Some(0),
        ..Default::default()
    };
    assert!(HubConfig::resolve(&ConfigOverrides::default(), &zero_timeout).is_err());
}

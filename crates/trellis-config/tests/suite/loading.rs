use std::path::PathBuf;

use trellis_config::{ConfigError, TrellisConfig};
use trellis_test_utils::write_file;

#[test]
fn relative_paths_resolve_against_the_config_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trellis.toml");
    write_file(
        &path,
        r#"
[maven]
local_repository = "repo"
settings = "~/custom-settings.xml"

[logging]
file = "logs/trellis.log"
"#,
    );

    let config = TrellisConfig::load_from_path(&path).unwrap();
    assert_eq!(config.maven.local_repository, Some(dir.path().join("repo")));
    assert_eq!(
        config.maven.settings,
        Some(PathBuf::from("~/custom-settings.xml"))
    );
    assert_eq!(
        config.logging.file,
        Some(dir.path().join("logs").join("trellis.log"))
    );
}

#[test]
fn unknown_keys_are_reported_without_failing() {
    let (config, diagnostics) = TrellisConfig::load_from_str_with_diagnostics(
        r#"
[resolution]
download_sources = true
download_docs = true
"#,
    )
    .unwrap();
    assert!(config.resolution.download_sources);
    assert_eq!(diagnostics.unknown_keys, vec!["resolution.download_docs"]);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TrellisConfig::load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

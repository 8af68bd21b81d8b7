use trellis_config::{
    discover_config_path, load_for_workspace, with_config_env_lock, TrellisConfig,
    TRELLIS_CONFIG_ENV_VAR,
};
use trellis_test_utils::{env_lock, write_file, EnvVarGuard};

#[test]
fn discovers_trellis_toml_in_workspace_root() {
    let _lock = env_lock();
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(TRELLIS_CONFIG_ENV_VAR);
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("trellis.toml");
        write_file(&config_path, "[refresh]\ndebounce_ms = 250\n");

        let discovered = discover_config_path(dir.path()).expect("trellis.toml discovered");
        assert_eq!(
            discovered,
            config_path.canonicalize().unwrap_or(config_path)
        );

        let (config, path) = load_for_workspace(dir.path()).unwrap();
        assert!(path.is_some());
        assert_eq!(config.refresh.debounce_ms, 250);
    });
}

#[test]
fn hidden_and_nested_candidates_are_found_in_order() {
    let _lock = env_lock();
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(TRELLIS_CONFIG_ENV_VAR);
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join(".trellis").join("config.toml");
        write_file(&nested, "");
        assert_eq!(
            discover_config_path(dir.path()).unwrap().file_name().unwrap(),
            "config.toml"
        );

        let hidden = dir.path().join(".trellis.toml");
        write_file(&hidden, "");
        assert_eq!(
            discover_config_path(dir.path()).unwrap().file_name().unwrap(),
            ".trellis.toml"
        );
    });
}

#[test]
fn env_override_wins_over_workspace_file() {
    let _lock = env_lock();
    with_config_env_lock(|| {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("trellis.toml"), "[refresh]\ndebounce_ms = 10\n");
        write_file(
            &dir.path().join("override.toml"),
            "[refresh]\ndebounce_ms = 20\n",
        );

        let _env = EnvVarGuard::set(TRELLIS_CONFIG_ENV_VAR, "override.toml");
        let (config, path) = load_for_workspace(dir.path()).unwrap();
        assert_eq!(config.refresh.debounce_ms, 20);
        assert_eq!(path.unwrap().file_name().unwrap(), "override.toml");
    });
}

#[test]
fn missing_config_yields_defaults() {
    let _lock = env_lock();
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(TRELLIS_CONFIG_ENV_VAR);
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = load_for_workspace(dir.path()).unwrap();
        assert_eq!(config, TrellisConfig::default());
        assert!(path.is_none());
    });
}

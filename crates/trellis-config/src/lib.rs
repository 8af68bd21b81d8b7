use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use thiserror::Error;

mod diagnostics;
mod logging;
mod maven;
mod schema;

pub use diagnostics::{ConfigDiagnostics, ConfigWarning};
pub use logging::{init_tracing, LoggingConfig};
pub use maven::{read_settings_local_repository, MavenConfig};
pub use schema::json_schema;

/// Top-level `trellis.toml` configuration.
///
/// ```toml
/// [logging]
/// level = "debug"
///
/// [resolution]
/// active_profiles = ["ci"]
/// download_sources = true
///
/// [refresh]
/// debounce_ms = 500
///
/// [maven]
/// local_repository = "~/.m2/repository"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct TrellisConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Workspace-wide defaults for classpath resolution.
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Debounced refresh queue settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Maven local repository and settings lookup.
    #[serde(default)]
    pub maven: MavenConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Put sibling modules on the classpath as project entries.
    #[serde(default = "default_true")]
    pub include_modules: bool,

    /// Substitute workspace projects for repository artifacts with the same coordinate.
    #[serde(default = "default_true")]
    pub resolve_workspace_projects: bool,

    /// Maven profiles activated for every project model read.
    #[serde(default)]
    pub active_profiles: Vec<String>,

    /// Fetch `-sources` archives for library entries.
    #[serde(default)]
    pub download_sources: bool,

    /// Fetch `-javadoc` archives for library entries.
    #[serde(default)]
    pub download_javadoc: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            include_modules: true,
            resolve_workspace_projects: true,
            active_profiles: Vec::new(),
            download_sources: false,
            download_javadoc: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Quiet period after the last manifest change before a refresh pass starts.
    #[serde(default = "RefreshConfig::default_debounce_ms")]
    #[schemars(range(min = 1))]
    pub debounce_ms: u64,
}

impl RefreshConfig {
    pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;

    fn default_debounce_ms() -> u64 {
        Self::DEFAULT_DEBOUNCE_MS
    }

    /// Debounce window; `0` is clamped to one millisecond.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(1))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::DEFAULT_DEBOUNCE_MS,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` embeds a source snippet; keep only the message.
        ConfigError::Toml(err.message().to_string())
    }
}

impl TrellisConfig {
    /// Load a config file from TOML. Relative paths inside it resolve against the file's directory.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::load_from_path_with_diagnostics(path)?.0)
    }

    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let (mut config, diagnostics) = Self::load_from_str_with_diagnostics(&text)?;
        if let Some(dir) = path.parent() {
            config.resolve_relative_paths(dir);
        }
        Ok((config, diagnostics))
    }

    /// Parse TOML and report unknown keys and recoverable value problems.
    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::deserialize_toml_with_unknown_keys::<TrellisConfig>(text)?;
        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };
        diagnostics.warnings.extend(config.validate());
        Ok((config, diagnostics))
    }

    fn validate(&self) -> Vec<ConfigWarning> {
        let mut out = Vec::new();
        if self.refresh.debounce_ms == 0 {
            out.push(ConfigWarning::InvalidValue {
                toml_path: "refresh.debounce_ms".to_string(),
                message: "must be >= 1; using 1ms".to_string(),
            });
        }
        if let Some(warning) = self.logging.level_warning() {
            out.push(warning);
        }
        for (idx, profile) in self.resolution.active_profiles.iter().enumerate() {
            if profile.trim().is_empty() {
                out.push(ConfigWarning::InvalidValue {
                    toml_path: format!("resolution.active_profiles[{idx}]"),
                    message: "empty profile id is ignored".to_string(),
                });
            }
        }
        out
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        let absolutize = |path: &mut PathBuf| {
            if path.is_relative() && !path.starts_with("~") {
                *path = base.join(&*path);
            }
        };
        if let Some(path) = self.maven.local_repository.as_mut() {
            absolutize(path);
        }
        if let Some(path) = self.maven.settings.as_mut() {
            absolutize(path);
        }
        if let Some(path) = self.logging.file.as_mut() {
            absolutize(path);
        }
    }

    /// Profiles to activate, with blank entries dropped.
    pub fn active_profiles(&self) -> Vec<String> {
        self.resolution
            .active_profiles
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub const TRELLIS_CONFIG_ENV_VAR: &str = "TRELLIS_CONFIG";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the lock that config discovery takes before reading
/// [`TRELLIS_CONFIG_ENV_VAR`]. Tests that set the variable should wrap the mutation in this.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Discover the configuration file for a workspace root.
///
/// Search order:
/// 1) `TRELLIS_CONFIG` (absolute or relative to `workspace_root`)
/// 2) `trellis.toml`
/// 3) `.trellis.toml`
/// 4) `.trellis/config.toml`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(TRELLIS_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["trellis.toml", ".trellis.toml", ".trellis/config.toml"]
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the configuration for a workspace root.
///
/// If no config is present, returns [`TrellisConfig::default`] and `None`.
pub fn load_for_workspace(
    workspace_root: &Path,
) -> Result<(TrellisConfig, Option<PathBuf>), ConfigError> {
    let (config, path, _) = load_for_workspace_with_diagnostics(workspace_root)?;
    Ok((config, path))
}

pub fn load_for_workspace_with_diagnostics(
    workspace_root: &Path,
) -> Result<(TrellisConfig, Option<PathBuf>, ConfigDiagnostics), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        return Ok((TrellisConfig::default(), None, ConfigDiagnostics::default()));
    };

    let (config, diagnostics) = TrellisConfig::load_from_path_with_diagnostics(&path)?;
    for key in &diagnostics.unknown_keys {
        tracing::warn!(
            target: "trellis.config",
            path = %path.display(),
            key = %key,
            "unknown config key"
        );
    }
    Ok((config, Some(path), diagnostics))
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct MavenConfig {
    /// Local repository root. When unset, `<localRepository>` from the settings file is used,
    /// then `~/.m2/repository`.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub local_repository: Option<PathBuf>,

    /// Maven `settings.xml`; defaults to `~/.m2/settings.xml`.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub settings: Option<PathBuf>,
}

impl MavenConfig {
    pub fn local_repository(&self) -> PathBuf {
        self.local_repository_with_home(home_dir().as_deref())
    }

    /// Like [`MavenConfig::local_repository`] with an explicit home directory.
    pub fn local_repository_with_home(&self, home: Option<&Path>) -> PathBuf {
        if let Some(path) = &self.local_repository {
            return expand_home(path, home);
        }

        let settings = self
            .settings
            .as_ref()
            .map(|path| expand_home(path, home))
            .or_else(|| home.map(|home| home.join(".m2").join("settings.xml")));
        if let Some(repo) = settings
            .as_deref()
            .and_then(|settings| read_settings_local_repository(settings, home))
        {
            return repo;
        }

        match home {
            Some(home) => home.join(".m2").join("repository"),
            None => PathBuf::from(".m2/repository"),
        }
    }
}

/// Read `<localRepository>` from a Maven settings file.
///
/// Missing files and documents without the element yield `None`; malformed XML is logged and
/// treated the same way.
pub fn read_settings_local_repository(settings: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let text = std::fs::read_to_string(settings).ok()?;
    let doc = match roxmltree::Document::parse(&text) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::warn!(
                target: "trellis.config",
                path = %settings.display(),
                error = %err,
                "ignoring malformed maven settings"
            );
            return None;
        }
    };

    let value = doc
        .root_element()
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "localRepository")
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())?;

    let value = match home {
        Some(home) => value.replace("${user.home}", &home.to_string_lossy()),
        None => value.to_string(),
    };
    Some(expand_home(Path::new(&value), home))
}

fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

//! Utilities shared by Trellis tests.
//!
//! - [`env`]: serialized access to process environment variables
//! - [`maven`]: `pom.xml` builders plus on-disk workspace and local repository fixtures

pub mod env;
pub mod maven;

pub use env::{env_lock, EnvVarGuard};
pub use maven::{Dep, MavenWorkspace, PomBuilder};

use std::path::Path;

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent directories");
    }
    std::fs::write(path, contents).expect("write fixture file");
}

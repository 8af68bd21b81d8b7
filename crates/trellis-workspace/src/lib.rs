//! Workspace-level classpath maintenance.
//!
//! [`ClasspathManager`] owns the coordinate index, model cache and module registry of one
//! workspace. Manifest changes go through a debounced [`RefreshScheduler`] that re-reads the
//! changed manifests, cascades to their dependents and publishes every resulting classpath to a
//! [`ClasspathStore`] in one batch.

mod discover;
mod manager;
mod refresh;
mod state;
mod store;
mod watch;

pub use discover::discover_manifests;
pub use manager::{ClasspathManager, ManagerSettings};
pub use refresh::{RefreshEvent, RefreshPhase, RefreshScheduler};
pub use store::{ClasspathStore, MemoryClasspathStore};
pub use watch::{manifest_changes, ManifestChange, ManifestChangeKind, NormalizedEvent};

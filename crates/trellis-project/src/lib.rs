//! Project models for Trellis.
//!
//! This crate turns `pom.xml` files into [`ModuleModel`]s and resolves their dependency sets:
//! - [`MavenProjectEngine`]: offline POM reader (parent inheritance, properties,
//!   `dependencyManagement` including BOM imports, profile activation)
//! - [`ModelCache`]: last parsed model per manifest, invalidated explicitly
//! - [`LocalRepository`]: nearest-wins transitive closure over a local Maven repository

mod cache;
mod engine;
mod error;
mod model;
mod pom;
mod repository;

pub use cache::ModelCache;
pub use engine::{MavenProjectEngine, ProjectModelEngine};
pub use error::{ArtifactResolutionError, ModelReadError};
pub use model::{DependencyRef, Exclusion, ModuleModel, ResolvedArtifact, Scope};
pub use repository::{
    artifact_path, pom_path, ArtifactResolver, LocalRepository, WorkspacePomLookup,
};

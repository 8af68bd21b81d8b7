//! Classpath synthesis for Trellis workspaces.
//!
//! The pieces, leaves first:
//! - [`CoordinateIndex`]: which manifest publishes a coordinate, and who depends on it
//! - [`ModuleRegistry`]: host-owned module state (open, dynamic-web, per-module overrides)
//! - [`WorkspaceArtifactLocator`]: open workspace module publishing a coordinate, if any
//! - [`ArtifactMaterializer`]: source and documentation attachments for libraries
//! - [`ClasspathResolver`]: the recursive walk producing a [`ResolutionResult`]

mod entry;
mod index;
mod locator;
mod materializer;
mod modules;
mod resolver;

pub use entry::{ClasspathEntry, EntryAttributes, EntryIdentity, ResolutionResult};
pub use index::{CoordinateIndex, IndexSnapshot, IndexedModule};
pub use locator::WorkspaceArtifactLocator;
pub use materializer::{
    ArtifactMaterializer, AttachmentKind, MaterializationError, MaterializeOptions,
};
pub use modules::{ModuleRegistry, ResolveOverrides};
pub use resolver::{model_read_diagnostic, ClasspathResolver, ResolveConfig};

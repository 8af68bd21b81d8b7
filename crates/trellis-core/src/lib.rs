//! Core shared types for Trellis.
//!
//! This crate is intentionally small: value types that every other crate passes around
//! (coordinates, manifest locations, diagnostics) and nothing that does I/O beyond path
//! normalization.

mod coordinate;
mod diagnostic;
mod location;

pub use coordinate::{CoordinateParseError, ModuleCoordinate};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use location::ManifestLocation;

/// File name of a module manifest.
pub const MANIFEST_FILE_NAME: &str = "pom.xml";

/// Render a panic payload (as returned by `catch_unwind`) as text.
pub fn panic_payload_to_str(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

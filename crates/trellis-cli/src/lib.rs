//! Library wrapper around the `trellis` CLI implementation.
//!
//! The binary crate root is compiled as a module here so `cargo test -p trellis-cli --lib`
//! typechecks the CLI without building the integration tests.

#[allow(dead_code)]
#[path = "main.rs"]
mod main_bin;

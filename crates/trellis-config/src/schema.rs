use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::TrellisConfig;

/// JSON schema for `trellis.toml`, for editor TOML tooling and CI validation.
#[must_use]
pub fn json_schema() -> RootSchema {
    schema_for!(TrellisConfig)
}

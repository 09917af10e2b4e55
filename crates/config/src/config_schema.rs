//! JSON Schema export for the app config.

use crate::AppConfig;
use schemars::{Schema, schema_for};

/// JSON Schema for `AppConfig`.
#[must_use]
pub fn app_config_schema() -> Schema {
    schema_for!(AppConfig)
}

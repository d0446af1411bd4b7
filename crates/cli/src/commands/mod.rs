pub mod doctor;
pub mod memory;
pub mod onboard;
pub mod start;

use blockmind_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load the config from `path`, or from the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

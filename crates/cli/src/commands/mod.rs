pub mod chat;
pub mod doctor;
pub mod items;
pub mod onboard;
pub mod run;
pub mod runtime;
pub mod schedule;

use listkeeper_config::{AppConfig, ConfigError};
use std::path::{Path, PathBuf};

/// The config file a command reads: the `--config` override or the default.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(AppConfig::config_path)
}

/// Load, override from the environment and validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_at(&config_file(path))
}

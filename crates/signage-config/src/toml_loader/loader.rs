//! Core TOML config loading: read from path or platform default.

use signage_common::ConfigError;
use std::path::Path;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use super::ConfigFile;

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. A file that parses but fails
/// validation is logged and replaced by the default config.
pub fn load_from_path<C: ConfigFile>(path: &Path) -> Result<C, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: C = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = config.validate() {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(C::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On Linux: `~/.config/signage/<file>.toml`
///
/// If the file does not exist, writes the commented template and returns defaults.
pub fn load_default<C: ConfigFile>() -> Result<C, ConfigError> {
    let path = default_config_path::<C>()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config::<C>(&path)?;
            Ok(C::default())
        }
        Err(e) => Err(e),
    }
}

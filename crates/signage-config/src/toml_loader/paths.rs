//! Config path resolution and default file creation.

use signage_common::ConfigError;
use std::path::{Path, PathBuf};
use tracing::info;

use super::ConfigFile;

/// Get the platform-specific default path for a config file.
pub fn default_config_path<C: ConfigFile>() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("signage").join(C::FILE_NAME))
}

/// Write the commented default template for `C` to `path`.
pub fn create_default_config<C: ConfigFile>(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    std::fs::write(path, C::template()).map_err(|e| {
        ConfigError::ParseError(format!(
            "failed to write default config to {}: {e}",
            path.display()
        ))
    })?;

    info!("created default config at {}", path.display());
    Ok(())
}

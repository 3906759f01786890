//! Signage configuration system.
//!
//! TOML configuration for the controller and the kiosk client. All
//! sections use sensible defaults so partial files work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use signage_config::load_controller_config;
//!
//! let config = load_controller_config(None).expect("failed to load config");
//! println!("{}", config.server.listen_addr);
//! ```

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{ControllerConfig, DeviceConfig, LogLevel, LoggingConfig};
pub use toml_loader::ConfigFile;
pub use validation::Validate;

use std::path::Path;

use signage_common::ConfigError;

/// Load the controller config from `path`, or from the platform default
/// location when `path` is `None`.
pub fn load_controller_config(path: Option<&Path>) -> Result<ControllerConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Load the kiosk config and apply environment overrides.
pub fn load_device_config(path: Option<&Path>) -> Result<DeviceConfig, ConfigError> {
    let mut config: DeviceConfig = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    env::apply_device_env(&mut config);
    config.validate()?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json<C: serde::Serialize>(config: &C) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.toml");
        std::fs::write(&path, "[reboot]\nverify_after_secs = 30\n").unwrap();

        let config = load_controller_config(Some(&path)).unwrap();
        assert_eq!(config.reboot.verify_after_secs, 30);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_controller_config(Some(&path)),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn config_to_json_has_sections() {
        let json = config_to_json(&ControllerConfig::default());
        assert!(json.contains("\"ball\""));
        assert!(json.contains("\"liveness\""));
    }
}

//! TOML config file loading and creation.

mod loader;
mod paths;
mod template;


use serde::de::DeserializeOwned;

use crate::schema::{ControllerConfig, DeviceConfig};
use crate::validation::Validate;

pub use loader::{load_default, load_from_path};
pub use paths::{create_default_config, default_config_path};

/// A root config that lives in its own TOML file.
pub trait ConfigFile: DeserializeOwned + Default + Validate {
    /// File name under the `signage` config directory.
    const FILE_NAME: &'static str;

    /// Commented template written when no file exists yet.
    fn template() -> &'static str;
}

impl ConfigFile for ControllerConfig {
    const FILE_NAME: &'static str = "controller.toml";

    fn template() -> &'static str {
        template::CONTROLLER_TEMPLATE
    }
}

impl ConfigFile for DeviceConfig {
    const FILE_NAME: &'static str = "device.toml";

    fn template() -> &'static str {
        template::DEVICE_TEMPLATE
    }
}

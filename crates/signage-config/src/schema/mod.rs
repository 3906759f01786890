//! Configuration schema types for the controller and the kiosk client.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod controller;
mod device;
mod system;

pub use controller::*;
pub use device::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration for the controller process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    pub server: ServerConfig,
    pub liveness: LivenessConfig,
    pub alerts: AlertThresholds,
    pub reboot: RebootConfig,
    pub ball: BallConfig,
    pub logging: LoggingConfig,
}

/// Root configuration for a kiosk device.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeviceConfig {
    pub device: IdentityConfig,
    pub server: EndpointConfig,
    pub connection: ConnectionConfig,
    pub cache: CacheConfig,
    pub display: DisplayConfig,
    pub system: SystemConfig,
    pub logging: LoggingConfig,
}

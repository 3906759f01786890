//! Controller configuration sections.

use serde::{Deserialize, Serialize};

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Seconds a fresh socket has to send `registerDevice`.
    pub register_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8085".into(),
            register_timeout_secs: 10,
        }
    }
}

/// Heartbeat-recency sweep. Disabled when `heartbeat_timeout_secs` is 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub heartbeat_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 0,
            sweep_interval_secs: 10,
        }
    }
}

impl LivenessConfig {
    pub fn enabled(&self) -> bool {
        self.heartbeat_timeout_secs > 0
    }
}

/// Advisory alert thresholds evaluated on every heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Percent.
    pub cpu_load: f64,
    /// Percent.
    pub memory_usage: f64,
    /// Percent.
    pub disk_usage: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature: 75.0,
            cpu_load: 85.0,
            memory_usage: 90.0,
            disk_usage: 90.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RebootConfig {
    /// Delay before checking whether a rebooted device came back.
    pub verify_after_secs: u64,
}

impl Default for RebootConfig {
    fn default() -> Self {
        Self {
            verify_after_secs: 180,
        }
    }
}

/// Ball hand-off geometry and policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    /// Distance from the right edge at which a rightward ball leaves the screen.
    pub edge_margin: f64,
    /// Width assumed for devices that have not reported a screen size.
    pub default_screen_width: u32,
    /// Offset from the entered edge where the ball appears on the next screen.
    pub entry_offset: f64,
    pub bounce_damping: f64,
    pub zone_width: u32,
    /// Only ids with this prefix take part in zones and hand-off.
    pub device_prefix: String,
    pub initial_holder: String,
    /// Let the ball pass from the last device to the first and back.
    /// Chain ends bounce when false.
    pub wrap_around: bool,
    /// Move the ball to a neighbour when its holder disconnects.
    pub failover_on_disconnect: bool,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            edge_margin: 250.0,
            default_screen_width: 1024,
            entry_offset: 10.0,
            bounce_damping: 0.8,
            zone_width: 10,
            device_prefix: "device".into(),
            initial_holder: "device1".into(),
            wrap_around: false,
            failover_on_disconnect: true,
        }
    }
}

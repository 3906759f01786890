//! Configuration validation.
//!
//! Each root config collects every range error into a single
//! `ConfigError::ValidationError`.

mod helpers;


use std::net::SocketAddr;

use signage_common::ConfigError;

use crate::schema::{ControllerConfig, DeviceConfig};
use helpers::{validate_non_empty, validate_range, validate_range_f64};

/// Implemented by root configs so the loader can validate generically.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

fn finish(errors: Vec<String>) -> Result<(), ConfigError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

impl Validate for ControllerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.listen_addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.listen_addr = {} is not a socket address",
                self.server.listen_addr
            ));
        }
        validate_range(
            &mut errors,
            "server.register_timeout_secs",
            self.server.register_timeout_secs,
            1,
            300,
        );
        validate_range(
            &mut errors,
            "liveness.sweep_interval_secs",
            self.liveness.sweep_interval_secs,
            1,
            3600,
        );

        for (name, value) in [
            ("alerts.cpu_load", self.alerts.cpu_load),
            ("alerts.memory_usage", self.alerts.memory_usage),
            ("alerts.disk_usage", self.alerts.disk_usage),
        ] {
            validate_range_f64(&mut errors, name, value, 0.0, 100.0);
        }
        validate_range_f64(
            &mut errors,
            "alerts.temperature",
            self.alerts.temperature,
            0.0,
            150.0,
        );

        validate_range_f64(
            &mut errors,
            "ball.bounce_damping",
            self.ball.bounce_damping,
            0.0,
            1.0,
        );
        validate_range(
            &mut errors,
            "ball.default_screen_width",
            u64::from(self.ball.default_screen_width),
            1,
            16_384,
        );
        validate_range(
            &mut errors,
            "ball.zone_width",
            u64::from(self.ball.zone_width),
            1,
            1000,
        );
        validate_non_empty(&mut errors, "ball.initial_holder", &self.ball.initial_holder);

        finish(errors)
    }
}

impl Validate for DeviceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        validate_non_empty(&mut errors, "device.id", &self.device.id);
        if !(self.server.url.starts_with("http://") || self.server.url.starts_with("https://")) {
            errors.push(format!(
                "server.url = {} must start with http:// or https://",
                self.server.url
            ));
        }
        validate_range(
            &mut errors,
            "connection.reconnect_interval_secs",
            self.connection.reconnect_interval_secs,
            1,
            3600,
        );
        validate_range(
            &mut errors,
            "connection.max_retries",
            u64::from(self.connection.max_retries),
            1,
            10_000,
        );
        validate_range(
            &mut errors,
            "connection.heartbeat_interval_secs",
            self.connection.heartbeat_interval_secs,
            1,
            600,
        );
        validate_range(
            &mut errors,
            "connection.health_timeout_secs",
            self.connection.health_timeout_secs,
            1,
            120,
        );
        validate_range(
            &mut errors,
            "cache.sweep_interval_secs",
            self.cache.sweep_interval_secs,
            60,
            7 * 24 * 3600,
        );
        validate_range(
            &mut errors,
            "display.check_interval_secs",
            self.display.check_interval_secs,
            1,
            3600,
        );
        validate_non_empty(&mut errors, "system.reboot_command", &self.system.reboot_command);

        finish(errors)
    }
}

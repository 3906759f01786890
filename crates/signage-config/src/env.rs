//! Environment overrides for the kiosk client.
//!
//! Kiosk images are provisioned with environment files, so these win over
//! the TOML file.

use std::path::PathBuf;

use tracing::warn;

use crate::schema::DeviceConfig;

/// Apply overrides from the process environment.
pub fn apply_device_env(config: &mut DeviceConfig) {
    apply_device_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides using `lookup` to resolve variable names.
///
/// `RECONNECT_INTERVAL` is in milliseconds and rounds up to whole seconds.
pub fn apply_device_overrides<F>(config: &mut DeviceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(id) = get("DEVICE_ID") {
        config.device.id = id;
    }
    if let Some(url) = get("SERVER_URL") {
        config.server.url = url;
    }
    if let Some(url) = get("SOCKET_URL") {
        config.server.socket_url = Some(url);
    }
    if let Some(dir) = get("CACHE_DIR") {
        config.cache.dir = PathBuf::from(dir);
    }
    if let Some(raw) = get("RECONNECT_INTERVAL") {
        match raw.trim().parse::<u64>() {
            Ok(ms) => config.connection.reconnect_interval_secs = ms.div_ceil(1000).max(1),
            Err(e) => warn!("ignoring RECONNECT_INTERVAL={raw}: {e}"),
        }
    }
    if let Some(raw) = get("MAX_RETRIES") {
        match raw.trim().parse::<u32>() {
            Ok(n) => config.connection.max_retries = n,
            Err(e) => warn!("ignoring MAX_RETRIES={raw}: {e}"),
        }
    }
}

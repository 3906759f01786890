//! Kiosk client configuration sections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use signage_common::generate_device_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            id: generate_device_id(),
        }
    }
}

/// Where the controller lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// HTTP base URL, used for `/health`.
    pub url: String,
    /// Socket URL. Derived from `url` when unset.
    pub socket_url: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8085".into(),
            socket_url: None,
        }
    }
}

impl EndpointConfig {
    pub fn health_url(&self) -> String {
        format!("{}/health", self.url.trim_end_matches('/'))
    }

    /// WebSocket URL for the device channel.
    ///
    /// `http(s)://` becomes `ws(s)://`, and a bare host gets the `/ws` path.
    pub fn ws_url(&self) -> String {
        let base = self.socket_url.as_deref().unwrap_or(&self.url);
        let converted = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };

        let after_scheme = converted
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&converted);
        if after_scheme.trim_end_matches('/').contains('/') {
            converted
        } else {
            format!("{}/ws", converted.trim_end_matches('/'))
        }
    }
}

/// Connection lifecycle timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub reconnect_interval_secs: u64,
    pub max_retries: u32,
    pub heartbeat_interval_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_secs: 5,
            max_retries: 10,
            heartbeat_interval_secs: 5,
            health_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub sweep_interval_secs: u64,
    /// Files older than this are removed unless their schedule is active.
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            sweep_interval_secs: 60 * 60,
            max_age_secs: 24 * 60 * 60,
        }
    }
}

/// Files shared with the kiosk browser shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub url_file: PathBuf,
    pub reload_flag_file: PathBuf,
    pub slideshow_file: PathBuf,
    pub check_interval_secs: u64,
    /// Screen size reported in heartbeats. 0 means unknown.
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            url_file: PathBuf::from("/home/pi/current_url.txt"),
            reload_flag_file: PathBuf::from("/home/pi/reload_flag"),
            slideshow_file: PathBuf::from("/home/pi/slideshow.json"),
            check_interval_secs: 30,
            screen_width: 0,
            screen_height: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub reboot_command: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            reboot_command: "sudo reboot".into(),
        }
    }
}

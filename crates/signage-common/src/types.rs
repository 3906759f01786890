//! Payload types shared by the controller and the device client.
//!
//! Field names serialize in camelCase so the wire format matches the
//! event vocabulary the kiosks and dashboard already speak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Device metrics
// ---------------------------------------------------------------------------

/// Health telemetry reported by a device. Every field is optional so a
/// heartbeat can carry any subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_load: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_downloads: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_schedules: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
}

impl DeviceMetrics {
    /// Overwrite only the fields present in `update`.
    pub fn merge(&mut self, update: DeviceMetrics) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.temperature, update.temperature);
        take(&mut self.uptime, update.uptime);
        take(&mut self.cpu_load, update.cpu_load);
        take(&mut self.memory_usage, update.memory_usage);
        take(&mut self.disk_usage, update.disk_usage);
        take(&mut self.current_url, update.current_url);
        take(&mut self.active_downloads, update.active_downloads);
        take(&mut self.active_schedules, update.active_schedules);
        take(&mut self.screen_width, update.screen_width);
        take(&mut self.screen_height, update.screen_height);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDevice {
    pub device_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub metrics: DeviceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub device_id: String,
    #[serde(flatten)]
    pub metrics: DeviceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAlert {
    pub device_id: String,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStale {
    pub device_id: String,
    pub last_heartbeat_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Display commands
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_slide_interval() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayUrl {
    pub url: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideshowConfig {
    pub images: Vec<String>,
    /// Milliseconds between slides.
    #[serde(default = "default_slide_interval")]
    pub interval: u64,
    #[serde(default)]
    pub shuffle: bool,
}

// ---------------------------------------------------------------------------
// Content scheduling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRequest {
    pub schedule_id: String,
    pub video_url: String,
    pub schedule_time: DateTime<Utc>,
    /// Retention hint in minutes.
    #[serde(default)]
    pub cache_duration: u32,
}

/// Lifecycle of a schedule on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Downloading,
    Ready,
    Playing,
    Error,
}

/// Download status as reported in `cacheProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheProgressStatus {
    Downloading,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheProgress {
    pub schedule_id: String,
    #[serde(default)]
    pub device_id: String,
    pub progress: u8,
    pub status: CacheProgressStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSchedule {
    pub schedule_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatusReport {
    pub device_id: String,
    pub schedule_id: String,
    pub status: CancelOutcome,
}

// ---------------------------------------------------------------------------
// Ball
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

/// Position report from the device currently animating the ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallPosition {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Velocity>,
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallPositionUpdate {
    pub device_id: String,
    pub x: f64,
    pub y: f64,
    pub velocity: Velocity,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub current_holder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallHolderUpdate {
    pub current_holder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_holder: Option<String>,
}

/// The single shared ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallState {
    pub x: f64,
    pub y: f64,
    pub velocity: Velocity,
    pub timestamp: i64,
    pub current_holder: String,
}

impl BallState {
    pub fn position_update(&self) -> BallPositionUpdate {
        BallPositionUpdate {
            device_id: self.current_holder.clone(),
            x: self.x,
            y: self.y,
            velocity: self.velocity,
            timestamp: self.timestamp,
            current_holder: self.current_holder.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneEdge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRect {
    pub position: ZoneEdge,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Hand-off regions on one device screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceZones {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<ZoneRect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<ZoneRect>,
}

impl DeviceZones {
    pub fn count(&self) -> usize {
        usize::from(self.left.is_some()) + usize::from(self.right.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneAssignment {
    pub device_id: String,
    pub zone: DeviceZones,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_fields_missing_from_update() {
        let mut metrics = DeviceMetrics {
            temperature: Some(50.0),
            cpu_load: Some(10.0),
            ..Default::default()
        };
        metrics.merge(DeviceMetrics {
            cpu_load: Some(20.0),
            disk_usage: Some(40.0),
            ..Default::default()
        });

        assert_eq!(metrics.temperature, Some(50.0));
        assert_eq!(metrics.cpu_load, Some(20.0));
        assert_eq!(metrics.disk_usage, Some(40.0));
        assert_eq!(metrics.memory_usage, None);
    }

    #[test]
    fn heartbeat_parses_partial_payload_with_nulls() {
        let json = r#"{"deviceId":"device1","temperature":61.5,"cpuLoad":null,"screenWidth":1920}"#;
        let hb: HeartbeatPayload = serde_json::from_str(json).unwrap();
        assert_eq!(hb.device_id.as_deref(), Some("device1"));
        assert_eq!(hb.metrics.temperature, Some(61.5));
        assert_eq!(hb.metrics.cpu_load, None);
        assert_eq!(hb.metrics.screen_width, Some(1920));
    }

    #[test]
    fn cache_request_parses_iso_timestamp() {
        let json = r#"{"scheduleId":"s1","videoUrl":"http://x/v.mp4","scheduleTime":"2030-01-01T12:00:00Z","cacheDuration":60}"#;
        let req: CacheRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.schedule_id, "s1");
        assert_eq!(req.cache_duration, 60);
        assert_eq!(req.schedule_time.to_rfc3339(), "2030-01-01T12:00:00+00:00");
    }

    #[test]
    fn display_url_defaults_to_active() {
        let cmd: DisplayUrl = serde_json::from_str(r#"{"url":"http://example.com"}"#).unwrap();
        assert!(cmd.active);
    }

    #[test]
    fn slideshow_defaults() {
        let cfg: SlideshowConfig = serde_json::from_str(r#"{"images":["a.png"]}"#).unwrap();
        assert_eq!(cfg.interval, 5000);
        assert!(!cfg.shuffle);
    }

    #[test]
    fn cancel_outcome_wire_names() {
        assert_eq!(
            serde_json::to_string(&CancelOutcome::NotFound).unwrap(),
            "\"not_found\""
        );
        assert_eq!(
            serde_json::to_string(&CacheProgressStatus::Complete).unwrap(),
            "\"complete\""
        );
    }

    #[test]
    fn zones_serialize_only_present_edges() {
        let zones = DeviceZones {
            left: None,
            right: Some(ZoneRect {
                position: ZoneEdge::Right,
                x: 1014,
                y: 0,
                width: 10,
                height: 600,
            }),
        };
        let json = serde_json::to_value(zones).unwrap();
        assert!(json.get("left").is_none());
        assert_eq!(json["right"]["position"], "right");
        assert_eq!(zones.count(), 1);
    }
}

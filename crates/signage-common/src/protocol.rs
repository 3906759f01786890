//! Wire protocol between kiosks, the controller, and dashboard observers.
//!
//! Every frame is a JSON text message `{ "event", "payload", "ref"? }`.
//! `ref` correlates an [`Ack`] with the request that asked for it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{
    BallHolderUpdate, BallPosition, BallPositionUpdate, CacheProgress, CacheRequest,
    CancelSchedule, DeviceAlert, DeviceRef, DeviceStale, DeviceUpdate, DisplayUrl,
    HeartbeatPayload, RegisterDevice, ScheduleStatusReport, SlideshowConfig, ZoneAssignment,
};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Untyped frame as it travels on the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub msg_ref: Option<u64>,
}

impl Envelope {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wrap a typed event, attaching an optional correlation ref.
    pub fn wrap<E: Serialize>(event: &E, msg_ref: Option<u64>) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(event)?;
        let event_name = value
            .get("event")
            .and_then(|e| e.as_str())
            .unwrap_or_default()
            .to_string();
        let payload = value
            .get("payload")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        Ok(Self {
            event: event_name,
            payload,
            msg_ref,
        })
    }

    /// Serialize a typed event straight to frame text.
    pub fn encode<E: Serialize>(event: &E, msg_ref: Option<u64>) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Self::wrap(event, msg_ref)?)
    }

    /// Decode the payload into one of the typed event enums.
    ///
    /// Events without data may arrive with no payload, `null`, or `{}`.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        match serde_json::from_value(self.tagged(Some(&self.payload))) {
            Err(e) if is_empty_object(&self.payload) => {
                serde_json::from_value(self.tagged(None)).map_err(|_| e)
            }
            decoded => decoded,
        }
    }

    fn tagged(&self, payload: Option<&serde_json::Value>) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("event".into(), serde_json::Value::String(self.event.clone()));
        if let Some(payload) = payload.filter(|p| !p.is_null()) {
            obj.insert("payload".into(), payload.clone());
        }
        serde_json::Value::Object(obj)
    }
}

fn is_empty_object(value: &serde_json::Value) -> bool {
    value.as_object().is_some_and(|m| m.is_empty())
}

// ---------------------------------------------------------------------------
// Acknowledgements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
    pub message: String,
}

impl Ack {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AckStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Typed events
// ---------------------------------------------------------------------------

/// Frames a device sends to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum DeviceEvent {
    RegisterDevice(RegisterDevice),
    Heartbeat(HeartbeatPayload),
    CacheProgress(CacheProgress),
    ScheduleStatus(ScheduleStatusReport),
    BallPosition(BallPosition),
    RequestBallPosition,
    UrlReceived(DisplayUrl),
}

/// Frames the controller sends to devices and observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ControllerEvent {
    Ack(Ack),

    // Targeted commands
    Reboot,
    DisplayUrl(DisplayUrl),
    ContentUpdate(DisplayUrl),
    SlideshowConfig(SlideshowConfig),
    CacheRequest(CacheRequest),
    CancelSchedule(CancelSchedule),

    // Ball coordination, sent to every device
    BallPositionUpdate(BallPositionUpdate),
    BallHolderUpdate(BallHolderUpdate),
    ZonesUpdated(Vec<ZoneAssignment>),

    // Fleet notifications for dashboard observers
    DevicesUpdated,
    DeviceUpdate(DeviceUpdate),
    DeviceAlert(DeviceAlert),
    DeviceRebootSucceeded(DeviceRef),
    DeviceRebootFailed(DeviceRef),
    CacheProgressUpdate(CacheProgress),
    DeviceStale(DeviceStale),
}

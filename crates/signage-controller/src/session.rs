//! Per-device session state and the handle used to reach its socket.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use signage_common::{
    new_connection_id, ConnectionId, ControllerEvent, DeviceMetrics, DeviceZones, DispatchError,
    Envelope,
};

/// Outbound frames buffered per socket before the hub starts dropping.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Opaque handle to one device socket.
///
/// The socket task owns the receiving half of the outbound channel and
/// watches the close token; the hub only ever holds this handle.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    close: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle plus the receiver its socket task should drain.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let handle = Self {
            id: new_connection_id(),
            outbound,
            close: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    /// False once closed or once the socket task has gone away.
    pub fn is_open(&self) -> bool {
        !self.close.is_cancelled() && !self.outbound.is_closed()
    }

    /// Ask the socket task to send a close frame and exit.
    pub fn close(&self) {
        self.close.cancel();
    }

    pub fn send(&self, event: &ControllerEvent) -> Result<(), DispatchError> {
        self.send_with_ref(event, None)
    }

    pub fn send_with_ref(
        &self,
        event: &ControllerEvent,
        msg_ref: Option<u64>,
    ) -> Result<(), DispatchError> {
        if !self.is_open() {
            return Err(DispatchError::Disconnected);
        }
        let text = match Envelope::encode(event, msg_ref) {
            Ok(text) => text,
            Err(e) => {
                warn!(connection = %self.id, error = %e, "failed to encode frame");
                return Ok(());
            }
        };
        match self.outbound.try_send(text) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(connection = %self.id, "outbound buffer full, dropping frame");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::Disconnected),
        }
    }
}

/// Server-side record of one connected device.
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub device_id: String,
    pub connection: ConnectionHandle,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub metrics: DeviceMetrics,
    pub current_url: Option<String>,
    pub zone: Option<DeviceZones>,
}

impl DeviceSession {
    pub fn new(device_id: &str, connection: ConnectionHandle, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.to_string(),
            connection,
            connected_at: now,
            last_heartbeat_at: now,
            metrics: DeviceMetrics::default(),
            current_url: None,
            zone: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Reported screen width, 0 until the device sends one.
    pub fn screen_width(&self) -> u32 {
        self.metrics.screen_width.unwrap_or(0)
    }

    pub fn screen_height(&self) -> u32 {
        self.metrics.screen_height.unwrap_or(0)
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.device_id.clone(),
            status: if self.is_connected() {
                "connected"
            } else {
                "disconnected"
            },
            connected_at: self.connected_at,
            last_heartbeat: self.last_heartbeat_at,
            metrics: self.metrics.clone(),
            current_url: self.current_url.clone(),
            screen_width: self.screen_width(),
            screen_height: self.screen_height(),
            zone: self.zone,
        }
    }
}

/// Value copy of a session as served by `GET /devices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub status: &'static str,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub metrics: DeviceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<DeviceZones>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_encodes_envelope() {
        let (handle, mut rx) = ConnectionHandle::new(4);
        handle
            .send_with_ref(&ControllerEvent::Reboot, Some(2))
            .unwrap();
        let text = rx.recv().await.unwrap();
        let env = Envelope::parse(&text).unwrap();
        assert_eq!(env.event, "reboot");
        assert_eq!(env.msg_ref, Some(2));
    }

    #[test]
    fn closed_handle_reports_disconnected() {
        let (handle, _rx) = ConnectionHandle::new(4);
        assert!(handle.is_open());
        handle.close();
        assert!(!handle.is_open());
        assert_eq!(
            handle.send(&ControllerEvent::Reboot),
            Err(DispatchError::Disconnected)
        );
    }

    #[test]
    fn dropped_receiver_means_closed() {
        let (handle, rx) = ConnectionHandle::new(4);
        drop(rx);
        assert!(!handle.is_open());
    }

    #[test]
    fn full_buffer_drops_without_error() {
        let (handle, _rx) = ConnectionHandle::new(1);
        handle.send(&ControllerEvent::DevicesUpdated).unwrap();
        assert!(handle.send(&ControllerEvent::DevicesUpdated).is_ok());
    }

    #[test]
    fn snapshot_reports_zero_screen_until_known() {
        let (handle, _rx) = ConnectionHandle::new(1);
        let mut session = DeviceSession::new("device1", handle, Utc::now());
        let snap = session.snapshot();
        assert_eq!(snap.screen_width, 0);
        assert_eq!(snap.status, "connected");

        session.metrics.screen_width = Some(1920);
        assert_eq!(session.snapshot().screen_width, 1920);
    }
}

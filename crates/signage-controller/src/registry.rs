//! In-memory table of online devices.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use signage_common::{
    ConnectionId, ControllerEvent, DeviceAlert, DeviceMetrics, DeviceUpdate, EventBus,
    ZoneAssignment,
};
use signage_config::schema::AlertThresholds;

use crate::alerts::check_alerts;
use crate::session::{ConnectionHandle, DeviceSession, DeviceSnapshot};
use crate::zones::DeviceScreen;

/// What a heartbeat changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatOutcome {
    pub screen_changed: bool,
    pub alert_count: usize,
}

/// Device Session Registry. At most one session per device id.
pub struct Registry {
    sessions: HashMap<String, DeviceSession>,
    thresholds: AlertThresholds,
    bus: EventBus,
}

impl Registry {
    pub fn new(thresholds: AlertThresholds, bus: EventBus) -> Self {
        Self {
            sessions: HashMap::new(),
            thresholds,
            bus,
        }
    }

    /// Register `connection` as the live session for `device_id`.
    ///
    /// Any previous connection for the id is closed first. Returns false if
    /// the id is unusable.
    pub fn register(
        &mut self,
        device_id: &str,
        connection: ConnectionHandle,
        now: DateTime<Utc>,
    ) -> bool {
        if device_id.trim().is_empty() {
            warn!("rejecting registration with empty device id");
            return false;
        }

        if let Some(previous) = self.sessions.get(device_id) {
            if previous.connection.id() != connection.id() {
                info!(
                    device_id,
                    old_connection = %previous.connection.id(),
                    new_connection = %connection.id(),
                    "replacing existing session"
                );
                previous.connection.close();
            }
        }

        info!(device_id, connection = %connection.id(), "device registered");
        self.sessions.insert(
            device_id.to_string(),
            DeviceSession::new(device_id, connection, now),
        );
        self.bus.publish(ControllerEvent::DevicesUpdated);
        true
    }

    /// Force-close and remove a session.
    pub fn unregister(&mut self, device_id: &str) -> Option<DeviceSession> {
        let session = self.sessions.remove(device_id)?;
        session.connection.close();
        info!(device_id, "device unregistered");
        self.bus.publish(ControllerEvent::DevicesUpdated);
        Some(session)
    }

    /// Remove a session after its socket closed, but only if `connection_id`
    /// is still the live connection for that id.
    pub fn disconnected(&mut self, device_id: &str, connection_id: ConnectionId) -> bool {
        match self.sessions.get(device_id) {
            Some(session) if session.connection.id() == connection_id => {
                self.sessions.remove(device_id);
                info!(device_id, connection = %connection_id, "device disconnected");
                self.bus.publish(ControllerEvent::DevicesUpdated);
                true
            }
            Some(_) => {
                debug!(
                    device_id,
                    connection = %connection_id,
                    "ignoring disconnect from replaced connection"
                );
                false
            }
            None => false,
        }
    }

    /// Merge a partial metrics report into the session.
    ///
    /// Returns `None` for unknown devices; those heartbeats are dropped.
    pub fn heartbeat(
        &mut self,
        device_id: &str,
        update: DeviceMetrics,
        now: DateTime<Utc>,
    ) -> Option<HeartbeatOutcome> {
        let Some(session) = self.sessions.get_mut(device_id) else {
            warn!(device_id, "heartbeat from unregistered device dropped");
            return None;
        };

        let before = (session.metrics.screen_width, session.metrics.screen_height);
        // An empty URL means the device shows nothing.
        if let Some(url) = &update.current_url {
            session.current_url = (!url.is_empty()).then(|| url.clone());
        }
        session.metrics.merge(update);
        session.last_heartbeat_at = now;
        let screen_changed =
            before != (session.metrics.screen_width, session.metrics.screen_height);

        debug!(device_id, metrics = ?session.metrics, "heartbeat merged");

        let alerts = check_alerts(&session.metrics, &self.thresholds);
        let alert_count = alerts.len();
        if !alerts.is_empty() {
            warn!(device_id, alerts = %alerts.join(", "), "device alert");
            self.bus.publish(ControllerEvent::DeviceAlert(DeviceAlert {
                device_id: device_id.to_string(),
                alerts,
            }));
        }

        self.bus.publish(ControllerEvent::DeviceUpdate(DeviceUpdate {
            device_id: device_id.to_string(),
            metrics: session.metrics.clone(),
        }));

        Some(HeartbeatOutcome {
            screen_changed,
            alert_count,
        })
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceSession> {
        self.sessions.get(device_id)
    }

    pub fn get_mut(&mut self, device_id: &str) -> Option<&mut DeviceSession> {
        self.sessions.get_mut(device_id)
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.sessions
            .get(device_id)
            .is_some_and(DeviceSession::is_connected)
    }

    /// Snapshot of connected sessions, ordered by id.
    pub fn list(&self) -> Vec<DeviceSnapshot> {
        let mut list: Vec<DeviceSnapshot> = self
            .sessions
            .values()
            .filter(|s| s.is_connected())
            .map(DeviceSession::snapshot)
            .collect();
        list.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        list
    }

    /// Connected devices whose id starts with `prefix`, in chain order.
    pub fn screens(&self, prefix: &str) -> Vec<DeviceScreen> {
        let mut screens: Vec<DeviceScreen> = self
            .sessions
            .values()
            .filter(|s| s.is_connected() && s.device_id.starts_with(prefix))
            .map(|s| DeviceScreen {
                device_id: s.device_id.clone(),
                width: s.screen_width(),
                height: s.screen_height(),
            })
            .collect();
        screens.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        screens
    }

    /// Store freshly computed zones. Sessions outside the chain lose theirs.
    pub fn apply_zones(&mut self, assignments: &[ZoneAssignment]) {
        for session in self.sessions.values_mut() {
            session.zone = None;
        }
        for assignment in assignments {
            if let Some(session) = self.sessions.get_mut(&assignment.device_id) {
                session.zone = Some(assignment.zone);
            }
        }
    }

    /// Sessions whose last heartbeat is older than `timeout`.
    pub fn stale(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<(String, DateTime<Utc>)> {
        let mut stale: Vec<(String, DateTime<Utc>)> = self
            .sessions
            .values()
            .filter(|s| now - s.last_heartbeat_at > timeout)
            .map(|s| (s.device_id.clone(), s.last_heartbeat_at))
            .collect();
        stale.sort();
        stale
    }

    /// Send `event` to every connected device.
    pub fn broadcast(&self, event: &ControllerEvent) {
        for session in self.sessions.values() {
            if let Err(e) = session.connection.send(event) {
                debug!(device_id = %session.device_id, error = %e, "broadcast skipped");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

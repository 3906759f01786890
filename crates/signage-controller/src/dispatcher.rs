//! Command Dispatcher: targeted commands to a single device.
//!
//! Every command fails with [`DispatchError::NotFound`] when no session
//! exists and [`DispatchError::Disconnected`] when its socket is closed.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use signage_common::{
    CacheProgress, CacheProgressStatus, CacheRequest, CancelSchedule, ControllerEvent,
    DeviceRef, DispatchError, DisplayUrl, EventBus, ScheduleStatusReport, SlideshowConfig,
};

use crate::registry::Registry;
use crate::session::DeviceSession;

/// Immediate reply to a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub message: String,
}

impl CommandAck {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingUrl {
    msg_ref: u64,
    url: String,
}

pub struct Dispatcher {
    bus: EventBus,
    next_ref: u64,
    /// Latest unacknowledged `displayUrl` per device.
    pending_urls: HashMap<String, PendingUrl>,
    /// Last progress report per (device, schedule).
    cache_progress: HashMap<(String, String), CacheProgress>,
}

fn live_session<'a>(
    registry: &'a Registry,
    device_id: &str,
) -> Result<&'a DeviceSession, DispatchError> {
    let session = registry.get(device_id).ok_or(DispatchError::NotFound)?;
    if !session.is_connected() {
        return Err(DispatchError::Disconnected);
    }
    Ok(session)
}

impl Dispatcher {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            next_ref: 1,
            pending_urls: HashMap::new(),
            cache_progress: HashMap::new(),
        }
    }

    fn take_ref(&mut self) -> u64 {
        let r = self.next_ref;
        self.next_ref += 1;
        r
    }

    /// Send `reboot`. The caller arranges [`Dispatcher::verify_reboot`].
    pub fn reboot(
        &mut self,
        registry: &Registry,
        device_id: &str,
    ) -> Result<CommandAck, DispatchError> {
        let session = live_session(registry, device_id)?;
        session.connection.send(&ControllerEvent::Reboot)?;
        info!(device_id, "reboot command sent");
        Ok(CommandAck::new(format!(
            "Reboot command sent to device {device_id}"
        )))
    }

    /// Delayed reboot check: the device should be back by now.
    pub fn verify_reboot(&self, registry: &Registry, device_id: &str) -> bool {
        let device = DeviceRef {
            device_id: device_id.to_string(),
        };
        if registry.is_connected(device_id) {
            info!(device_id, "device came back after reboot");
            self.bus.publish(ControllerEvent::DeviceRebootSucceeded(device));
            true
        } else {
            warn!(device_id, "device did not come back after reboot");
            self.bus.publish(ControllerEvent::DeviceRebootFailed(device));
            false
        }
    }

    /// Record the new URL on the session, then send `displayUrl`.
    pub fn display_url(
        &mut self,
        registry: &mut Registry,
        device_id: &str,
        request: DisplayUrl,
    ) -> Result<CommandAck, DispatchError> {
        live_session(registry, device_id)?;
        let msg_ref = self.take_ref();

        let session = registry.get_mut(device_id).ok_or(DispatchError::NotFound)?;
        session.current_url = request.active.then(|| request.url.clone());
        session
            .connection
            .send_with_ref(&ControllerEvent::DisplayUrl(request.clone()), Some(msg_ref))?;

        info!(device_id, url = %request.url, active = request.active, "display URL sent");
        self.pending_urls.insert(
            device_id.to_string(),
            PendingUrl {
                msg_ref,
                url: request.url,
            },
        );
        Ok(CommandAck::new(format!("URL sent to device {device_id}")))
    }

    /// Device confirmed a `displayUrl`. Logging only.
    pub fn url_received(&mut self, device_id: &str, msg_ref: Option<u64>, echo: &DisplayUrl) {
        match self.pending_urls.get(device_id) {
            Some(pending) if msg_ref.is_none() || msg_ref == Some(pending.msg_ref) => {
                info!(device_id, url = %pending.url, active = echo.active, "device acknowledged URL");
                self.pending_urls.remove(device_id);
            }
            _ => {
                info!(device_id, url = %echo.url, "unsolicited URL acknowledgement");
            }
        }
    }

    pub fn slideshow(
        &mut self,
        registry: &Registry,
        device_id: &str,
        config: SlideshowConfig,
    ) -> Result<CommandAck, DispatchError> {
        let session = live_session(registry, device_id)?;
        let images = config.images.len();
        session
            .connection
            .send(&ControllerEvent::SlideshowConfig(config))?;
        info!(device_id, images, "slideshow config sent");
        Ok(CommandAck::new(format!(
            "Slideshow config sent to device {device_id}"
        )))
    }

    pub fn cache_request(
        &mut self,
        registry: &Registry,
        device_id: &str,
        request: CacheRequest,
    ) -> Result<CommandAck, DispatchError> {
        let session = live_session(registry, device_id)?;
        let schedule_id = request.schedule_id.clone();
        session
            .connection
            .send(&ControllerEvent::CacheRequest(request))?;
        info!(device_id, schedule_id = %schedule_id, "cache request sent");
        Ok(CommandAck::new(format!(
            "Cache request {schedule_id} sent to device {device_id}"
        )))
    }

    pub fn cancel_schedule(
        &mut self,
        registry: &Registry,
        device_id: &str,
        schedule_id: &str,
    ) -> Result<CommandAck, DispatchError> {
        let session = live_session(registry, device_id)?;
        session
            .connection
            .send(&ControllerEvent::CancelSchedule(CancelSchedule {
                schedule_id: schedule_id.to_string(),
            }))?;
        info!(device_id, schedule_id, "cancel schedule sent");
        Ok(CommandAck::new(format!(
            "Cancel for {schedule_id} sent to device {device_id}"
        )))
    }

    /// Track a `cacheProgress` report and forward it to observers.
    pub fn record_progress(&mut self, device_id: &str, mut progress: CacheProgress) {
        progress.device_id = device_id.to_string();
        match progress.status {
            CacheProgressStatus::Complete => {
                info!(device_id, schedule_id = %progress.schedule_id, "content cached");
            }
            CacheProgressStatus::Error => {
                warn!(device_id, schedule_id = %progress.schedule_id, "content caching failed");
            }
            CacheProgressStatus::Downloading => {}
        }
        self.cache_progress.insert(
            (device_id.to_string(), progress.schedule_id.clone()),
            progress.clone(),
        );
        self.bus
            .publish(ControllerEvent::CacheProgressUpdate(progress));
    }

    pub fn cache_status(&self, device_id: &str, schedule_id: &str) -> Option<CacheProgress> {
        self.cache_progress
            .get(&(device_id.to_string(), schedule_id.to_string()))
            .cloned()
    }

    pub fn schedule_status(&self, report: &ScheduleStatusReport) {
        info!(
            device_id = %report.device_id,
            schedule_id = %report.schedule_id,
            status = ?report.status,
            "schedule status"
        );
    }

    /// Drop per-device bookkeeping once a device is gone for good.
    pub fn forget(&mut self, device_id: &str) {
        self.pending_urls.remove(device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use signage_common::Envelope;
    use signage_config::schema::AlertThresholds;
    use tokio::sync::mpsc;

    use crate::session::ConnectionHandle;

    struct Fixture {
        registry: Registry,
        dispatcher: Dispatcher,
        bus: EventBus,
    }

    fn fixture() -> Fixture {
        let bus = EventBus::new(64);
        Fixture {
            registry: Registry::new(AlertThresholds::default(), bus.clone()),
            dispatcher: Dispatcher::new(bus.clone()),
            bus,
        }
    }

    fn connect(fx: &mut Fixture, id: &str) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (conn, rx) = ConnectionHandle::new(16);
        fx.registry.register(id, conn.clone(), Utc::now());
        (conn, rx)
    }

    fn next_frame(rx: &mut mpsc::Receiver<String>) -> Envelope {
        Envelope::parse(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn unknown_device_is_not_found() {
        let mut fx = fixture();
        let err = fx.dispatcher.reboot(&fx.registry, "nobody").unwrap_err();
        assert_eq!(err, DispatchError::NotFound);
        assert_eq!(err.to_string(), "device not found");

        let err = fx
            .dispatcher
            .slideshow(
                &fx.registry,
                "nobody",
                SlideshowConfig {
                    images: vec![],
                    interval: 5000,
                    shuffle: false,
                },
            )
            .unwrap_err();
        assert_eq!(err, DispatchError::NotFound);
    }

    #[test]
    fn closed_connection_is_disconnected() {
        let mut fx = fixture();
        let (conn, _rx) = connect(&mut fx, "device1");
        conn.close();

        let err = fx
            .dispatcher
            .display_url(
                &mut fx.registry,
                "device1",
                DisplayUrl {
                    url: "http://x".into(),
                    active: true,
                },
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "device disconnected");
        assert_eq!(fx.registry.get("device1").unwrap().current_url, None);
    }

    #[test]
    fn reboot_sends_frame() {
        let mut fx = fixture();
        let (_conn, mut rx) = connect(&mut fx, "device1");
        let ack = fx.dispatcher.reboot(&fx.registry, "device1").unwrap();
        assert_eq!(ack.message, "Reboot command sent to device device1");
        assert_eq!(next_frame(&mut rx).event, "reboot");
    }

    #[test]
    fn verify_reboot_publishes_outcome() {
        let mut fx = fixture();
        let mut events = fx.bus.subscribe();
        let (_conn, _rx) = connect(&mut fx, "device1");
        let _ = events.try_recv();

        assert!(fx.dispatcher.verify_reboot(&fx.registry, "device1"));
        assert!(matches!(
            events.try_recv().unwrap(),
            ControllerEvent::DeviceRebootSucceeded(_)
        ));

        assert!(!fx.dispatcher.verify_reboot(&fx.registry, "device2"));
        assert!(matches!(
            events.try_recv().unwrap(),
            ControllerEvent::DeviceRebootFailed(d) if d.device_id == "device2"
        ));
    }

    #[test]
    fn display_url_updates_session_before_ack() {
        let mut fx = fixture();
        let (_conn, mut rx) = connect(&mut fx, "device1");

        fx.dispatcher
            .display_url(
                &mut fx.registry,
                "device1",
                DisplayUrl {
                    url: "http://signage/a".into(),
                    active: true,
                },
            )
            .unwrap();
        assert_eq!(
            fx.registry.get("device1").unwrap().current_url.as_deref(),
            Some("http://signage/a")
        );
        let frame = next_frame(&mut rx);
        assert_eq!(frame.event, "displayUrl");
        assert!(frame.msg_ref.is_some());

        fx.dispatcher
            .display_url(
                &mut fx.registry,
                "device1",
                DisplayUrl {
                    url: "http://signage/a".into(),
                    active: false,
                },
            )
            .unwrap();
        assert_eq!(fx.registry.get("device1").unwrap().current_url, None);
    }

    #[test]
    fn url_ack_clears_pending() {
        let mut fx = fixture();
        let (_conn, mut rx) = connect(&mut fx, "device1");
        let request = DisplayUrl {
            url: "http://signage/b".into(),
            active: true,
        };
        fx.dispatcher
            .display_url(&mut fx.registry, "device1", request.clone())
            .unwrap();
        let msg_ref = next_frame(&mut rx).msg_ref;

        assert!(fx.dispatcher.pending_urls.contains_key("device1"));
        fx.dispatcher.url_received("device1", msg_ref, &request);
        assert!(!fx.dispatcher.pending_urls.contains_key("device1"));
    }

    #[test]
    fn progress_is_tracked_and_rebroadcast() {
        let mut fx = fixture();
        let mut events = fx.bus.subscribe();

        fx.dispatcher.record_progress(
            "device1",
            CacheProgress {
                schedule_id: "s1".into(),
                device_id: String::new(),
                progress: 40,
                status: CacheProgressStatus::Downloading,
            },
        );

        let status = fx.dispatcher.cache_status("device1", "s1").unwrap();
        assert_eq!(status.progress, 40);
        assert_eq!(status.device_id, "device1");
        assert!(matches!(
            events.try_recv().unwrap(),
            ControllerEvent::CacheProgressUpdate(p) if p.progress == 40
        ));
        assert!(fx.dispatcher.cache_status("device2", "s1").is_none());
    }

    #[test]
    fn cache_and_cancel_frames() {
        let mut fx = fixture();
        let (_conn, mut rx) = connect(&mut fx, "device1");

        fx.dispatcher
            .cache_request(
                &fx.registry,
                "device1",
                CacheRequest {
                    schedule_id: "s9".into(),
                    video_url: "http://cdn/v.mp4".into(),
                    schedule_time: Utc::now(),
                    cache_duration: 30,
                },
            )
            .unwrap();
        assert_eq!(next_frame(&mut rx).event, "cacheRequest");

        fx.dispatcher
            .cancel_schedule(&fx.registry, "device1", "s9")
            .unwrap();
        let frame = next_frame(&mut rx);
        assert_eq!(frame.event, "cancelSchedule");
        assert_eq!(frame.payload["scheduleId"], "s9");
    }
}

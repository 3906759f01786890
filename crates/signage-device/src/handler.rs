//! Inbound controller frames for one connected session.

use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use signage_common::{
    CacheRequest, CancelSchedule, ControllerEvent, DeviceEvent, DisplayUrl, Envelope,
    ScheduleStatusReport, SlideshowConfig,
};

use crate::ball::BallView;
use crate::Device;

/// Progress reports buffered per cache request before the download stalls.
const PROGRESS_CAPACITY: usize = 64;

pub struct Handler {
    device: Arc<Device>,
    outbound: mpsc::Sender<String>,
    ball: BallView,
}

impl Handler {
    pub fn new(device: Arc<Device>, outbound: mpsc::Sender<String>) -> Self {
        Self {
            device,
            outbound,
            ball: BallView::default(),
        }
    }

    pub fn ball(&self) -> &BallView {
        &self.ball
    }

    pub async fn handle(&mut self, envelope: Envelope) {
        let event = match envelope.decode::<ControllerEvent>() {
            Ok(event) => event,
            Err(e) => {
                debug!(event = %envelope.event, error = %e, "unhandled frame");
                return;
            }
        };

        match event {
            ControllerEvent::Ack(ack) => {
                if ack.is_success() {
                    debug!(msg_ref = ?envelope.msg_ref, message = %ack.message, "ack");
                } else {
                    warn!(msg_ref = ?envelope.msg_ref, message = %ack.message, "controller rejected request");
                }
            }
            ControllerEvent::Reboot => self.reboot(),
            ControllerEvent::DisplayUrl(command) | ControllerEvent::ContentUpdate(command) => {
                self.display_url(command, envelope.msg_ref).await;
            }
            ControllerEvent::SlideshowConfig(slideshow) => self.slideshow(slideshow).await,
            ControllerEvent::CacheRequest(request) => self.cache_request(request),
            ControllerEvent::CancelSchedule(cancel) => self.cancel_schedule(cancel).await,
            ControllerEvent::BallHolderUpdate(update) => {
                debug!(holder = %update.current_holder, "ball holder changed");
                self.ball.apply_holder(update);
            }
            ControllerEvent::BallPositionUpdate(update) => {
                self.ball.apply_position(update);
            }
            ControllerEvent::ZonesUpdated(assignments) => {
                self.ball.apply_zones(&assignments, self.device.id());
                debug!(zones = self.ball.zones.count(), "zones updated");
            }
            other => {
                debug!(?other, "ignoring fleet notification");
            }
        }
    }

    /// Queue a frame for the socket writer.
    pub fn send(&self, event: &DeviceEvent, msg_ref: Option<u64>) {
        match Envelope::encode(event, msg_ref) {
            Ok(text) => {
                if let Err(e) = self.outbound.try_send(text) {
                    warn!(error = %e, "outbound frame dropped");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode frame"),
        }
    }

    fn reboot(&self) {
        let command = self.device.config().system.reboot_command.clone();
        warn!(command = %command, "reboot requested by controller");
        tokio::spawn(async move {
            match Command::new("sh").arg("-c").arg(&command).status().await {
                Ok(status) if status.success() => info!("reboot command issued"),
                Ok(status) => warn!(%status, "reboot command failed"),
                Err(e) => error!(error = %e, "could not run reboot command"),
            }
        });
    }

    async fn display_url(&self, command: DisplayUrl, msg_ref: Option<u64>) {
        let result = if command.active {
            self.device.display().show(&command.url).await
        } else {
            self.device.display().blank().await
        };
        if let Err(e) = result {
            warn!(url = %command.url, error = %e, "failed to update display");
        }
        self.send(&DeviceEvent::UrlReceived(command), msg_ref);
    }

    async fn slideshow(&self, slideshow: SlideshowConfig) {
        if let Err(e) = self.device.display().set_slideshow(slideshow).await {
            warn!(error = %e, "failed to store slideshow config");
        }
    }

    /// Run the download in the background and forward its progress as
    /// `cacheProgress` frames.
    fn cache_request(&self, request: CacheRequest) {
        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CAPACITY);
        let scheduler = self.device.scheduler().clone();
        tokio::spawn(async move {
            scheduler.handle_cache_request(request, progress_tx).await;
        });

        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                let frame = match Envelope::encode(&DeviceEvent::CacheProgress(progress), None) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "failed to encode progress");
                        continue;
                    }
                };
                // The session may have ended; the download still completes.
                let _ = outbound.send(frame).await;
            }
        });
    }

    async fn cancel_schedule(&self, cancel: CancelSchedule) {
        let status = self.device.scheduler().cancel(&cancel.schedule_id).await;
        self.send(
            &DeviceEvent::ScheduleStatus(ScheduleStatusReport {
                device_id: self.device.id().to_string(),
                schedule_id: cancel.schedule_id,
                status,
            }),
            None,
        );
    }
}

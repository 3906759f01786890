//! The hub task: single owner of registry, dispatcher and ball state.
//!
//! Socket tasks and HTTP handlers talk to it through [`HubHandle`]. Each
//! command runs to completion before the next is taken off the channel,
//! so state transitions never interleave.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use signage_common::{
    Ack, BallState, CacheProgress, CacheRequest, ConnectionId, ControllerEvent, DeviceEvent,
    DeviceStale, DispatchError, DisplayUrl, Envelope, EventBus, SlideshowConfig,
};
use signage_config::ControllerConfig;

use crate::ball::{BallCoordinator, BallOutcome};
use crate::dispatcher::{CommandAck, Dispatcher};
use crate::error::ControllerError;
use crate::registry::Registry;
use crate::session::{ConnectionHandle, DeviceSnapshot};
use crate::zones::assign_zones;

const COMMAND_CAPACITY: usize = 1024;

type Reply<T> = oneshot::Sender<T>;
type DispatchReply = Reply<Result<CommandAck, DispatchError>>;

pub enum HubCommand {
    Register {
        device_id: String,
        connection: ConnectionHandle,
        msg_ref: Option<u64>,
        reply: Reply<bool>,
    },
    Inbound {
        device_id: String,
        connection_id: ConnectionId,
        envelope: Envelope,
    },
    Disconnected {
        device_id: String,
        connection_id: ConnectionId,
    },
    Unregister {
        device_id: String,
        reply: Reply<bool>,
    },
    List {
        reply: Reply<Vec<DeviceSnapshot>>,
    },
    Reboot {
        device_id: String,
        reply: DispatchReply,
    },
    DisplayUrl {
        device_id: String,
        request: DisplayUrl,
        reply: DispatchReply,
    },
    Slideshow {
        device_id: String,
        config: SlideshowConfig,
        reply: DispatchReply,
    },
    CacheRequest {
        device_id: String,
        request: CacheRequest,
        reply: DispatchReply,
    },
    CancelSchedule {
        device_id: String,
        schedule_id: String,
        reply: DispatchReply,
    },
    CacheStatus {
        device_id: String,
        schedule_id: String,
        reply: Reply<Option<CacheProgress>>,
    },
    Ball {
        reply: Reply<BallState>,
    },
    VerifyReboot {
        device_id: String,
    },
    SweepStale,
}

pub struct Hub {
    registry: Registry,
    dispatcher: Dispatcher,
    ball: BallCoordinator,
    bus: EventBus,
    config: ControllerConfig,
    commands: mpsc::WeakSender<HubCommand>,
}

impl Hub {
    /// Start the hub task and, when enabled, the liveness sweep ticker.
    pub fn spawn(config: ControllerConfig, bus: EventBus) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let hub = Hub::new(config, bus, tx.downgrade());

        if hub.config.liveness.enabled() {
            spawn_sweeper(
                tx.downgrade(),
                Duration::from_secs(hub.config.liveness.sweep_interval_secs),
            );
        }

        let task = tokio::spawn(hub.run(rx));
        (HubHandle { tx }, task)
    }

    fn new(
        config: ControllerConfig,
        bus: EventBus,
        commands: mpsc::WeakSender<HubCommand>,
    ) -> Self {
        Self {
            registry: Registry::new(config.alerts.clone(), bus.clone()),
            dispatcher: Dispatcher::new(bus.clone()),
            ball: BallCoordinator::new(config.ball.clone(), Utc::now().timestamp_millis()),
            bus,
            config,
            commands,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        info!("hub started");
        while let Some(command) = rx.recv().await {
            self.handle(command, Utc::now());
        }
        info!("hub stopped");
    }

    fn handle(&mut self, command: HubCommand, now: DateTime<Utc>) {
        match command {
            HubCommand::Register {
                device_id,
                connection,
                msg_ref,
                reply,
            } => {
                let ok = self.register(&device_id, connection, msg_ref, now);
                let _ = reply.send(ok);
            }
            HubCommand::Inbound {
                device_id,
                connection_id,
                envelope,
            } => self.inbound(&device_id, connection_id, envelope, now),
            HubCommand::Disconnected {
                device_id,
                connection_id,
            } => {
                if self.registry.disconnected(&device_id, connection_id) {
                    self.after_removal(&device_id, now);
                }
            }
            HubCommand::Unregister { device_id, reply } => {
                let removed = self.registry.unregister(&device_id).is_some();
                if removed {
                    self.after_removal(&device_id, now);
                }
                let _ = reply.send(removed);
            }
            HubCommand::List { reply } => {
                let _ = reply.send(self.registry.list());
            }
            HubCommand::Reboot { device_id, reply } => {
                let result = self.dispatcher.reboot(&self.registry, &device_id);
                if result.is_ok() {
                    self.schedule_reboot_check(device_id);
                }
                let _ = reply.send(result);
            }
            HubCommand::DisplayUrl {
                device_id,
                request,
                reply,
            } => {
                let result = self
                    .dispatcher
                    .display_url(&mut self.registry, &device_id, request);
                let _ = reply.send(result);
            }
            HubCommand::Slideshow {
                device_id,
                config,
                reply,
            } => {
                let _ = reply.send(self.dispatcher.slideshow(&self.registry, &device_id, config));
            }
            HubCommand::CacheRequest {
                device_id,
                request,
                reply,
            } => {
                let _ = reply.send(
                    self.dispatcher
                        .cache_request(&self.registry, &device_id, request),
                );
            }
            HubCommand::CancelSchedule {
                device_id,
                schedule_id,
                reply,
            } => {
                let _ = reply.send(self.dispatcher.cancel_schedule(
                    &self.registry,
                    &device_id,
                    &schedule_id,
                ));
            }
            HubCommand::CacheStatus {
                device_id,
                schedule_id,
                reply,
            } => {
                let _ = reply.send(self.dispatcher.cache_status(&device_id, &schedule_id));
            }
            HubCommand::Ball { reply } => {
                let _ = reply.send(self.ball.state().clone());
            }
            HubCommand::VerifyReboot { device_id } => {
                self.dispatcher.verify_reboot(&self.registry, &device_id);
            }
            HubCommand::SweepStale => self.sweep_stale(now),
        }
    }

    fn register(
        &mut self,
        device_id: &str,
        connection: ConnectionHandle,
        msg_ref: Option<u64>,
        now: DateTime<Utc>,
    ) -> bool {
        let ok = self.registry.register(device_id, connection.clone(), now);
        let ack = if ok {
            Ack::success(format!("Device {device_id} registered"))
        } else {
            Ack::error("registration failed")
        };
        let _ = connection.send_with_ref(&ControllerEvent::Ack(ack), msg_ref);
        if !ok {
            return false;
        }

        self.send_ball_snapshot(device_id, &connection, now);
        self.refresh_zones();
        true
    }

    fn inbound(
        &mut self,
        device_id: &str,
        connection_id: ConnectionId,
        envelope: Envelope,
        now: DateTime<Utc>,
    ) {
        let connection = match self.registry.get(device_id) {
            Some(session) if session.connection.id() == connection_id => {
                session.connection.clone()
            }
            _ => {
                debug!(device_id, event = %envelope.event, "dropping frame from stale connection");
                return;
            }
        };

        let event = match envelope.decode::<DeviceEvent>() {
            Ok(event) => event,
            Err(e) => {
                warn!(device_id, event = %envelope.event, error = %e, "unrecognised frame");
                if envelope.msg_ref.is_some() {
                    let ack = Ack::error(format!("unsupported event {}", envelope.event));
                    let _ = connection.send_with_ref(&ControllerEvent::Ack(ack), envelope.msg_ref);
                }
                return;
            }
        };

        match event {
            DeviceEvent::RegisterDevice(register) => {
                let ack = if register.device_id == device_id {
                    Ack::success(format!("Device {device_id} registered"))
                } else {
                    warn!(device_id, requested = %register.device_id, "re-registration under another id refused");
                    Ack::error("connection is already registered under another id")
                };
                let _ = connection.send_with_ref(&ControllerEvent::Ack(ack), envelope.msg_ref);
            }
            DeviceEvent::Heartbeat(heartbeat) => {
                if let Some(claimed) = heartbeat.device_id.as_deref() {
                    if claimed != device_id {
                        warn!(device_id, claimed, "heartbeat names another device");
                    }
                }
                if let Some(outcome) = self.registry.heartbeat(device_id, heartbeat.metrics, now) {
                    if outcome.screen_changed {
                        self.refresh_zones();
                    }
                    if envelope.msg_ref.is_some() {
                        let ack = ControllerEvent::Ack(Ack::success("heartbeat received"));
                        let _ = connection.send_with_ref(&ack, envelope.msg_ref);
                    }
                }
            }
            DeviceEvent::CacheProgress(progress) => {
                self.dispatcher.record_progress(device_id, progress);
            }
            DeviceEvent::ScheduleStatus(report) => self.dispatcher.schedule_status(&report),
            DeviceEvent::BallPosition(position) => {
                let holder_width = self.registry.get(device_id).map(|s| s.screen_width());
                let chain = self.registry.screens(&self.config.ball.device_prefix);
                let outcome = self.ball.handle_position(
                    device_id,
                    position,
                    holder_width,
                    &chain,
                    now.timestamp_millis(),
                );
                match outcome {
                    BallOutcome::Ignored => {}
                    BallOutcome::Moved(update) | BallOutcome::Bounced(update) => {
                        self.broadcast_all(ControllerEvent::BallPositionUpdate(update));
                    }
                    BallOutcome::HandedOff { holder, position } => {
                        self.broadcast_all(ControllerEvent::BallHolderUpdate(holder));
                        self.broadcast_all(ControllerEvent::BallPositionUpdate(position));
                    }
                }
            }
            DeviceEvent::RequestBallPosition => {
                self.send_ball_snapshot(device_id, &connection, now);
            }
            DeviceEvent::UrlReceived(echo) => {
                self.dispatcher
                    .url_received(device_id, envelope.msg_ref, &echo);
            }
        }
    }

    fn send_ball_snapshot(
        &self,
        device_id: &str,
        connection: &ConnectionHandle,
        now: DateTime<Utc>,
    ) {
        let snapshot = self.ball.snapshot_for(device_id, now.timestamp_millis());
        let _ = connection.send(&ControllerEvent::BallHolderUpdate(snapshot.holder));
        if let Some(position) = snapshot.position {
            let _ = connection.send(&ControllerEvent::BallPositionUpdate(position));
        }
    }

    /// Bookkeeping shared by every way a session can end.
    fn after_removal(&mut self, device_id: &str, now: DateTime<Utc>) {
        self.dispatcher.forget(device_id);
        self.refresh_zones();

        let chain = self.registry.screens(&self.config.ball.device_prefix);
        if let Some((holder, position)) =
            self.ball
                .fail_over(device_id, &chain, now.timestamp_millis())
        {
            self.broadcast_all(ControllerEvent::BallHolderUpdate(holder));
            self.broadcast_all(ControllerEvent::BallPositionUpdate(position));
        }
    }

    fn refresh_zones(&mut self) {
        let chain = self.registry.screens(&self.config.ball.device_prefix);
        let assignments = assign_zones(&chain, self.config.ball.zone_width);
        self.registry.apply_zones(&assignments);
        self.broadcast_all(ControllerEvent::ZonesUpdated(assignments));
    }

    /// Send to every device socket and every observer.
    fn broadcast_all(&self, event: ControllerEvent) {
        self.registry.broadcast(&event);
        self.bus.publish(event);
    }

    fn schedule_reboot_check(&self, device_id: String) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let delay = Duration::from_secs(self.config.reboot.verify_after_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(HubCommand::VerifyReboot { device_id }).await;
        });
    }

    fn sweep_stale(&mut self, now: DateTime<Utc>) {
        if !self.config.liveness.enabled() {
            return;
        }
        let timeout = chrono::Duration::seconds(
            i64::try_from(self.config.liveness.heartbeat_timeout_secs).unwrap_or(i64::MAX),
        );
        for (device_id, last_heartbeat_at) in self.registry.stale(now, timeout) {
            warn!(device_id = %device_id, %last_heartbeat_at, "no heartbeat within timeout, closing session");
            self.registry.unregister(&device_id);
            self.bus.publish(ControllerEvent::DeviceStale(DeviceStale {
                device_id: device_id.clone(),
                last_heartbeat_at,
            }));
            self.after_removal(&device_id, now);
        }
    }
}

fn spawn_sweeper(commands: mpsc::WeakSender<HubCommand>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(tx) = commands.upgrade() else {
                break;
            };
            if tx.send(HubCommand::SweepStale).await.is_err() {
                break;
            }
        }
        debug!("liveness sweeper stopped");
    });
}

/// Cloneable front door to the hub task.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn send(&self, command: HubCommand) -> Result<(), ControllerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ControllerError::HubStopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> HubCommand,
    ) -> Result<T, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| ControllerError::HubStopped)
    }

    async fn dispatch(
        &self,
        build: impl FnOnce(DispatchReply) -> HubCommand,
    ) -> Result<CommandAck, ControllerError> {
        Ok(self.request(build).await??)
    }

    pub async fn register(
        &self,
        device_id: &str,
        connection: ConnectionHandle,
        msg_ref: Option<u64>,
    ) -> Result<bool, ControllerError> {
        let device_id = device_id.to_string();
        self.request(|reply| HubCommand::Register {
            device_id,
            connection,
            msg_ref,
            reply,
        })
        .await
    }

    pub async fn inbound(
        &self,
        device_id: &str,
        connection_id: ConnectionId,
        envelope: Envelope,
    ) -> Result<(), ControllerError> {
        self.send(HubCommand::Inbound {
            device_id: device_id.to_string(),
            connection_id,
            envelope,
        })
        .await
    }

    pub async fn disconnected(
        &self,
        device_id: &str,
        connection_id: ConnectionId,
    ) -> Result<(), ControllerError> {
        self.send(HubCommand::Disconnected {
            device_id: device_id.to_string(),
            connection_id,
        })
        .await
    }

    pub async fn unregister(&self, device_id: &str) -> Result<bool, ControllerError> {
        let device_id = device_id.to_string();
        self.request(|reply| HubCommand::Unregister { device_id, reply })
            .await
    }

    pub async fn list(&self) -> Result<Vec<DeviceSnapshot>, ControllerError> {
        self.request(|reply| HubCommand::List { reply }).await
    }

    pub async fn reboot(&self, device_id: &str) -> Result<CommandAck, ControllerError> {
        let device_id = device_id.to_string();
        self.dispatch(|reply| HubCommand::Reboot { device_id, reply })
            .await
    }

    pub async fn display_url(
        &self,
        device_id: &str,
        request: DisplayUrl,
    ) -> Result<CommandAck, ControllerError> {
        let device_id = device_id.to_string();
        self.dispatch(|reply| HubCommand::DisplayUrl {
            device_id,
            request,
            reply,
        })
        .await
    }

    pub async fn slideshow(
        &self,
        device_id: &str,
        config: SlideshowConfig,
    ) -> Result<CommandAck, ControllerError> {
        let device_id = device_id.to_string();
        self.dispatch(|reply| HubCommand::Slideshow {
            device_id,
            config,
            reply,
        })
        .await
    }

    pub async fn cache_request(
        &self,
        device_id: &str,
        request: CacheRequest,
    ) -> Result<CommandAck, ControllerError> {
        let device_id = device_id.to_string();
        self.dispatch(|reply| HubCommand::CacheRequest {
            device_id,
            request,
            reply,
        })
        .await
    }

    pub async fn cancel_schedule(
        &self,
        device_id: &str,
        schedule_id: &str,
    ) -> Result<CommandAck, ControllerError> {
        let device_id = device_id.to_string();
        let schedule_id = schedule_id.to_string();
        self.dispatch(|reply| HubCommand::CancelSchedule {
            device_id,
            schedule_id,
            reply,
        })
        .await
    }

    pub async fn cache_status(
        &self,
        device_id: &str,
        schedule_id: &str,
    ) -> Result<Option<CacheProgress>, ControllerError> {
        let device_id = device_id.to_string();
        let schedule_id = schedule_id.to_string();
        self.request(|reply| HubCommand::CacheStatus {
            device_id,
            schedule_id,
            reply,
        })
        .await
    }

    pub async fn ball_state(&self) -> Result<BallState, ControllerError> {
        self.request(|reply| HubCommand::Ball { reply }).await
    }
}

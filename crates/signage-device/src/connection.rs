//! Connection manager: health check, connect, register, heartbeat, and
//! fixed-interval reconnect with a bounded retry count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use signage_common::{ConnectionError, ControllerEvent, DeviceEvent, Envelope, RegisterDevice};

use crate::handler::Handler;
use crate::Device;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
const OUTBOUND_CAPACITY: usize = 256;

enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

pub struct ConnectionManager {
    device: Arc<Device>,
    http: reqwest::Client,
    refs: Arc<AtomicU64>,
}

impl ConnectionManager {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            http: reqwest::Client::new(),
            refs: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Stay connected until `shutdown` fires. Returns an error once
    /// `max_retries` consecutive attempts have failed.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ConnectionError> {
        let connection = &self.device.config().connection;
        let retry_delay = Duration::from_secs(connection.reconnect_interval_secs);
        let mut attempts: u32 = 0;

        loop {
            info!("Attempting to connect to controller");
            let connected = tokio::select! {
                result = self.connect() => result,
                _ = shutdown.cancelled() => return Ok(()),
            };

            match connected {
                Ok(ws) => {
                    attempts = 0;
                    match self.session(ws, &shutdown).await {
                        SessionEnd::Shutdown => {
                            info!("Connection manager stopped");
                            return Ok(());
                        }
                        SessionEnd::Disconnected(reason) => {
                            warn!(reason = %reason, "Disconnected from controller");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempts + 1, "Connection attempt failed");
                    if attempts >= connection.max_retries {
                        error!("Maximum reconnection attempts reached. Stopping reconnection attempts.");
                        return Err(ConnectionError::RetriesExhausted(attempts));
                    }
                    attempts += 1;
                }
            }

            info!(delay_secs = retry_delay.as_secs(), "Scheduling reconnection");
            tokio::select! {
                _ = tokio::time::sleep(retry_delay) => {}
                _ = shutdown.cancelled() => return Ok(()),
            }
        }
    }

    async fn check_health(&self) -> Result<(), ConnectionError> {
        let config = self.device.config();
        let timeout = Duration::from_secs(config.connection.health_timeout_secs);
        let response = self
            .http
            .get(config.server.health_url())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ConnectionError::HealthCheck(e.to_string()))?;

        let status = response.status();
        debug!(%status, "Controller health check");
        if status.is_success() {
            Ok(())
        } else {
            Err(ConnectionError::HealthCheck(format!("status {status}")))
        }
    }

    async fn connect(&self) -> Result<WsStream, ConnectionError> {
        self.check_health().await?;

        let url = self.device.config().server.ws_url();
        info!(url = %url, "Connecting to controller socket");
        match tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(&url)).await {
            Ok(Ok((ws, _))) => Ok(ws),
            Ok(Err(e)) => Err(ConnectionError::Handshake(e.to_string())),
            Err(_) => Err(ConnectionError::Handshake(format!(
                "timed out after {}s",
                HANDSHAKE_TIMEOUT.as_secs()
            ))),
        }
    }

    /// One connected session: register, heartbeat, dispatch inbound frames.
    async fn session(&self, ws: WsStream, shutdown: &CancellationToken) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let done = CancellationToken::new();

        let writer_done = done.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => match frame {
                        Some(text) => {
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = writer_done.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        let mut handler = Handler::new(Arc::clone(&self.device), outbound.clone());
        let register_ref = next_ref(&self.refs);
        handler.send(
            &DeviceEvent::RegisterDevice(RegisterDevice {
                device_id: self.device.id().to_string(),
            }),
            Some(register_ref),
        );
        handler.send(&DeviceEvent::RequestBallPosition, None);

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.device),
            outbound,
            Duration::from_secs(self.device.config().connection.heartbeat_interval_secs),
            Arc::clone(&self.refs),
        ));

        let end = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break SessionEnd::Shutdown,
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let envelope = match Envelope::parse(text.as_str()) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                warn!(error = %e, "Malformed frame from controller");
                                continue;
                            }
                        };
                        if envelope.msg_ref == Some(register_ref) {
                            log_registration(&envelope);
                        } else {
                            handler.handle(envelope).await;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break SessionEnd::Disconnected(
                            frame.map(|f| f.reason.as_str().to_string()).unwrap_or_else(|| "closed".into()),
                        );
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionEnd::Disconnected(e.to_string()),
                    None => break SessionEnd::Disconnected("stream ended".into()),
                }
            }
        };

        heartbeat.abort();
        done.cancel();
        let _ = writer.await;
        end
    }
}

fn next_ref(refs: &AtomicU64) -> u64 {
    refs.fetch_add(1, Ordering::Relaxed)
}

fn log_registration(envelope: &Envelope) {
    match envelope.decode::<ControllerEvent>() {
        Ok(ControllerEvent::Ack(ack)) if ack.is_success() => {
            info!(message = %ack.message, "Device registered successfully");
        }
        Ok(other) => warn!(?other, "Device registration failed"),
        Err(e) => warn!(error = %e, "Unreadable registration reply"),
    }
}

/// Send a heartbeat every `period`, starting one period after connect,
/// whether or not earlier heartbeats were acknowledged.
async fn heartbeat_loop(
    device: Arc<Device>,
    outbound: mpsc::Sender<String>,
    period: Duration,
    refs: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let heartbeat = device.heartbeat().await;
        debug!(?heartbeat, "Sending heartbeat");
        let frame = match Envelope::encode(&DeviceEvent::Heartbeat(heartbeat), Some(next_ref(&refs))) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode heartbeat");
                continue;
            }
        };
        if outbound.send(frame).await.is_err() {
            break;
        }
    }
}

//! Per-socket handlers: register, then pump frames between socket and hub.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use signage_common::{ControllerEvent, DeviceEvent, Envelope, EventBus};

use crate::hub::HubHandle;
use crate::session::{ConnectionHandle, OUTBOUND_CAPACITY};

/// Handle one device socket from upgrade to close.
pub async fn handle_device(
    socket: WebSocket,
    addr: SocketAddr,
    hub: HubHandle,
    register_timeout: Duration,
) {
    let (mut sink, mut stream) = socket.split();

    // 1. Wait for registerDevice.
    let Some((device_id, msg_ref)) = read_register(&mut stream, addr, register_timeout).await
    else {
        let _ = sink.send(Message::Close(None)).await;
        return;
    };

    // 2. Create the outbound channel and hand the connection to the hub.
    let (connection, mut outbound) = ConnectionHandle::new(OUTBOUND_CAPACITY);
    let connection_id = connection.id();
    let close = connection.close_token();

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = close.cancelled() => {
                    // Flush whatever the hub queued before closing.
                    while let Ok(text) = outbound.try_recv() {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    match hub.register(&device_id, connection.clone(), msg_ref).await {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            connection.close();
            let _ = writer.await;
            return;
        }
    }

    info!(peer = %addr, device_id = %device_id, connection = %connection_id, "device connected");

    // 3. Read loop.
    let close = connection.close_token();
    loop {
        tokio::select! {
            _ = close.cancelled() => {
                debug!(device_id = %device_id, "connection closed by controller");
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match Envelope::parse(&text) {
                    Ok(envelope) => {
                        if hub.inbound(&device_id, connection_id, envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(device_id = %device_id, error = %e, "malformed frame dropped");
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(device_id = %device_id, error = %e, "WS error");
                    break;
                }
            }
        }
    }

    // 4. Cleanup.
    let _ = hub.disconnected(&device_id, connection_id).await;
    connection.close();
    let _ = writer.await;
    info!(peer = %addr, device_id = %device_id, connection = %connection_id, "device socket closed");
}

/// Wait for `registerDevice`, dropping anything that arrives first.
async fn read_register(
    stream: &mut SplitStream<WebSocket>,
    addr: SocketAddr,
    deadline: Duration,
) -> Option<(String, Option<u64>)> {
    let wait = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let envelope = match Envelope::parse(&text) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            warn!(peer = %addr, error = %e, "malformed frame before register");
                            continue;
                        }
                    };
                    match envelope.decode::<DeviceEvent>() {
                        Ok(DeviceEvent::RegisterDevice(register)) => {
                            return Some((register.device_id, envelope.msg_ref));
                        }
                        _ => {
                            warn!(peer = %addr, event = %envelope.event, "frame from unregistered connection dropped");
                        }
                    }
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!(peer = %addr, error = %e, "WS error before register");
                    return None;
                }
            }
        }
        debug!(peer = %addr, "connection closed before register");
        None
    };

    match tokio::time::timeout(deadline, wait).await {
        Ok(result) => result,
        Err(_) => {
            warn!(peer = %addr, "register timeout ({}s)", deadline.as_secs());
            None
        }
    }
}

/// Handle one dashboard observer: fleet broadcasts out, nothing in.
pub async fn handle_observer(socket: WebSocket, addr: SocketAddr, bus: EventBus) {
    let (mut sink, mut stream) = socket.split();
    let mut events = bus.subscribe();
    info!(peer = %addr, "observer connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(peer = %addr, skipped = n, "observer lagging");
                }
                Err(RecvError::Closed) => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    }

    info!(peer = %addr, "observer disconnected");
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &ControllerEvent,
) -> Result<(), axum::Error> {
    match Envelope::encode(event, None) {
        Ok(text) => sink.send(Message::Text(text)).await,
        Err(e) => {
            warn!(error = %e, "failed to encode observer event");
            Ok(())
        }
    }
}

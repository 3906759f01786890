//! Signage controller: device sessions, command dispatch and ball hand-off.
//!
//! All mutable state lives in the [`hub::Hub`] task. The axum surface in
//! [`routes`] and the per-socket tasks in [`connection`] only hold a
//! [`hub::HubHandle`].

pub mod alerts;
pub mod ball;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod registry;
pub mod routes;
pub mod session;
pub mod zones;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use signage_common::EventBus;
use signage_config::ControllerConfig;

pub use dispatcher::CommandAck;
pub use error::ControllerError;
pub use hub::{Hub, HubHandle};
pub use routes::AppState;

/// Fleet events buffered per observer before it starts lagging.
const BUS_CAPACITY: usize = 1024;

/// A running hub plus the state the HTTP surface needs.
pub struct Controller {
    state: AppState,
    hub_task: JoinHandle<()>,
}

impl Controller {
    pub fn start(config: ControllerConfig) -> Self {
        let bus = EventBus::new(BUS_CAPACITY);
        let register_timeout = Duration::from_secs(config.server.register_timeout_secs);
        let (hub, hub_task) = Hub::spawn(config, bus.clone());
        Self {
            state: AppState {
                hub,
                bus,
                register_timeout,
            },
            hub_task,
        }
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    pub fn hub(&self) -> &HubHandle {
        &self.state.hub
    }

    pub fn bus(&self) -> &EventBus {
        &self.state.bus
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;
        self.hub_task.abort();
        result
    }
}

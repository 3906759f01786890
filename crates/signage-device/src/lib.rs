//! Kiosk-side client for the signage controller.
//!
//! A [`Device`] owns the display pointer, the content cache and playback
//! scheduler, and the telemetry sampler. [`Device::run`] keeps it connected
//! to the controller until shutdown.

pub mod ball;
pub mod connection;
pub mod content_store;
pub mod display;
pub mod handler;
pub mod scheduler;
pub mod telemetry;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use signage_common::{ConnectionError, HeartbeatPayload};
use signage_config::DeviceConfig;

pub use ball::BallView;
pub use connection::ConnectionManager;
pub use content_store::{ActiveSchedules, ContentStore};
pub use display::Display;
pub use handler::Handler;
pub use scheduler::{CacheSchedule, Scheduler};
pub use telemetry::Telemetry;

pub struct Device {
    config: DeviceConfig,
    display: Display,
    scheduler: Scheduler,
    telemetry: Mutex<Telemetry>,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_telemetry(config, Telemetry::default())
    }

    pub fn with_telemetry(config: DeviceConfig, telemetry: Telemetry) -> Self {
        let display = Display::new(config.display.clone());
        let store = ContentStore::new(config.cache.dir.clone());
        let scheduler = Scheduler::new(config.device.id.clone(), store, display.clone());
        Self {
            config,
            display,
            scheduler,
            telemetry: Mutex::new(telemetry),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.device.id
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Build the periodic heartbeat: host telemetry plus what this device is
    /// doing right now.
    pub async fn heartbeat(&self) -> HeartbeatPayload {
        let mut metrics = self.telemetry.lock().await.sample().await;
        metrics.current_url = Some(self.display.current_url().await.unwrap_or_default());
        metrics.active_downloads = Some(self.scheduler.active_downloads().await);
        metrics.active_schedules = Some(self.scheduler.active_schedules().await);

        let display = &self.config.display;
        if display.screen_width > 0 && display.screen_height > 0 {
            metrics.screen_width = Some(display.screen_width);
            metrics.screen_height = Some(display.screen_height);
        }

        HeartbeatPayload {
            device_id: Some(self.id().to_string()),
            metrics,
        }
    }

    /// Start the periodic display check and cache sweep, then stay connected
    /// to the controller until `shutdown` fires or reconnection gives up.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<(), ConnectionError> {
        info!(
            device_id = %self.id(),
            server = %self.config.server.url,
            socket = %self.config.server.ws_url(),
            cache = %self.config.cache.dir.display(),
            "device starting"
        );

        if let Err(e) = self.scheduler.store().ensure_dir().await {
            warn!(error = %e, "cache directory unavailable");
        }

        let background = shutdown.child_token();
        let checks = tokio::spawn(self.display.clone().run_checks(background.clone()));
        let sweep = tokio::spawn(sweep_cache(
            self.scheduler.clone(),
            Duration::from_secs(self.config.cache.sweep_interval_secs.max(1)),
            Duration::from_secs(self.config.cache.max_age_secs),
            background.clone(),
        ));

        let result = ConnectionManager::new(Arc::clone(&self)).run(shutdown).await;

        background.cancel();
        let _ = checks.await;
        let _ = sweep.await;
        result
    }
}

async fn sweep_cache(
    scheduler: Scheduler,
    period: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match scheduler.store().sweep(&scheduler, max_age, SystemTime::now()).await {
                    Ok(removed) if !removed.is_empty() => {
                        info!(count = removed.len(), "cache sweep removed files");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "cache sweep failed"),
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

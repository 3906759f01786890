//! The "now displaying" pointer shared with the kiosk browser shell.
//!
//! The shell watches a URL file and a reload flag; writing both makes it
//! navigate. The in-memory pointer is what heartbeats report.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use signage_common::SlideshowConfig;
use signage_config::schema::DisplayConfig;

const BLANK_PAGE: &str = "about:blank";

#[derive(Clone)]
pub struct Display {
    config: Arc<DisplayConfig>,
    current: Arc<RwLock<String>>,
    slideshow: Arc<RwLock<Option<SlideshowConfig>>>,
}

impl Display {
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            config: Arc::new(config),
            current: Arc::new(RwLock::new(String::new())),
            slideshow: Arc::new(RwLock::new(None)),
        }
    }

    /// Point the kiosk at `url` and ask it to reload.
    pub async fn show(&self, url: &str) -> io::Result<()> {
        self.write_url(url).await?;
        *self.current.write().await = url.to_string();
        info!(url, "display updated");
        Ok(())
    }

    /// Show a blank page and forget the current URL.
    pub async fn blank(&self) -> io::Result<()> {
        self.write_url(BLANK_PAGE).await?;
        self.current.write().await.clear();
        info!("display blanked");
        Ok(())
    }

    pub async fn play_file(&self, path: &Path) -> io::Result<()> {
        self.show(&format!("file://{}", path.display())).await
    }

    pub async fn current_url(&self) -> Option<String> {
        let current = self.current.read().await;
        (!current.is_empty()).then(|| current.clone())
    }

    pub async fn set_slideshow(&self, slideshow: SlideshowConfig) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(&slideshow)?;
        write_with_parent(&self.config.slideshow_file, &json).await?;
        info!(
            images = slideshow.images.len(),
            interval_ms = slideshow.interval,
            shuffle = slideshow.shuffle,
            "slideshow config stored"
        );
        *self.slideshow.write().await = Some(slideshow);
        Ok(())
    }

    pub async fn slideshow(&self) -> Option<SlideshowConfig> {
        self.slideshow.read().await.clone()
    }

    /// Re-read the URL file and adopt it if it diverged from memory.
    /// Returns true when the pointer changed.
    pub async fn check(&self) -> bool {
        let stored = match tokio::fs::read_to_string(&self.config.url_file).await {
            Ok(text) => text.trim().to_string(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
            Err(e) => {
                warn!(error = %e, "failed to read URL file");
                return false;
            }
        };
        let stored = if stored == BLANK_PAGE { String::new() } else { stored };

        let mut current = self.current.write().await;
        if *current == stored {
            return false;
        }
        info!(file = %stored, memory = %current, "URL mismatch, adopting file value");
        *current = stored;
        true
    }

    /// Run [`Display::check`] every `check_interval_secs` until cancelled.
    pub async fn run_checks(self, shutdown: CancellationToken) {
        let period = Duration::from_secs(self.config.check_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                _ = shutdown.cancelled() => break,
            }
        }
    }

    async fn write_url(&self, url: &str) -> io::Result<()> {
        write_with_parent(&self.config.url_file, url.as_bytes()).await?;
        write_with_parent(&self.config.reload_flag_file, b"reload").await
    }
}

async fn write_with_parent(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, contents).await
}

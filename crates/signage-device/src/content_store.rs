//! Local cache of scheduled media.
//!
//! Files are named `{scheduleId}{ext}` so the sweep can map a file back to
//! the schedule that owns it.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{StatusCode, Url};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use signage_common::DownloadError;

const DEFAULT_EXTENSION: &str = ".mp4";

/// Answers whether a cached file still belongs to a live schedule.
#[async_trait]
pub trait ActiveSchedules: Send + Sync {
    async fn is_active(&self, schedule_id: &str) -> bool;
}

#[derive(Clone)]
pub struct ContentStore {
    dir: PathBuf,
    client: reqwest::Client,
}

impl ContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        if tokio::fs::metadata(&self.dir).await.is_err() {
            tokio::fs::create_dir_all(&self.dir).await?;
            info!(dir = %self.dir.display(), "created cache directory");
        }
        Ok(())
    }

    /// Where the media for `schedule_id` fetched from `url` is cached.
    pub fn cache_path(&self, schedule_id: &str, url: &str) -> PathBuf {
        self.dir
            .join(format!("{schedule_id}{}", extension_of(url)))
    }

    /// Stream `url` into `dest`, sending a 0..=100 percentage after each
    /// chunk. Returns the number of bytes written. A partially written file
    /// is removed on failure.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: mpsc::Sender<u8>,
    ) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;

        let result: Result<u64, DownloadError> = async {
            let mut received = 0u64;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| DownloadError::Network(e.to_string()))?;
                file.write_all(&chunk).await?;
                received += chunk.len() as u64;
                let _ = progress.send(percent(received, total)).await;
            }
            file.flush().await?;
            Ok(received)
        }
        .await;

        if result.is_err() {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(dest).await {
                warn!(path = %dest.display(), error = %e, "failed to remove partial download");
            }
        }
        result
    }

    /// Delete files older than `max_age` whose schedule is no longer active.
    /// Returns the removed paths.
    pub async fn sweep(
        &self,
        active: &dyn ActiveSchedules,
        max_age: Duration,
        now: SystemTime,
    ) -> io::Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(removed),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= max_age {
                debug!(file = %path.display(), "keeping recent file");
                continue;
            }

            let schedule_id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if active.is_active(&schedule_id).await {
                debug!(file = %path.display(), "keeping file for active schedule");
                continue;
            }

            tokio::fs::remove_file(&path).await?;
            info!(file = %path.display(), "removed old cached file");
            removed.push(path);
        }

        Ok(removed)
    }
}

/// Extension of the URL path including the dot, ignoring the query string.
fn extension_of(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let file_name = path.rsplit('/').next().unwrap_or_default();
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn percent(received: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) if total > 0 => {
            let pct = (received as f64 / total as f64 * 100.0).round();
            pct.min(100.0) as u8
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use axum::http::StatusCode as HttpStatus;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    use super::*;

    struct Fixed(HashSet<String>);

    #[async_trait]
    impl ActiveSchedules for Fixed {
        async fn is_active(&self, schedule_id: &str) -> bool {
            self.0.contains(schedule_id)
        }
    }

    async fn media_server() -> String {
        let app = Router::new()
            .route("/media/clip.webm", get(|| async { vec![7u8; 64 * 1024] }))
            .route("/missing.mp4", get(|| async { HttpStatus::NOT_FOUND }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn extension_from_url_path() {
        assert_eq!(extension_of("http://cdn/x/clip.webm"), ".webm");
        assert_eq!(extension_of("http://cdn/x/clip.mov?token=a.b"), ".mov");
        assert_eq!(extension_of("http://cdn/x/stream"), ".mp4");
        assert_eq!(extension_of("not a url/clip.mkv"), ".mkv");
    }

    #[test]
    fn cache_path_is_named_by_schedule() {
        let store = ContentStore::new("/var/cache/signage");
        assert_eq!(
            store.cache_path("s42", "http://cdn/promo.webm"),
            PathBuf::from("/var/cache/signage/s42.webm")
        );
    }

    #[test]
    fn percent_rounds_and_caps() {
        assert_eq!(percent(1, Some(3)), 33);
        assert_eq!(percent(2, Some(3)), 67);
        assert_eq!(percent(10, Some(5)), 100);
        assert_eq!(percent(10, None), 0);
    }

    #[tokio::test]
    async fn download_streams_to_disk_with_progress() {
        let base = media_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let url = format!("{base}/media/clip.webm");
        let dest = store.cache_path("s1", &url);

        let (tx, mut rx) = mpsc::channel(1024);
        let bytes = store.download(&url, &dest, tx).await.unwrap();

        assert_eq!(bytes, 64 * 1024);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 64 * 1024);

        let mut reports = Vec::new();
        while let Some(p) = rx.recv().await {
            reports.push(p);
        }
        assert!(!reports.is_empty());
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reports.last(), Some(&100));
    }

    #[tokio::test]
    async fn non_200_is_status_error_and_leaves_no_file() {
        let base = media_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let url = format!("{base}/missing.mp4");
        let dest = store.cache_path("s2", &url);

        let (tx, _rx) = mpsc::channel(8);
        let err = store.download(&url, &dest, tx).await.unwrap_err();

        assert!(matches!(err, DownloadError::Status(404)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        let (tx, _rx) = mpsc::channel(8);
        let err = store
            .download(&format!("http://{addr}/a.mp4"), &dir.path().join("a.mp4"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Network(_)));
    }

    #[tokio::test]
    async fn sweep_keeps_recent_and_active_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        for name in ["old.mp4", "booked.mp4", "fresh.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let active = Fixed(HashSet::from(["booked".to_string()]));
        let day = Duration::from_secs(24 * 60 * 60);

        // Nothing is older than a day yet.
        let removed = store.sweep(&active, day, SystemTime::now()).await.unwrap();
        assert!(removed.is_empty());

        let later = SystemTime::now() + day * 2;
        let removed = store.sweep(&active, day, later).await.unwrap();

        let mut names: Vec<_> = removed
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["fresh.mp4", "old.mp4"]);
        assert!(dir.path().join("booked.mp4").exists());
    }

    #[tokio::test]
    async fn sweep_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path().join("absent"));
        let active = Fixed(HashSet::new());
        let removed = store
            .sweep(&active, Duration::from_secs(1), SystemTime::now())
            .await
            .unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn ensure_dir_creates_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path().join("a/b"));
        store.ensure_dir().await.unwrap();
        assert!(store.dir().is_dir());
    }
}

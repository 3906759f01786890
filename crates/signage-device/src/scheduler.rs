//! Playback scheduler: cache request in, timed display switch out.
//!
//! Each schedule moves `pending → downloading → ready → playing`, or ends in
//! `error` if the download fails. Failed downloads are never retried here;
//! the controller resends the request.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use tracing::{info, warn};

use signage_common::{
    CacheProgress, CacheProgressStatus, CacheRequest, CancelOutcome, ScheduleStatus,
};

use crate::content_store::{ActiveSchedules, ContentStore};
use crate::display::Display;

/// One entry of the local schedule table.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSchedule {
    pub schedule_id: String,
    pub video_url: String,
    pub schedule_time: DateTime<Utc>,
    pub cache_duration: u32,
    pub path: Option<PathBuf>,
    pub status: ScheduleStatus,
}

#[derive(Default)]
struct SchedulerState {
    schedules: HashMap<String, CacheSchedule>,
    downloads: HashSet<String>,
    timers: HashMap<String, AbortHandle>,
}

#[derive(Clone)]
pub struct Scheduler {
    device_id: String,
    store: ContentStore,
    display: Display,
    state: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    pub fn new(device_id: impl Into<String>, store: ContentStore, display: Display) -> Self {
        Self {
            device_id: device_id.into(),
            store,
            display,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Download the media for `request` and arrange its playback, reporting
    /// progress on `progress`. A request for a schedule whose download is
    /// already in flight is ignored.
    pub async fn handle_cache_request(
        &self,
        request: CacheRequest,
        progress: mpsc::Sender<CacheProgress>,
    ) {
        let schedule_id = request.schedule_id.clone();
        {
            let mut state = self.state.lock().await;
            if !state.downloads.insert(schedule_id.clone()) {
                info!(schedule_id = %schedule_id, "already downloading, request ignored");
                return;
            }
            state.schedules.insert(
                schedule_id.clone(),
                CacheSchedule {
                    schedule_id: schedule_id.clone(),
                    video_url: request.video_url.clone(),
                    schedule_time: request.schedule_time,
                    cache_duration: request.cache_duration,
                    path: None,
                    status: ScheduleStatus::Pending,
                },
            );
        }
        info!(schedule_id = %schedule_id, url = %request.video_url, "cache request accepted");

        let path = self.store.cache_path(&schedule_id, &request.video_url);
        self.set_status(&schedule_id, ScheduleStatus::Downloading).await;
        let _ = progress
            .send(self.report(&schedule_id, 0, CacheProgressStatus::Downloading))
            .await;

        let (chunk_tx, mut chunk_rx) = mpsc::channel::<u8>(64);
        let forward = async {
            while let Some(pct) = chunk_rx.recv().await {
                let _ = progress
                    .send(self.report(&schedule_id, pct, CacheProgressStatus::Downloading))
                    .await;
            }
        };
        let (result, ()) = tokio::join!(
            self.store.download(&request.video_url, &path, chunk_tx),
            forward
        );

        self.state.lock().await.downloads.remove(&schedule_id);

        match result {
            Ok(bytes) => {
                info!(schedule_id = %schedule_id, bytes, path = %path.display(), "content cached");
                {
                    let mut state = self.state.lock().await;
                    if let Some(entry) = state.schedules.get_mut(&schedule_id) {
                        entry.path = Some(path.clone());
                        entry.status = ScheduleStatus::Ready;
                    }
                }
                let _ = progress
                    .send(self.report(&schedule_id, 100, CacheProgressStatus::Complete))
                    .await;
                self.schedule_playback(&schedule_id, path, request.schedule_time, Utc::now())
                    .await;
            }
            Err(e) => {
                warn!(schedule_id = %schedule_id, error = %e, "caching failed");
                self.set_status(&schedule_id, ScheduleStatus::Error).await;
                let _ = progress
                    .send(self.report(&schedule_id, 0, CacheProgressStatus::Error))
                    .await;
            }
        }
    }

    /// Play `path` at `at`, or right away if `at` is already past relative to
    /// `now`. Replaces any timer already pending for the schedule.
    pub async fn schedule_playback(
        &self,
        schedule_id: &str,
        path: PathBuf,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let delay = at - now;
        if delay < chrono::Duration::zero() {
            info!(schedule_id, "schedule time already passed, playing now");
            self.play(schedule_id, &path).await;
            return;
        }

        let delay = delay.to_std().unwrap_or_default();
        info!(schedule_id, at = %at, delay_ms = delay.as_millis() as u64, "playback scheduled");

        // Hold the lock across spawn and insert so the timer cannot fire
        // before its handle is recorded.
        let mut state = self.state.lock().await;
        let this = self.clone();
        let id = schedule_id.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire(&id, &path).await;
        });
        if let Some(previous) = state.timers.insert(schedule_id.to_string(), task.abort_handle()) {
            previous.abort();
        }
    }

    /// Cancel the pending playback of `schedule_id`.
    pub async fn cancel(&self, schedule_id: &str) -> CancelOutcome {
        let mut state = self.state.lock().await;
        match state.timers.remove(schedule_id) {
            Some(timer) => {
                timer.abort();
                state.schedules.remove(schedule_id);
                info!(schedule_id, "schedule cancelled");
                CancelOutcome::Cancelled
            }
            None => {
                info!(schedule_id, "no pending schedule to cancel");
                CancelOutcome::NotFound
            }
        }
    }

    /// Schedules waiting for their playback time.
    pub async fn active_schedules(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.state.lock().await.timers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn active_downloads(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.state.lock().await.downloads.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn schedule(&self, schedule_id: &str) -> Option<CacheSchedule> {
        self.state.lock().await.schedules.get(schedule_id).cloned()
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    async fn fire(&self, schedule_id: &str, path: &std::path::Path) {
        let still_booked = self.state.lock().await.timers.remove(schedule_id).is_some();
        if !still_booked {
            return;
        }
        self.play(schedule_id, path).await;
    }

    async fn play(&self, schedule_id: &str, path: &std::path::Path) {
        info!(schedule_id, path = %path.display(), "playing content");
        self.set_status(schedule_id, ScheduleStatus::Playing).await;
        if let Err(e) = self.display.play_file(path).await {
            warn!(schedule_id, error = %e, "failed to switch display");
        }
    }

    async fn set_status(&self, schedule_id: &str, status: ScheduleStatus) {
        if let Some(entry) = self.state.lock().await.schedules.get_mut(schedule_id) {
            entry.status = status;
        }
    }

    fn report(&self, schedule_id: &str, progress: u8, status: CacheProgressStatus) -> CacheProgress {
        CacheProgress {
            schedule_id: schedule_id.to_string(),
            device_id: self.device_id.clone(),
            progress,
            status,
        }
    }
}

#[async_trait]
impl ActiveSchedules for Scheduler {
    /// A schedule is active while its media is downloading or its playback
    /// timer is pending.
    async fn is_active(&self, schedule_id: &str) -> bool {
        let state = self.state.lock().await;
        state.timers.contains_key(schedule_id) || state.downloads.contains(schedule_id)
    }
}

#[cfg(test)]
mod tests;

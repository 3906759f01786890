use std::path::Path;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Duration as ChronoDuration;
use tokio::net::TcpListener;

use signage_config::schema::DisplayConfig;

use super::*;

fn scheduler_in(dir: &Path) -> (Scheduler, Display) {
    let display = Display::new(DisplayConfig {
        url_file: dir.join("current_url.txt"),
        reload_flag_file: dir.join("reload_flag"),
        slideshow_file: dir.join("slideshow.json"),
        ..Default::default()
    });
    let store = ContentStore::new(dir.join("cache"));
    (Scheduler::new("device1", store, display.clone()), display)
}

async fn wait_for_url(display: &Display) -> Option<String> {
    for _ in 0..200 {
        if let Some(url) = display.current_url().await {
            return Some(url);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

async fn media_server() -> String {
    let app = Router::new()
        .route("/promo.mp4", get(|| async { vec![1u8; 32 * 1024] }))
        .route("/gone.mp4", get(|| async { StatusCode::GONE }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn collect(mut rx: mpsc::Receiver<CacheProgress>) -> Vec<(u8, CacheProgressStatus)> {
    let mut out = Vec::new();
    while let Some(p) = rx.recv().await {
        assert_eq!(p.device_id, "device1");
        out.push((p.progress, p.status));
    }
    out
}

#[tokio::test]
async fn past_schedule_plays_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, display) = scheduler_in(dir.path());
    let now = Utc::now();

    scheduler
        .schedule_playback("s1", dir.path().join("s1.mp4"), now - ChronoDuration::minutes(5), now)
        .await;

    let expected = format!("file://{}", dir.path().join("s1.mp4").display());
    assert_eq!(display.current_url().await, Some(expected));
    assert!(scheduler.active_schedules().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn future_schedule_fires_once_then_leaves_active_set() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, display) = scheduler_in(dir.path());
    let now = Utc::now();

    scheduler
        .schedule_playback("s1", dir.path().join("s1.mp4"), now + ChronoDuration::seconds(60), now)
        .await;
    assert_eq!(scheduler.active_schedules().await, vec!["s1".to_string()]);
    assert!(scheduler.is_active("s1").await);

    tokio::time::advance(Duration::from_secs(59)).await;
    tokio::task::yield_now().await;
    assert_eq!(display.current_url().await, None);

    tokio::time::advance(Duration::from_secs(2)).await;
    let url = wait_for_url(&display).await;
    assert!(url.unwrap().ends_with("s1.mp4"));
    assert!(scheduler.active_schedules().await.is_empty());
    assert!(!scheduler.is_active("s1").await);
}

#[tokio::test(start_paused = true)]
async fn cancel_removes_pending_timer() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, display) = scheduler_in(dir.path());
    let now = Utc::now();

    scheduler
        .schedule_playback("s1", dir.path().join("s1.mp4"), now + ChronoDuration::seconds(30), now)
        .await;

    assert_eq!(scheduler.cancel("s1").await, CancelOutcome::Cancelled);
    assert_eq!(scheduler.cancel("s1").await, CancelOutcome::NotFound);

    tokio::time::advance(Duration::from_secs(60)).await;
    tokio::task::yield_now().await;
    assert_eq!(display.current_url().await, None);
    assert!(scheduler.active_schedules().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn rescheduling_replaces_the_timer() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, display) = scheduler_in(dir.path());
    let now = Utc::now();

    scheduler
        .schedule_playback("s1", dir.path().join("first.mp4"), now + ChronoDuration::seconds(10), now)
        .await;
    scheduler
        .schedule_playback("s1", dir.path().join("second.mp4"), now + ChronoDuration::seconds(20), now)
        .await;
    assert_eq!(scheduler.active_schedules().await.len(), 1);

    tokio::time::advance(Duration::from_secs(15)).await;
    tokio::task::yield_now().await;
    assert_eq!(display.current_url().await, None);

    tokio::time::advance(Duration::from_secs(10)).await;
    let url = wait_for_url(&display).await.unwrap();
    assert!(url.ends_with("second.mp4"));
}

#[tokio::test]
async fn cache_request_downloads_then_plays() {
    let base = media_server().await;
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, display) = scheduler_in(dir.path());
    scheduler.store().ensure_dir().await.unwrap();

    let (tx, rx) = mpsc::channel(1024);
    let request = CacheRequest {
        schedule_id: "s7".into(),
        video_url: format!("{base}/promo.mp4"),
        schedule_time: Utc::now() - ChronoDuration::seconds(1),
        cache_duration: 60,
    };
    scheduler.handle_cache_request(request, tx).await;

    let reports = collect(rx).await;
    assert_eq!(reports.first(), Some(&(0, CacheProgressStatus::Downloading)));
    assert_eq!(reports.last(), Some(&(100, CacheProgressStatus::Complete)));
    assert!(reports[..reports.len() - 1]
        .iter()
        .all(|(_, status)| *status == CacheProgressStatus::Downloading));

    let cached = dir.path().join("cache/s7.mp4");
    assert_eq!(std::fs::metadata(&cached).unwrap().len(), 32 * 1024);
    assert_eq!(
        display.current_url().await,
        Some(format!("file://{}", cached.display()))
    );

    let entry = scheduler.schedule("s7").await.unwrap();
    assert_eq!(entry.status, ScheduleStatus::Playing);
    assert_eq!(entry.path.as_deref(), Some(cached.as_path()));
    assert!(scheduler.active_downloads().await.is_empty());
}

#[tokio::test]
async fn failed_download_reports_error_once() {
    let base = media_server().await;
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, display) = scheduler_in(dir.path());
    scheduler.store().ensure_dir().await.unwrap();

    let (tx, rx) = mpsc::channel(16);
    let request = CacheRequest {
        schedule_id: "s8".into(),
        video_url: format!("{base}/gone.mp4"),
        schedule_time: Utc::now(),
        cache_duration: 0,
    };
    scheduler.handle_cache_request(request, tx).await;

    let reports = collect(rx).await;
    assert_eq!(
        reports,
        vec![
            (0, CacheProgressStatus::Downloading),
            (0, CacheProgressStatus::Error)
        ]
    );
    assert_eq!(scheduler.schedule("s8").await.unwrap().status, ScheduleStatus::Error);
    assert_eq!(display.current_url().await, None);
    assert!(scheduler.active_downloads().await.is_empty());
}

#[tokio::test]
async fn duplicate_request_while_downloading_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, _display) = scheduler_in(dir.path());
    scheduler.state.lock().await.downloads.insert("s9".into());

    let (tx, rx) = mpsc::channel(16);
    let request = CacheRequest {
        schedule_id: "s9".into(),
        video_url: "http://127.0.0.1:9/never.mp4".into(),
        schedule_time: Utc::now(),
        cache_duration: 0,
    };
    scheduler.handle_cache_request(request, tx).await;

    assert!(collect(rx).await.is_empty());
    assert!(scheduler.schedule("s9").await.is_none());
    assert!(scheduler.is_active("s9").await);
}

//! HTTP and WebSocket surface.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use signage_common::{CacheRequest, DisplayUrl, EventBus, SlideshowConfig};

use crate::connection::{handle_device, handle_observer};
use crate::error::ControllerError;
use crate::hub::HubHandle;

#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub bus: EventBus,
    pub register_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(device_ws_handler))
        .route("/observe", get(observer_ws_handler))
        .route("/devices", get(list_devices))
        .route("/devices/:id", delete(unregister_device))
        .route("/devices/:id/reboot", post(reboot_device))
        .route("/devices/:id/url", post(send_url))
        .route("/devices/:id/slideshow", post(send_slideshow))
        .route("/devices/:id/cache", post(request_cache))
        .route(
            "/devices/:id/cache/:schedule_id",
            get(cache_status).delete(cancel_schedule),
        )
        .route("/ball", get(ball_state))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

async fn device_ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let timeout = state.register_timeout;
    ws.on_upgrade(move |socket| handle_device(socket, addr, hub, timeout))
}

async fn observer_ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let bus = state.bus.clone();
    ws.on_upgrade(move |socket| handle_observer(socket, addr, bus))
}

async fn list_devices(State(state): State<AppState>) -> Result<impl IntoResponse, ControllerError> {
    Ok(Json(state.hub.list().await?))
}

async fn unregister_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ControllerError> {
    if state.hub.unregister(&id).await? {
        Ok(Json(json!({ "message": format!("Device {id} unregistered") })))
    } else {
        Err(signage_common::DispatchError::NotFound.into())
    }
}

async fn reboot_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ControllerError> {
    Ok(Json(state.hub.reboot(&id).await?))
}

async fn send_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DisplayUrl>,
) -> Result<impl IntoResponse, ControllerError> {
    Ok(Json(state.hub.display_url(&id, request).await?))
}

async fn send_slideshow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<SlideshowConfig>,
) -> Result<impl IntoResponse, ControllerError> {
    Ok(Json(state.hub.slideshow(&id, config).await?))
}

/// Body of `POST /devices/:id/cache`. `scheduleTime` defaults to now.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheBody {
    schedule_id: String,
    video_url: String,
    #[serde(default)]
    schedule_time: Option<DateTime<Utc>>,
    #[serde(default)]
    cache_duration: u32,
}

async fn request_cache(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CacheBody>,
) -> Result<impl IntoResponse, ControllerError> {
    let request = CacheRequest {
        schedule_id: body.schedule_id,
        video_url: body.video_url,
        schedule_time: body.schedule_time.unwrap_or_else(Utc::now),
        cache_duration: body.cache_duration,
    };
    Ok(Json(state.hub.cache_request(&id, request).await?))
}

async fn cache_status(
    State(state): State<AppState>,
    Path((id, schedule_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ControllerError> {
    match state.hub.cache_status(&id, &schedule_id).await? {
        Some(progress) => Ok(Json(progress).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no progress reported" })),
        )
            .into_response()),
    }
}

async fn cancel_schedule(
    State(state): State<AppState>,
    Path((id, schedule_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ControllerError> {
    Ok(Json(state.hub.cancel_schedule(&id, &schedule_id).await?))
}

async fn ball_state(State(state): State<AppState>) -> Result<impl IntoResponse, ControllerError> {
    Ok(Json(state.hub.ball_state().await?))
}

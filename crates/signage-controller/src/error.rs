use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use signage_common::DispatchError;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("controller hub is not running")]
    HubStopped,
}

impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        let status = match self {
            ControllerError::Dispatch(_) => StatusCode::NOT_FOUND,
            ControllerError::HubStopped => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_keep_their_text() {
        let err: ControllerError = DispatchError::NotFound.into();
        assert_eq!(err.to_string(), "device not found");
        let err: ControllerError = DispatchError::Disconnected.into();
        assert_eq!(err.to_string(), "device disconnected");
    }

    #[test]
    fn status_codes() {
        let resp = ControllerError::from(DispatchError::NotFound).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = ControllerError::HubStopped.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

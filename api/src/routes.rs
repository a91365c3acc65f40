use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use picam_common::config::StreamConfig;
use picam_controller::{ControlSurface, LedError, SnapshotError};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::stream;

const INDEX_HTML: &str = include_str!("../static/index.html");

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub control: ControlSurface,
    pub stream: StreamConfig,
    /// Ends open video feeds on shutdown.
    pub cancel: CancellationToken,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/video-feed", get(video_feed))
        .route("/capture", post(capture))
        .route("/motion-status", get(motion_status))
        .route("/led", post(set_led))
        .route("/led/toggle-auto", post(toggle_auto))
        .route("/led/off", post(led_off))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Channel percentages as submitted by the control page. Kept as strings so
/// that blank or non-numeric input degrades to 0 instead of a 422.
#[derive(Debug, Default, Deserialize)]
struct LedForm {
    red: Option<String>,
    green: Option<String>,
    blue: Option<String>,
}

fn percentage(field: Option<&str>) -> f64 {
    field
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /: control page
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /video-feed: multipart MJPEG of the latest frames
async fn video_feed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let parts = stream::mjpeg_stream(
        Arc::clone(state.control.frames()),
        state.stream.clone(),
        state.cancel.clone(),
    );
    (
        [
            (header::CONTENT_TYPE, stream::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
}

/// POST /capture: save the latest frame and return it as a JPEG download
async fn capture(State(state): State<Arc<AppState>>) -> Response {
    match state.control.request_snapshot().await {
        Ok(snapshot) => (
            [
                (header::CONTENT_TYPE, snapshot.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", snapshot.filename),
                ),
            ],
            snapshot.bytes,
        )
            .into_response(),
        Err(SnapshotError::NotReady) => {
            (StatusCode::SERVICE_UNAVAILABLE, SnapshotError::NotReady.to_string()).into_response()
        }
        Err(e @ SnapshotError::Persist(_)) => {
            error!(error = %e, "snapshot failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /motion-status
async fn motion_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "motion": state.control.motion_status() }))
}

/// POST /led: form fields red/green/blue in percent
async fn set_led(
    State(state): State<Arc<AppState>>,
    form: Result<Form<LedForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(error = %rejection, "unreadable LED form, treating as all zero");
            LedForm::default()
        }
    };

    let result = state.control.set_manual_color(
        percentage(form.red.as_deref()),
        percentage(form.green.as_deref()),
        percentage(form.blue.as_deref()),
    );
    match result {
        Ok(_) => Json(json!({ "success": true })).into_response(),
        Err(e @ LedError::AutoModeActive) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": e.to_string() })),
        )
            .into_response(),
    }
}

/// POST /led/toggle-auto
async fn toggle_auto(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "motion_led_auto": state.control.toggle_auto_mode() }))
}

/// POST /led/off
async fn led_off(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.control.force_off();
    Json(json!({ "success": true }))
}

/// GET /healthz
async fn healthz(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let status = state.control.status();
    Json(json!({
        "frame_ready": status.frame_ready,
        "motion": status.motion,
        "auto": status.led.auto,
        "effective": status.led.effective.channels(),
    }))
}

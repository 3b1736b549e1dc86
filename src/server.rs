//! HTTP surface: `POST /translate`, `GET /health`, `GET /metrics`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::{metric_names, MetricSummary, MetricsRegistry};
use crate::translate::tagger::CaseMode;
use crate::translate::{TranslateOutcome, TranslationService};

/// Request bodies above this size are refused.
pub const BODY_LIMIT: usize = 1024 * 1024;

const INVALID_TEXT: &str = "text must be a string";
const TRANSLATION_FAILED: &str = "Error while translating.";
const UNKNOWN_PREFIX: &str = "Unknown word(s) detected, please check your spelling and casing:\n";

pub struct AppState {
    pub service: Arc<TranslationService>,
    pub metrics: Arc<MetricsRegistry>,
    /// In-flight translations, including ones whose client went away.
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(service: Arc<TranslationService>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            service,
            metrics,
            tasks: TaskTracker::new(),
        }
    }
}

/// Wait for every in-flight translation, then flush the cache.
/// Called once the server has stopped accepting requests.
pub async fn drain(state: &AppState) {
    state.tasks.close();
    if !state.tasks.is_empty() {
        info!(in_flight = state.tasks.len(), "waiting for in-flight translations");
    }
    state.tasks.wait().await;
    state.service.cache().flush().await;
}

#[derive(Debug, Serialize)]
struct TranslateResponse {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_summary))
        .route("/translate", post(translate))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_summary(State(state): State<Arc<AppState>>) -> Json<HashMap<String, MetricSummary>> {
    Json(state.metrics.summary())
}

/// POST /translate
///
/// The body is parsed by hand so every malformed payload gets the same 400.
async fn translate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("translate", %request_id);

    async move {
        let timing = state.metrics.span(metric_names::REQUEST);

        let Some((text, mode)) = parse_request(&body) else {
            warn!("rejecting request without a string `text`");
            return error_response(StatusCode::BAD_REQUEST, INVALID_TEXT);
        };

        // Run on a tracked task so a client disconnect does not abort a
        // generation or the cache write that follows it, and shutdown waits for it.
        let service = Arc::clone(&state.service);
        let task = state.tasks.spawn(
            async move { service.translate(&text, mode).await }.in_current_span(),
        );

        let response = match task.await {
            Ok(Ok(TranslateOutcome::Rejected { unknown })) => Json(TranslateResponse {
                text: format!("{UNKNOWN_PREFIX}{}", unknown.join(",\n")),
                cached: None,
            })
            .into_response(),
            Ok(Ok(TranslateOutcome::Served { text, cached })) => Json(TranslateResponse {
                text,
                cached: Some(cached),
            })
            .into_response(),
            Ok(Err(e)) => {
                error!(error = %e, "translation failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, TRANSLATION_FAILED)
            }
            Err(e) => {
                error!(error = %e, "translation task aborted");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, TRANSLATION_FAILED)
            }
        };

        timing.finish();
        response
    }
    .instrument(span)
    .await
}

/// Extract `text` (required string) and `caseSensitive` (optional bool, default true).
fn parse_request(body: &[u8]) -> Option<(String, CaseMode)> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let text = value.get("text")?.as_str()?.to_string();
    let case_sensitive = value
        .get("caseSensitive")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    Some((text, CaseMode::from_flag(case_sensitive)))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

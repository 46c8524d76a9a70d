//! HTTP surface: `POST /api/analyzeImage` plus a liveness check at `/health`.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::analyze::{self, AnalyzeError};
use crate::auth::{Authenticator, HttpAuthenticator};
use crate::config::{ConfigError, ServiceConfig};
use crate::models::{AnalyzeResponse, ErrorResponse};
use crate::vision::{LabelDetector, VisionClient};

pub const ANALYZE_PATH: &str = "/api/analyzeImage";

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<dyn Authenticator>,
    pub detector: Arc<dyn LabelDetector>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let authenticator =
            HttpAuthenticator::new(&config.auth_url, &config.auth_api_key, config.timeouts)?;
        let detector =
            VisionClient::new(&config.vision_url, &config.vision_api_key, config.timeouts)?;
        Ok(Self {
            authenticator: Arc::new(authenticator),
            detector: Arc::new(detector),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/health", get(health))
        .route(
            ANALYZE_PATH,
            post(analyze_image).fallback(method_not_allowed),
        )
        .layer(body_limit)
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn method_not_allowed(method: Method) -> AnalyzeError {
    AnalyzeError::MethodNotAllowed(method)
}

async fn analyze_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<AnalyzeResponse>, AnalyzeError> {
    let principal = state
        .authenticator
        .authenticate(request.headers())
        .await
        .map_err(|e| {
            if e.is_rejection() {
                warn!(reason = %e, "rejecting unauthenticated upload");
                AnalyzeError::Unauthorized
            } else {
                error!(error = %e, "authentication check failed");
                AnalyzeError::Internal
            }
        })?;

    // Auth runs first so an unauthenticated caller never reaches the form parser.
    let upload = analyze::read_image_upload(request).await?;

    let labels = analyze::analyze_upload(state.detector.as_ref(), &upload)
        .await
        .map_err(|e| {
            error!(error = %e, "label detection failed");
            AnalyzeError::Internal
        })?;

    info!(
        principal = %principal.id,
        bytes = upload.bytes.len(),
        labels = labels.len(),
        "image analyzed"
    );

    Ok(Json(AnalyzeResponse {
        description: analyze::describe_labels(&labels),
    }))
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = match &self {
            AnalyzeError::MethodNotAllowed(_) => {
                return (
                    StatusCode::METHOD_NOT_ALLOWED,
                    [(header::ALLOW, "POST")],
                    self.to_string(),
                )
                    .into_response();
            }
            AnalyzeError::MalformedUpload | AnalyzeError::MissingImage => StatusCode::BAD_REQUEST,
            AnalyzeError::Unauthorized => StatusCode::UNAUTHORIZED,
            AnalyzeError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

//! Label-detection client for a Cloud Vision compatible `images:annotate` API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{http_client, require_http_url, ConfigError, Timeouts};
use crate::models::LabelAnnotation;

pub const LABEL_DETECTION: &str = "LABEL_DETECTION";
pub const MAX_LABELS: u32 = 5;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("vision API returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("{0}")]
    Request(String),
    #[error("malformed vision API response: {0}")]
    Malformed(String),
    #[error("vision API error {code}: {message}")]
    Api { code: i32, message: String },
}

#[async_trait]
pub trait LabelDetector: Send + Sync {
    /// Labels for a base64-encoded image, in the order the service ranked them.
    async fn detect_labels(&self, image_base64: &str) -> Result<Vec<LabelAnnotation>, VisionError>;
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<AnnotateImageRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest<'a> {
    image: ImageContent<'a>,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

fn label_request(image_base64: &str) -> AnnotateRequest<'_> {
    AnnotateRequest {
        requests: vec![AnnotateImageRequest {
            image: ImageContent {
                content: image_base64,
            },
            features: vec![Feature {
                kind: LABEL_DETECTION,
                max_results: MAX_LABELS,
            }],
        }],
    }
}

/// Labels of the first per-image response. A response with no
/// `labelAnnotations` means nothing was detected and yields an empty list.
pub fn parse_labels(body: &str) -> Result<Vec<LabelAnnotation>, VisionError> {
    let parsed: AnnotateResponse =
        serde_json::from_str(body).map_err(|e| VisionError::Malformed(e.to_string()))?;

    let first = parsed
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| VisionError::Malformed("empty responses array".to_string()))?;

    if let Some(status) = first.error {
        return Err(VisionError::Api {
            code: status.code,
            message: status.message,
        });
    }

    Ok(first.label_annotations)
}

// ── HTTP client ──────────────────────────────────────────────────────────────

pub struct VisionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl VisionClient {
    pub fn new(endpoint: &str, api_key: &str, timeouts: Timeouts) -> Result<Self, ConfigError> {
        require_http_url("vision URL", endpoint)?;
        Ok(Self {
            client: http_client(timeouts)?,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl LabelDetector for VisionClient {
    async fn detect_labels(&self, image_base64: &str) -> Result<Vec<LabelAnnotation>, VisionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&label_request(image_base64))
            .send()
            .await
            .map_err(|e| {
                // the request URL carries the API key
                let e = e.without_url();
                if e.is_timeout() {
                    VisionError::Request(format!("TimeoutError: {e}"))
                } else if e.is_connect() {
                    VisionError::Request(format!("ConnectError: {e}"))
                } else {
                    VisionError::Request(format!("RequestError: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VisionError::Request(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(VisionError::Status {
                status: status.as_u16(),
                detail: body,
            });
        }

        parse_labels(&body)
    }
}

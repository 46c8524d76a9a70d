//! Client side of one upload → analyze → speak cycle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::analyze::IMAGE_FIELD;
use crate::config::{http_client, require_http_url, ConfigError, Timeouts};
use crate::models::{AnalyzeResponse, ErrorResponse, ImageUpload};
use crate::server::ANALYZE_PATH;
use crate::speech::{SpeechError, SpeechSynthesizer};

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no image selected")]
    NoImage,
    #[error("an upload is already in progress")]
    Busy,
    #[error("failed to read image {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("upload failed: {0}")]
    Request(String),
    #[error("server rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

/// Result of a completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub description: String,
    pub audio: String,
}

// ── Image loading ────────────────────────────────────────────────────────────

pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

impl ImageUpload {
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ClientError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            file_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned),
            content_type: Some(guess_content_type(path).to_string()),
            bytes,
        })
    }
}

// ── Analyze endpoint client ──────────────────────────────────────────────────

pub struct AnalyzeClient {
    client: reqwest::Client,
    url: String,
}

impl AnalyzeClient {
    pub fn new(server: &str, timeouts: Timeouts) -> Result<Self, ConfigError> {
        require_http_url("server URL", server)?;
        Ok(Self {
            client: http_client(timeouts)?,
            url: format!("{}{ANALYZE_PATH}", server.trim_end_matches('/')),
        })
    }

    pub async fn analyze(&self, image: ImageUpload, token: &str) -> Result<String, ClientError> {
        let file_name = image.file_name.unwrap_or_else(|| IMAGE_FIELD.to_string());
        let mut part = Part::bytes(image.bytes).file_name(file_name);
        if let Some(content_type) = image.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| ClientError::Request(e.to_string()))?;
        }
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message: rejection_message(response.text().await),
            });
        }

        response
            .json::<AnalyzeResponse>()
            .await
            .map(|r| r.description)
            .map_err(|e| ClientError::Request(e.to_string()))
    }
}

/// The server's `error` field when present, otherwise the raw body.
fn rejection_message<E: std::fmt::Display>(body: Result<String, E>) -> String {
    match body {
        Ok(body) => serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body),
        Err(e) => format!("unreadable body: {e}"),
    }
}

// ── Upload flow ──────────────────────────────────────────────────────────────

/// Holds the busy flag for as long as it lives.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates upload, analysis and speech. At most one cycle runs at a
/// time; a concurrent `run` fails with [`ClientError::Busy`].
pub struct UploadFlow {
    analyzer: AnalyzeClient,
    speech: Arc<dyn SpeechSynthesizer>,
    busy: AtomicBool,
}

impl UploadFlow {
    pub fn new(analyzer: AnalyzeClient, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            analyzer,
            speech,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn run(&self, image: Option<ImageUpload>, token: &str) -> Result<Outcome, ClientError> {
        let image = image.ok_or(ClientError::NoImage)?;
        let _guard = InFlight::acquire(&self.busy).ok_or(ClientError::Busy)?;

        debug!(bytes = image.bytes.len(), "uploading image");
        let description = self.analyzer.analyze(image, token).await?;
        info!(%description, "image described");

        let audio = self.speech.synthesize(&description).await?;
        Ok(Outcome { description, audio })
    }
}

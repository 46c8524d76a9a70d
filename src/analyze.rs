use axum::extract::{FromRequest, Multipart, Request};
use axum::http::Method;
use base64::prelude::*;
use tracing::warn;

use crate::models::{ImageUpload, LabelAnnotation};
use crate::vision::{LabelDetector, VisionError};

// ── Constants ────────────────────────────────────────────────────────────────

pub const IMAGE_FIELD: &str = "image";
const DESCRIPTION_PREFIX: &str = "The image contains: ";

// ── Error type ───────────────────────────────────────────────────────────────

/// Failures the analysis endpoint reports to its caller. Display strings are
/// the exact messages sent back.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Method {0} Not Allowed")]
    MethodNotAllowed(Method),
    #[error("Error parsing form data")]
    MalformedUpload,
    #[error("No image file uploaded")]
    MissingImage,
    #[error("Authentication failed")]
    Unauthorized,
    #[error("Error analyzing image")]
    Internal,
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Pulls the first non-empty file part named `image` out of a multipart body.
/// Other fields and any further `image` parts are ignored.
pub async fn read_image_upload(request: Request) -> Result<ImageUpload, AnalyzeError> {
    let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| {
        warn!(error = %e, "request is not a readable multipart form");
        AnalyzeError::MalformedUpload
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AnalyzeError::MissingImage),
            Err(e) => {
                warn!(error = %e, "failed to parse multipart body");
                return Err(AnalyzeError::MalformedUpload);
            }
        };

        // plain text fields named `image` are not files
        if field.name() != Some(IMAGE_FIELD) || field.file_name().is_none() {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(|e| {
            warn!(error = %e, "failed to read uploaded image");
            AnalyzeError::MalformedUpload
        })?;

        if bytes.is_empty() {
            continue;
        }

        return Ok(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
}

pub async fn analyze_upload(
    detector: &dyn LabelDetector,
    upload: &ImageUpload,
) -> Result<Vec<LabelAnnotation>, VisionError> {
    let content = BASE64_STANDARD.encode(&upload.bytes);
    detector.detect_labels(&content).await
}

pub fn describe_labels(labels: &[LabelAnnotation]) -> String {
    let joined = labels
        .iter()
        .map(|label| label.description.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{DESCRIPTION_PREFIX}{joined}.")
}

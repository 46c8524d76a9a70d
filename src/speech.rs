use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::{http_client, require_http_url, ConfigError, Timeouts};

const TEXT_TO_SPEECH_EVENT: &str = "text_to_speech";
const HANDLE_KEYS: &[&str] = &["audioUrl", "audio_url", "url"];

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech service returned {0}")]
    Status(u16),
    #[error("speech request failed: {0}")]
    Request(String),
    #[error("speech service returned no audio handle")]
    EmptyHandle,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Opaque handle (usually a URL) to audio for `text`.
    async fn synthesize(&self, text: &str) -> Result<String, SpeechError>;
}

#[derive(Serialize)]
struct SpeechEvent<'a> {
    event: &'static str,
    data: SpeechText<'a>,
}

#[derive(Serialize)]
struct SpeechText<'a> {
    text: &'a str,
}

/// Reduces a speech-service response body to its audio handle. JSON strings
/// are unwrapped, objects are searched for a known URL key, anything else is
/// taken verbatim.
pub fn audio_handle(body: &str) -> Result<String, SpeechError> {
    let trimmed = body.trim();
    let handle = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => HANDLE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_owned)
            .unwrap_or_default(),
        _ => trimmed.to_string(),
    };

    if handle.trim().is_empty() {
        return Err(SpeechError::EmptyHandle);
    }
    Ok(handle)
}

pub struct HttpSpeechClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSpeechClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeouts: Timeouts,
    ) -> Result<Self, ConfigError> {
        require_http_url("speech URL", endpoint)?;
        Ok(Self {
            client: http_client(timeouts)?,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<String, SpeechError> {
        let mut request = self.client.post(&self.endpoint).json(&SpeechEvent {
            event: TEXT_TO_SPEECH_EVENT,
            data: SpeechText { text },
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SpeechError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SpeechError::Request(e.to_string()))?;
        audio_handle(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_json_string() {
        assert_eq!(
            audio_handle(r#""https://cdn.example/a.mp3""#).unwrap(),
            "https://cdn.example/a.mp3"
        );
    }

    #[test]
    fn reads_url_from_object() {
        assert_eq!(
            audio_handle(r#"{"audioUrl":"https://cdn.example/b.mp3"}"#).unwrap(),
            "https://cdn.example/b.mp3"
        );
        assert_eq!(
            audio_handle(r#"{"url":"https://cdn.example/c.mp3","ok":true}"#).unwrap(),
            "https://cdn.example/c.mp3"
        );
    }

    #[test]
    fn plain_text_is_opaque_handle() {
        assert_eq!(
            audio_handle("  https://cdn.example/d.mp3\n").unwrap(),
            "https://cdn.example/d.mp3"
        );
    }

    #[test]
    fn empty_bodies_fail() {
        assert!(matches!(audio_handle(""), Err(SpeechError::EmptyHandle)));
        assert!(matches!(audio_handle(r#""""#), Err(SpeechError::EmptyHandle)));
        assert!(matches!(
            audio_handle(r#"{"status":"queued"}"#),
            Err(SpeechError::EmptyHandle)
        ));
    }

    #[test]
    fn event_payload_shape() {
        let event = SpeechEvent {
            event: TEXT_TO_SPEECH_EVENT,
            data: SpeechText { text: "hi" },
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            serde_json::json!({"event": "text_to_speech", "data": {"text": "hi"}})
        );
    }
}

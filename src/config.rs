use std::time::Duration;

use url::Url;

// ── Constants ────────────────────────────────────────────────────────────────

pub const USER_AGENT: &str = "blind-assistant-api/0.1";
pub const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),
    #[error("{name} is not a valid http(s) URL: {value}")]
    InvalidUrl { name: &'static str, value: String },
    #[error("upload limit must be greater than zero")]
    ZeroUploadLimit,
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

/// Connect and total timeouts applied to every outbound request.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub fn http_client(timeouts: Timeouts) -> Result<reqwest::Client, ConfigError> {
    reqwest::ClientBuilder::new()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ConfigError::Client(e.to_string()))
}

// ── Service configuration ────────────────────────────────────────────────────

/// Everything the analysis endpoint needs from the outside world. Handlers
/// receive this through router state and never read the process environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub vision_url: String,
    pub vision_api_key: String,
    pub auth_url: String,
    pub auth_api_key: String,
    pub timeouts: Timeouts,
    pub max_upload_bytes: usize,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("vision API key", &self.vision_api_key)?;
        require_non_empty("auth API key", &self.auth_api_key)?;
        require_http_url("vision URL", &self.vision_url)?;
        require_http_url("auth URL", &self.auth_url)?;
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        Ok(())
    }
}

fn require_non_empty(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(())
}

pub fn require_http_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
    };
    let parsed = Url::parse(value).map_err(|_| invalid())?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(invalid()),
    }
}

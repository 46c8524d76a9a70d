use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use blind_assistant_api::client::{AnalyzeClient, UploadFlow};
use blind_assistant_api::config::{ServiceConfig, Timeouts, DEFAULT_CONNECT_TIMEOUT, DEFAULT_VISION_URL};
use blind_assistant_api::models::ImageUpload;
use blind_assistant_api::server::{router, AppState};
use blind_assistant_api::speech::HttpSpeechClient;

/// Describe images aloud: analysis server and upload client
#[derive(Parser)]
#[command(name = "blind-assistant-api", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the image analysis server
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value = "8000")]
        port: u16,
        /// Label-detection API key
        #[arg(long, env = "VISION_API_KEY", hide_env_values = true)]
        vision_api_key: String,
        #[arg(long, env = "VISION_URL", default_value = DEFAULT_VISION_URL)]
        vision_url: String,
        /// Base URL of the authentication service
        #[arg(long, env = "AUTH_URL")]
        auth_url: String,
        #[arg(long, env = "AUTH_API_KEY", hide_env_values = true)]
        auth_api_key: String,
        /// Timeout for each outbound request
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
        /// Largest accepted upload, in MiB
        #[arg(long, default_value = "20")]
        max_upload_mb: usize,
    },
    /// Upload an image, print its description and the spoken audio handle
    Describe {
        image: PathBuf,
        /// Bearer token of the signed-in user
        #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
        token: String,
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
        /// Text-to-speech endpoint
        #[arg(long, env = "SPEECH_URL")]
        speech_url: String,
        #[arg(long, env = "SPEECH_API_KEY", hide_env_values = true)]
        speech_api_key: Option<String>,
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Serve {
            host,
            port,
            vision_api_key,
            vision_url,
            auth_url,
            auth_api_key,
            timeout_secs,
            max_upload_mb,
        } => {
            let config = ServiceConfig {
                vision_url,
                vision_api_key,
                auth_url,
                auth_api_key,
                timeouts: timeouts(timeout_secs),
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            };
            let app = router(AppState::from_config(&config)?);

            let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                .await
                .with_context(|| format!("failed to bind {host}:{port}"))?;
            tracing::info!("listening on {}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }

        Command::Describe {
            image,
            token,
            server,
            speech_url,
            speech_api_key,
            timeout_secs,
        } => {
            let timeouts = timeouts(timeout_secs);
            let speech = HttpSpeechClient::new(&speech_url, speech_api_key, timeouts)?;
            let flow = UploadFlow::new(AnalyzeClient::new(&server, timeouts)?, Arc::new(speech));

            let upload = ImageUpload::from_path(&image).await?;
            let outcome = flow.run(Some(upload), &token).await?;
            println!("{}", outcome.description);
            println!("{}", outcome.audio);
        }
    }

    Ok(())
}

fn timeouts(secs: u64) -> Timeouts {
    Timeouts {
        connect: DEFAULT_CONNECT_TIMEOUT,
        request: Duration::from_secs(secs),
    }
}

//! Eka Webhook Invoke - handles a single API gateway event.
//!
//! Reads one gateway event as JSON from stdin, runs it through the same
//! routing as the HTTP server and writes the `{statusCode, headers, body}`
//! response JSON to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eka_webhook::{handle_gateway_event, AppState, Config, GatewayEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging on stderr
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read event from stdin")?;

    let event: GatewayEvent =
        serde_json::from_str(&raw).context("Failed to parse gateway event")?;

    let state = AppState::from_config(Config::from_env()).context("Failed to create Eka client")?;
    let response = handle_gateway_event(&state, &event).await;

    info!(status_code = response.status_code, "invoke_complete");

    let mut out = serde_json::to_vec(&response).context("Failed to encode response")?;
    out.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&out).await.context("Failed to write response")?;
    stdout.flush().await.context("Failed to flush stdout")?;

    Ok(())
}

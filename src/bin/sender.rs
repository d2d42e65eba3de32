//! Audio Sender Application
//!
//! Captures audio from the default input device, chunks it on the wall
//! clock, and streams indexed Opus frames to a receiver over UDP.

use anyhow::Result;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiolink::{
    audio::{capture::CaptureSource, device},
    config::AppConfig,
    net::WireSender,
    pipeline::SendPipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting audiolink sender");

    let config = AppConfig::load_or_default("audiolink.toml")?;

    // Get target address from args or use default
    let target: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", config.network.udp_port))
        .parse()?;
    tracing::info!("Target receiver: {}", target);

    for name in device::input_device_names() {
        tracing::info!("Input device: {}", name);
    }

    let capture = CaptureSource::start(&config.pipeline)?;
    let readable = capture.readable();
    tracing::info!(
        "Capture started: {} Hz, {} channels, {} byte chunks every {} ms",
        config.pipeline.source_rate,
        config.pipeline.channels,
        config.pipeline.chunk_bytes(),
        config.pipeline.chunk_duration_ms()
    );

    let transport = WireSender::connect(target).await?;
    let pipeline = SendPipeline::new(&config.pipeline, capture, readable)?;

    tracing::info!("Streaming - press Ctrl+C to stop");

    tokio::select! {
        result = pipeline.run(transport) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted; shutting down");
        }
    }

    Ok(())
}

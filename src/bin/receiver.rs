//! Audio Receiver Application
//!
//! Receives indexed Opus frames over UDP, restores their order, and plays
//! the decoded audio on the default output device.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiolink::{
    audio::{device, playback::PlaybackSink},
    config::AppConfig,
    net::WireReceiver,
    pipeline::RecvPipeline,
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

    tracing::info!("Starting audiolink receiver");

    let config = AppConfig::load_or_default("audiolink.toml")?;

    // Get listen port from args or use default
    let port: u16 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => config.network.udp_port,
    };

    for name in device::output_device_names() {
        tracing::info!("Output device: {}", name);
    }

    let transport = WireReceiver::bind(port).await?;
    tracing::info!("Listening on {}", transport.local_addr()?);

    let sink = PlaybackSink::start(&config.pipeline)?;
    tracing::info!(
        "Playback started: {} Hz, {} channels",
        config.pipeline.codec_rate,
        config.pipeline.channels
    );

    let pipeline = RecvPipeline::new(&config.pipeline)?;

    tracing::info!("Waiting for audio - press Ctrl+C to stop");

    tokio::select! {
        result = pipeline.run(transport, sink) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted; shutting down");
        }
    }

    Ok(())
}

//! Pipeline and application configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Opus application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecMode {
    /// Optimized for speech
    Voice,
    /// Optimized for general audio
    Music,
    /// Restricted low-delay mode
    LowLatency,
}

/// Opus signal hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpusSignal {
    Auto,
    Voice,
    Music,
}

/// Opus encoder tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpusConfig {
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Encoder complexity, 0-10
    pub complexity: u8,
    /// Variable bitrate
    pub vbr: bool,
    /// Application mode
    pub mode: CodecMode,
    /// Signal type hint
    pub signal: OpusSignal,
}

impl Default for OpusConfig {
    fn default() -> Self {
        Self::music()
    }
}

impl OpusConfig {
    /// Settings suited to music and mixed program material
    pub fn music() -> Self {
        Self {
            bitrate: DEFAULT_BITRATE,
            complexity: 9,
            vbr: true,
            mode: CodecMode::Music,
            signal: OpusSignal::Music,
        }
    }

    /// Settings suited to speech
    pub fn voice() -> Self {
        Self {
            bitrate: 64_000,
            complexity: 7,
            vbr: true,
            mode: CodecMode::Voice,
            signal: OpusSignal::Voice,
        }
    }
}

/// Parameters of one streaming pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sample rate of the capture source in Hz
    pub source_rate: u32,
    /// Channel count, shared by source, codec, and sink
    pub channels: u16,
    /// Sample rate the codec operates at in Hz
    pub codec_rate: u32,
    /// Chunk emission cadence per second
    pub chunks_per_second: u32,
    /// End-to-end latency ceiling in milliseconds
    pub max_latency_ms: u32,
    /// Orderer window: out-of-order frames held before forcing progress
    pub max_unordered: usize,
    /// Encoder tuning
    pub opus: OpusConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_rate: DEFAULT_SOURCE_RATE,
            channels: DEFAULT_CHANNELS,
            codec_rate: CODEC_RATE,
            chunks_per_second: CHUNKS_PER_SECOND,
            max_latency_ms: MAX_LATENCY_MS,
            max_unordered: MAX_UNORDERED,
            opus: OpusConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Duration of one chunk in milliseconds
    pub fn chunk_duration_ms(&self) -> u32 {
        1000 / self.chunks_per_second
    }

    /// Duration of one chunk
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_millis(self.chunk_duration_ms() as u64)
    }

    /// Size of one source-rate PCM chunk in bytes (interleaved s16)
    pub fn chunk_bytes(&self) -> usize {
        (self.source_rate / self.chunks_per_second) as usize * self.channels as usize * 2
    }

    /// Input samples per chunk, per channel
    pub fn chunk_frames(&self) -> usize {
        (self.source_rate / self.chunks_per_second) as usize
    }

    /// Codec frame size in samples per channel
    pub fn frame_samples(&self) -> usize {
        (self.codec_rate / self.chunks_per_second) as usize
    }

    /// Total interleaved samples in one codec frame
    pub fn samples_per_frame(&self) -> usize {
        self.frame_samples() * self.channels as usize
    }

    /// Number of codec frames covered by the latency ceiling
    pub fn window_frames(&self) -> usize {
        (self.max_latency_ms / self.chunk_duration_ms()) as usize
    }

    /// Reject parameter combinations the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.chunks_per_second == 0 || 1000 % self.chunks_per_second != 0 {
            return Err(Error::Config(format!(
                "chunks_per_second must divide 1000, got {}",
                self.chunks_per_second
            )));
        }
        if self.source_rate % self.chunks_per_second != 0
            || self.codec_rate % self.chunks_per_second != 0
        {
            return Err(Error::Config(format!(
                "sample rates {}/{} not divisible by cadence {}",
                self.source_rate, self.codec_rate, self.chunks_per_second
            )));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(Error::Config(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        if self.window_frames() == 0 {
            return Err(Error::Config(format!(
                "max_latency_ms {} shorter than one chunk ({} ms)",
                self.max_latency_ms,
                self.chunk_duration_ms()
            )));
        }
        Ok(())
    }
}

/// Network endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UDP port the receiver listens on
    pub udp_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Load from the given path if it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

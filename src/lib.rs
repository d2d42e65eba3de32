//! # audiolink
//!
//! Low-latency streaming of live PCM audio over an unordered, lossy
//! datagram channel.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────── SENDER ────────────────────────────────┐
//! │                                                                       │
//! │  ┌─────────┐   ┌─────────┐   ┌───────────┐   ┌─────────┐   ┌───────┐  │
//! │  │ Capture │──▶│ Chunker │──▶│ Resampler │──▶│  Opus   │──▶│ Framer│  │
//! │  │ (bytes) │   │ (timed, │   │ (rate +   │   │ Encoder │   │ be32‖ │  │
//! │  └─────────┘   │ indexed)│   │  realign) │   └─────────┘   │payload│  │
//! │                └─────────┘   └───────────┘                 └───┬───┘  │
//! └────────────────────────────────────────────────────────────────┼──────┘
//!                                                                  │ UDP
//! ┌─────────────────────────────── RECEIVER ────────────────────────┼──────┐
//! │                                                                 │      │
//! │  ┌──────────┐   ┌─────────┐   ┌─────────┐   ┌──────────┐   ┌────▼───┐ │
//! │  │ Playback │◀──│  Opus   │◀──│ Orderer │◀──│ Deframer │◀──│ Socket │ │
//! │  │  (sink)  │   │ Decoder │   │ (reorder│   │ (parse + │   │  recv  │ │
//! │  └──────────┘   │ (+ PLC) │   │ conceal)│   │   copy)  │   └────────┘ │
//! │                 └─────────┘   └─────────┘   └──────────┘              │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every chunk carries a 32-bit index derived from wall-clock time at the
//! chunker. The index survives resampling, encoding, and the wire format
//! unchanged, so the receiver can restore order and conceal single lost
//! frames without any feedback channel. Under overload the pipeline drops
//! rather than delays.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod wire;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Sample rate the codec operates at
    pub const CODEC_RATE: u32 = 48_000;

    /// Chunk emission cadence
    pub const CHUNKS_PER_SECOND: u32 = 50;

    /// Duration of one chunk in milliseconds
    pub const CHUNK_DURATION_MS: u32 = 1000 / CHUNKS_PER_SECOND;

    /// Codec frame size in samples per channel
    pub const FRAME_SAMPLES: usize = (CODEC_RATE / CHUNKS_PER_SECOND) as usize;

    /// End-to-end latency ceiling; bounds the resampler's alignment ring
    /// and the orderer's practical window
    pub const MAX_LATENCY_MS: u32 = 500;

    /// Maximum out-of-order frames held before forcing forward progress
    pub const MAX_UNORDERED: usize = 10;

    /// Consecutive empty source polls before the chunker parks its timer
    pub const MAX_IDLE_POLLS: u32 = 5;

    /// Maximum UDP payload size (MTU minus IP/UDP headers)
    pub const MAX_PACKET_SIZE: usize = 1472;

    /// Default capture sample rate
    pub const DEFAULT_SOURCE_RATE: u32 = 48_000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Default Opus bitrate in bits per second
    pub const DEFAULT_BITRATE: u32 = 128_000;

    /// Default UDP port for audio streaming
    pub const DEFAULT_UDP_PORT: u16 = 5000;
}

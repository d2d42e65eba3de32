//! Pipeline stages and drivers
//!
//! The stage cores (chunker, resampler, orderer) are synchronous and own
//! their state exclusively; `SendPipeline` and `RecvPipeline` drive them on
//! one task each. Items flow through every stage in FIFO order; only the
//! orderer reorders, and only to restore the chunker's original order.

pub mod chunker;
pub mod orderer;
pub mod resampler;

pub use chunker::{Chunker, DrainOutcome};
pub use orderer::Orderer;
pub use resampler::Resampler;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::audio::source::ByteSource;
use crate::codec::{FrameDecoder, FrameEncoder};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::net::{WireReceiver, WireSender};
use crate::wire;

/// Fixed-size PCM chunk tagged with its time-grid index
#[derive(Debug, Clone)]
pub struct PcmChunk {
    pub index: u32,
    pub pcm: Vec<u8>,
}

/// Compressed frame tagged with its chunk index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub index: u32,
    pub payload: Bytes,
}

/// Consumer of decoded PCM at the codec rate
pub trait PcmSink {
    fn write(&mut self, samples: &[f32]);
}

const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Capture-side pipeline: chunk, resample, encode, frame, transmit.
pub struct SendPipeline<S> {
    chunker: Chunker,
    resampler: Resampler,
    encoder: FrameEncoder,
    source: S,
    readable: Arc<Notify>,
    chunk_duration: Duration,
}

impl<S: ByteSource> SendPipeline<S> {
    /// Build the send-side stages. The stream's time base starts now.
    pub fn new(config: &PipelineConfig, source: S, readable: Arc<Notify>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunker: Chunker::new(
                Instant::now(),
                config.chunk_duration(),
                config.chunk_bytes(),
            ),
            resampler: Resampler::new(config)?,
            encoder: FrameEncoder::new(
                &config.opus,
                config.codec_rate,
                config.channels,
                config.frame_samples(),
            )?,
            source,
            readable,
            chunk_duration: config.chunk_duration(),
        })
    }

    /// Run until the source closes or the transport fails.
    ///
    /// A periodic timer paces chunk emission; a readable signal from the
    /// source wakes the drain loop early. When the source starves, the
    /// timer is parked and only a readable signal resumes the stream.
    pub async fn run(mut self, mut transport: WireSender) -> Result<()> {
        let mut ticker = tokio::time::interval(self.chunk_duration);
        let mut stats_ticker = tokio::time::interval(STATS_INTERVAL);
        let mut parked = false;
        let mut records: Vec<Bytes> = Vec::new();

        loop {
            if parked {
                self.readable.notified().await;
                parked = false;
                ticker.reset();
            } else {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = self.readable.notified() => {}
                    _ = stats_ticker.tick() => {
                        self.log_stats(&transport);
                        continue;
                    }
                }
            }

            let outcome = self.process(Instant::now(), &mut records);
            for record in records.drain(..) {
                transport.send(&record).await?;
            }

            match outcome {
                DrainOutcome::Waiting => {}
                DrainOutcome::Parked => {
                    debug!("Source starved; chunker parked until readable");
                    parked = true;
                }
                DrainOutcome::Ended => {
                    info!("Source closed; send pipeline finished");
                    return Ok(());
                }
            }
        }
    }

    /// One synchronous pass: every due chunk flows through resample and
    /// encode, collecting wire records for transmission.
    fn process(&mut self, now: Instant, records: &mut Vec<Bytes>) -> DrainOutcome {
        let Self {
            chunker,
            resampler,
            encoder,
            source,
            ..
        } = self;
        chunker.drain(source, now, &mut |chunk| {
            resampler.push(&chunk, &mut |index, samples| {
                match encoder.encode(index, samples) {
                    Ok(frame) => records.push(wire::encode(&frame)),
                    Err(e) => warn!("Encoding failed: {}", e),
                }
            });
        })
    }

    fn log_stats(&self, transport: &WireSender) {
        let encoder = self.encoder.stats();
        let resampler = self.resampler.stats();
        let transport = transport.stats();
        info!(
            "Send stats: {} chunks, {} frames encoded ({} KB), {} packets sent, {} overrun frames",
            self.chunker.chunks_emitted(),
            encoder.frames_encoded,
            encoder.bytes_produced / 1024,
            transport.packets,
            resampler.overrun_frames,
        );
    }
}

/// Playback-side pipeline: receive, deframe, reorder, decode.
pub struct RecvPipeline {
    orderer: Orderer,
    decoder: FrameDecoder,
    invalid_records: u64,
}

impl RecvPipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            orderer: Orderer::new(config.max_unordered),
            decoder: FrameDecoder::new(
                config.codec_rate,
                config.channels,
                config.frame_samples(),
            )?,
            invalid_records: 0,
        })
    }

    /// Run until the transport fails. The sink receives decoded PCM in
    /// strictly increasing index order.
    pub async fn run<K: PcmSink>(
        mut self,
        mut transport: WireReceiver,
        mut sink: K,
    ) -> Result<()> {
        let mut stats_at = Instant::now();

        loop {
            let record = transport.recv().await?;
            match wire::decode(record) {
                Ok(frame) => {
                    let Self {
                        orderer, decoder, ..
                    } = &mut self;
                    orderer.push(frame, &mut |ordered| match decoder.decode(&ordered) {
                        Ok(pcm) => sink.write(pcm),
                        Err(e) => warn!("Decode error: {}", e),
                    });
                }
                Err(e) => {
                    self.invalid_records += 1;
                    debug!("Discarding wire record: {}", e);
                }
            }

            if stats_at.elapsed() >= STATS_INTERVAL {
                stats_at = Instant::now();
                self.log_stats(&transport);
            }
        }
    }

    fn log_stats(&self, transport: &WireReceiver) {
        let orderer = self.orderer.stats();
        let decoder = self.decoder.stats();
        let transport = transport.stats();
        info!(
            "Recv stats: {} packets, {} frames decoded, {} concealed, {} late, {} skipped, {} invalid records, buffer {}",
            transport.packets,
            decoder.frames_decoded,
            decoder.frames_concealed,
            orderer.late,
            orderer.skipped,
            self.invalid_records,
            orderer.buffered,
        );
    }
}

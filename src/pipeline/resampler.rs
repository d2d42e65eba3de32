//! Streaming sample-rate conversion with frame realignment
//!
//! Converts indexed s16 PCM chunks at the source rate into indexed f32
//! frames sized for the codec, using a rubato `FastFixedIn` session. Output
//! accumulates in a circular alignment ring; whenever a whole codec frame is
//! available it is handed to the consumer as a borrowed slice of the ring
//! and tagged with the oldest input index that has not yet produced a frame.
//!
//! The ring holds `max_latency_ms` worth of output and its capacity is a
//! whole number of frames, so an emitted slice is contiguous and stays valid
//! for the full latency window even as newer output lands behind it.

use std::collections::VecDeque;

use rubato::{FastFixedIn, PolynomialDegree, Resampler as _};
use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::ResampleError;
use crate::pipeline::PcmChunk;

/// Resampler counters
#[derive(Debug, Clone, Copy, Default)]
pub struct ResamplerStats {
    pub frames_emitted: u64,
    pub overrun_frames: u64,
    pub pending_indices: usize,
    pub buffered_samples: usize,
}

/// Rate converter and frame realigner for one pipeline.
pub struct Resampler {
    /// `None` when source rate == codec rate (passthrough)
    inner: Option<FastFixedIn<f32>>,
    channels: usize,
    /// Input samples per channel fed to rubato per process call
    chunk_frames: usize,
    /// Interleaved samples in one output frame
    frame_len: usize,
    /// Per-channel accumulation of deinterleaved input
    input_buf: Vec<Vec<f32>>,
    /// Rubato's per-channel output scratch
    output_buf: Vec<Vec<f32>>,
    /// Circular alignment ring of interleaved output samples
    ring: Vec<f32>,
    write_offset: usize,
    /// Produced samples in the ring not yet claimed by a frame
    buffered: usize,
    /// Input indices whose output frames have not yet been emitted
    pending_indices: VecDeque<u32>,
    /// Scratch for the rare frame that straddles the ring wrap
    wrap_scratch: Vec<f32>,
    frames_emitted: u64,
    overrun_frames: u64,
}

impl Resampler {
    pub fn new(config: &PipelineConfig) -> Result<Self, ResampleError> {
        if !(1..=2).contains(&config.channels) {
            return Err(ResampleError::UnsupportedChannels(config.channels));
        }
        let channels = config.channels as usize;
        let chunk_frames = config.chunk_frames();
        let frame_len = config.samples_per_frame();
        let capacity = config.window_frames() * frame_len;
        assert!(
            capacity > 0 && capacity % frame_len == 0,
            "alignment ring must hold a whole number of frames"
        );

        let (inner, output_buf) = if config.source_rate == config.codec_rate {
            (None, Vec::new())
        } else {
            let ratio = config.codec_rate as f64 / config.source_rate as f64;
            let resampler = FastFixedIn::<f32>::new(
                ratio,
                1.0,
                PolynomialDegree::Cubic,
                chunk_frames,
                channels,
            )
            .map_err(|e| ResampleError::Init(e.to_string()))?;
            let max_out = resampler.output_frames_max();
            (Some(resampler), vec![vec![0f32; max_out]; channels])
        };

        Ok(Self {
            inner,
            channels,
            chunk_frames,
            frame_len,
            input_buf: vec![Vec::new(); channels],
            output_buf,
            ring: vec![0f32; capacity],
            write_offset: 0,
            buffered: 0,
            pending_indices: VecDeque::new(),
            wrap_scratch: vec![0f32; frame_len],
            frames_emitted: 0,
            overrun_frames: 0,
        })
    }

    /// Feed one input chunk; hand every completed output frame to `emit`.
    ///
    /// The slice passed to `emit` borrows the alignment ring and must be
    /// consumed (or copied) before the call returns.
    pub fn push(&mut self, chunk: &PcmChunk, emit: &mut dyn FnMut(u32, &[f32])) {
        self.pending_indices.push_back(chunk.index);

        if self.inner.is_none() {
            self.write_passthrough(&chunk.pcm);
        } else {
            self.accumulate(&chunk.pcm);
            self.convert_buffered();
        }

        // Claim whole frames for pending indices, oldest first
        let capacity = self.ring.len();
        while self.buffered >= self.frame_len {
            let Some(index) = self.pending_indices.pop_front() else {
                break;
            };
            let read = (self.write_offset + capacity - self.buffered) % capacity;
            if read + self.frame_len <= capacity {
                emit(index, &self.ring[read..read + self.frame_len]);
            } else {
                let head = capacity - read;
                self.wrap_scratch[..head].copy_from_slice(&self.ring[read..]);
                self.wrap_scratch[head..].copy_from_slice(&self.ring[..self.frame_len - head]);
                emit(index, &self.wrap_scratch);
            }
            self.buffered -= self.frame_len;
            self.frames_emitted += 1;
        }
    }

    pub fn stats(&self) -> ResamplerStats {
        ResamplerStats {
            frames_emitted: self.frames_emitted,
            overrun_frames: self.overrun_frames,
            pending_indices: self.pending_indices.len(),
            buffered_samples: self.buffered,
        }
    }

    /// Deinterleave s16-LE bytes into the per-channel accumulation buffers
    fn accumulate(&mut self, pcm: &[u8]) {
        for (s, bytes) in pcm.chunks_exact(2).enumerate() {
            let sample = i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32768.0;
            self.input_buf[s % self.channels].push(sample);
        }
    }

    /// Run rubato over every full accumulated block
    fn convert_buffered(&mut self) {
        while self.input_buf[0].len() >= self.chunk_frames {
            let result = {
                let Some(resampler) = self.inner.as_mut() else {
                    return;
                };
                let input: Vec<&[f32]> = self
                    .input_buf
                    .iter()
                    .map(|channel| &channel[..self.chunk_frames])
                    .collect();
                resampler.process_into_buffer(&input, &mut self.output_buf, None)
            };
            match result {
                Ok((consumed, produced)) => {
                    for channel in &mut self.input_buf {
                        channel.drain(..consumed);
                    }
                    self.write_converted(produced);
                }
                Err(e) => {
                    warn!("resampler process error: {e}");
                    let chunk_frames = self.chunk_frames;
                    for channel in &mut self.input_buf {
                        channel.drain(..chunk_frames);
                    }
                }
            }
        }
    }

    /// Interleave `produced` frames from the rubato scratch into the ring
    fn write_converted(&mut self, produced: usize) {
        let capacity = self.ring.len();
        self.make_room(produced * self.channels);
        for s in 0..produced {
            for channel in 0..self.channels {
                self.ring[self.write_offset] = self.output_buf[channel][s];
                self.write_offset = (self.write_offset + 1) % capacity;
            }
        }
        self.buffered += produced * self.channels;
    }

    /// Same-rate path: convert s16 straight into the ring
    fn write_passthrough(&mut self, pcm: &[u8]) {
        let capacity = self.ring.len();
        let incoming = pcm.len() / 2;
        self.make_room(incoming);
        for bytes in pcm.chunks_exact(2) {
            self.ring[self.write_offset] =
                i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32768.0;
            self.write_offset = (self.write_offset + 1) % capacity;
        }
        self.buffered += incoming;
    }

    /// Discard the oldest unclaimed output so `incoming` samples fit.
    ///
    /// Whole frames are dropped first to keep reads frame-aligned; when the
    /// window is too small to hold a leftover partial frame, the retained
    /// length is rounded down to whole frames so the read offset stays
    /// aligned.
    fn make_room(&mut self, incoming: usize) {
        let capacity = self.ring.len();
        debug_assert!(
            incoming <= capacity,
            "conversion output exceeds the alignment window"
        );
        while self.buffered + incoming > capacity && self.buffered >= self.frame_len {
            self.buffered -= self.frame_len;
            self.overrun_frames += 1;
        }
        if self.buffered + incoming > capacity {
            self.buffered = (capacity.saturating_sub(incoming) / self.frame_len) * self.frame_len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(source_rate: u32, codec_rate: u32) -> PipelineConfig {
        PipelineConfig {
            source_rate,
            codec_rate,
            channels: 2,
            ..Default::default()
        }
    }

    fn silence_chunk(index: u32, bytes: usize) -> PcmChunk {
        PcmChunk {
            index,
            pcm: vec![0u8; bytes],
        }
    }

    #[test]
    fn passthrough_preserves_every_index_in_order() {
        let config = config(48_000, 48_000);
        let mut resampler = Resampler::new(&config).unwrap();
        let mut emitted = Vec::new();

        for index in 0..100u32 {
            resampler.push(&silence_chunk(index, config.chunk_bytes()), &mut |i, frame| {
                emitted.push((i, frame.len()));
            });
        }

        assert_eq!(emitted.len(), 100);
        for (k, (index, len)) in emitted.iter().enumerate() {
            assert_eq!(*index, k as u32);
            assert_eq!(*len, config.samples_per_frame());
        }
    }

    #[test]
    fn passthrough_converts_sample_values() {
        let config = config(48_000, 48_000);
        let mut resampler = Resampler::new(&config).unwrap();
        let value: i16 = 16384;
        let pcm: Vec<u8> = std::iter::repeat(value.to_le_bytes())
            .take(config.chunk_bytes() / 2)
            .flatten()
            .collect();

        let mut frames = 0;
        resampler.push(&PcmChunk { index: 0, pcm }, &mut |_, frame| {
            frames += 1;
            assert!(frame.iter().all(|&s| (s - 0.5).abs() < 1e-4));
        });
        assert_eq!(frames, 1);
    }

    #[test]
    fn conversion_preserves_index_order_44100_to_48000() {
        let config = config(44_100, 48_000);
        let mut resampler = Resampler::new(&config).unwrap();
        let mut emitted = Vec::new();

        for index in 0..50u32 {
            resampler.push(&silence_chunk(index, config.chunk_bytes()), &mut |i, frame| {
                emitted.push(i);
                assert_eq!(frame.len(), config.samples_per_frame());
            });
        }

        // The k-th emitted index equals the k-th consumed index
        assert!(!emitted.is_empty());
        assert!(emitted.len() <= 50);
        for (k, index) in emitted.iter().enumerate() {
            assert_eq!(*index, k as u32);
        }
        // Whatever has not been emitted is still queued
        assert_eq!(
            resampler.stats().pending_indices,
            50 - emitted.len()
        );
    }

    #[test]
    fn short_input_leaves_index_pending_until_enough_output() {
        let config = config(48_000, 48_000);
        let mut resampler = Resampler::new(&config).unwrap();
        let mut emitted = Vec::new();

        // Half a frame of input: no emission, index 0 stays queued
        resampler.push(&silence_chunk(0, config.chunk_bytes() / 2), &mut |i, _| {
            emitted.push(i)
        });
        assert!(emitted.is_empty());
        assert_eq!(resampler.stats().pending_indices, 1);

        // A full chunk completes the first frame, which inherits index 0
        resampler.push(&silence_chunk(1, config.chunk_bytes()), &mut |i, _| {
            emitted.push(i)
        });
        assert_eq!(emitted, vec![0]);
        assert_eq!(resampler.stats().pending_indices, 1);
    }

    #[test]
    fn overflow_keeps_reads_frame_aligned() {
        let config = PipelineConfig {
            max_latency_ms: 40,
            ..config(48_000, 48_000)
        };
        let mut resampler = Resampler::new(&config).unwrap();
        let frame_len = config.samples_per_frame();
        let mut emitted = Vec::new();

        // A chunk and a half, then two chunks: the half-frame leftover
        // cannot survive the second write and is discarded whole
        resampler.push(
            &silence_chunk(0, config.chunk_bytes() * 3 / 2),
            &mut |i, frame| {
                emitted.push(i);
                assert_eq!(frame.len(), frame_len);
            },
        );
        resampler.push(
            &silence_chunk(1, config.chunk_bytes() * 2),
            &mut |i, frame| {
                emitted.push(i);
                assert_eq!(frame.len(), frame_len);
            },
        );

        assert_eq!(emitted, vec![0, 1]);
        assert_eq!(resampler.stats().buffered_samples % frame_len, 0);
    }

    #[test]
    fn ring_wrap_keeps_frames_intact() {
        let config = config(48_000, 48_000);
        let window = config.window_frames() as u32;
        let mut resampler = Resampler::new(&config).unwrap();

        // Stream well past the ring capacity; every frame must carry its
        // own chunk's constant sample value
        for index in 0..window * 3 {
            let value = (index as i16) * 100;
            let pcm: Vec<u8> = std::iter::repeat(value.to_le_bytes())
                .take(config.chunk_bytes() / 2)
                .flatten()
                .collect();
            let expected = value as f32 / 32768.0;
            let mut frames = 0;
            resampler.push(&PcmChunk { index, pcm }, &mut |i, frame| {
                frames += 1;
                assert_eq!(i, index);
                assert!(frame.iter().all(|&s| (s - expected).abs() < 1e-6));
            });
            assert_eq!(frames, 1);
        }
    }
}

//! Opus decoder glue
//!
//! Consumes ordered indexed payloads and emits PCM for playback. An empty
//! payload signals a concealed frame: the decoder synthesizes one frame of
//! audio from its internal prediction state.

use opus::{Channels, Decoder};

use crate::error::CodecError;
use crate::pipeline::EncodedFrame;

/// Decoder statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_concealed: u64,
    pub samples_produced: u64,
}

/// Opus decoder with packet-loss concealment and a reused output buffer
pub struct FrameDecoder {
    decoder: Decoder,
    channels: u16,
    /// Samples per channel synthesized for a concealed frame
    frame_samples: usize,
    /// Decoding buffer (reused to avoid allocations)
    decode_buffer: Vec<f32>,
    frames_decoded: u64,
    frames_concealed: u64,
    samples_produced: u64,
}

impl FrameDecoder {
    pub fn new(codec_rate: u32, channels: u16, frame_samples: usize) -> Result<Self, CodecError> {
        let opus_channels = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => {
                return Err(CodecError::DecoderInit(format!(
                    "Unsupported channel count: {}",
                    channels
                )))
            }
        };

        let decoder = Decoder::new(codec_rate, opus_channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        // Sized for the maximum Opus frame: 120 ms at the codec rate
        let decode_buffer = vec![0.0f32; (codec_rate as usize * channels as usize * 120) / 1000];

        Ok(Self {
            decoder,
            channels,
            frame_samples,
            decode_buffer,
            frames_decoded: 0,
            frames_concealed: 0,
            samples_produced: 0,
        })
    }

    /// Decode one frame into interleaved f32 samples.
    ///
    /// An empty payload runs packet-loss concealment instead of a normal
    /// decode. The returned slice borrows the internal buffer and is valid
    /// until the next call.
    pub fn decode(&mut self, frame: &EncodedFrame) -> Result<&[f32], CodecError> {
        let samples = if frame.payload.is_empty() {
            // Concealment synthesizes exactly the frame the stream is
            // missing; the output length tells the codec how much
            self.frames_concealed += 1;
            let conceal_len = self.frame_samples * self.channels as usize;
            self.decoder
                .decode_float(&[], &mut self.decode_buffer[..conceal_len], false)
        } else {
            self.frames_decoded += 1;
            self.decoder
                .decode_float(&frame.payload, &mut self.decode_buffer, false)
        }
        .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total_samples = samples * self.channels as usize;
        self.samples_produced += total_samples as u64;

        Ok(&self.decode_buffer[..total_samples])
    }

    /// Reset decoder prediction state
    pub fn reset(&mut self) -> Result<(), CodecError> {
        self.decoder
            .reset_state()
            .map_err(|e| CodecError::DecoderInit(e.to_string()))
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_concealed: self.frames_concealed,
            samples_produced: self.samples_produced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameEncoder;
    use crate::config::OpusConfig;
    use crate::constants::FRAME_SAMPLES;
    use bytes::Bytes;

    #[test]
    fn round_trips_a_sine_frame() {
        let mut encoder =
            FrameEncoder::new(&OpusConfig::music(), 48_000, 2, FRAME_SAMPLES).unwrap();
        let mut decoder = FrameDecoder::new(48_000, 2, FRAME_SAMPLES).unwrap();

        let mut samples = Vec::with_capacity(encoder.samples_per_frame());
        for k in 0..FRAME_SAMPLES {
            let t = k as f32 / 48_000.0;
            let value = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5;
            samples.push(value); // Left
            samples.push(value); // Right
        }

        let encoded = encoder.encode(42, &samples).unwrap();
        let decoded = decoder.decode(&encoded).unwrap();
        assert_eq!(decoded.len(), samples.len());
    }

    #[test]
    fn empty_payload_conceals_exactly_one_frame() {
        let mut decoder = FrameDecoder::new(48_000, 2, FRAME_SAMPLES).unwrap();
        let concealed = decoder
            .decode(&EncodedFrame {
                index: 3,
                payload: Bytes::new(),
            })
            .unwrap();
        assert_eq!(concealed.len(), FRAME_SAMPLES * 2);
        assert_eq!(decoder.stats().frames_concealed, 1);
        assert_eq!(decoder.stats().frames_decoded, 0);
    }
}

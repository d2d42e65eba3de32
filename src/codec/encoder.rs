//! Opus encoder glue
//!
//! Consumes indexed f32 frames and emits indexed compressed payloads.

use bytes::Bytes;
use opus::{Application, Channels, Encoder};

use crate::config::{CodecMode, OpusConfig, OpusSignal};
use crate::error::CodecError;
use crate::pipeline::EncodedFrame;

/// Encoder statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
}

/// Opus encoder with a reused output buffer
pub struct FrameEncoder {
    encoder: Encoder,
    channels: u16,
    frame_samples: usize,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    frames_encoded: u64,
    bytes_produced: u64,
}

impl FrameEncoder {
    pub fn new(
        config: &OpusConfig,
        codec_rate: u32,
        channels: u16,
        frame_samples: usize,
    ) -> Result<Self, CodecError> {
        let opus_channels = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => {
                return Err(CodecError::EncoderInit(format!(
                    "Unsupported channel count: {}",
                    channels
                )))
            }
        };

        let application = match config.mode {
            CodecMode::Voice => Application::Voip,
            CodecMode::Music => Application::Audio,
            CodecMode::LowLatency => Application::LowDelay,
        };

        let mut encoder = Encoder::new(codec_rate, opus_channels, application)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        encoder
            .set_bitrate(opus::Bitrate::Bits(config.bitrate as i32))
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set bitrate: {}", e)))?;
        encoder
            .set_vbr(config.vbr)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set VBR: {}", e)))?;
        encoder
            .set_complexity(config.complexity as i32)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set complexity: {}", e)))?;
        let signal = match config.signal {
            OpusSignal::Auto => opus::Signal::Auto,
            OpusSignal::Voice => opus::Signal::Voice,
            OpusSignal::Music => opus::Signal::Music,
        };
        encoder
            .set_signal(signal)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set signal type: {}", e)))?;

        // Max Opus frame is about 1275 bytes
        let encode_buffer = vec![0u8; 4000];

        Ok(Self {
            encoder,
            channels,
            frame_samples,
            encode_buffer,
            frames_encoded: 0,
            bytes_produced: 0,
        })
    }

    /// Encode one frame of interleaved f32 samples.
    ///
    /// Input length must be exactly `frame_samples * channels`.
    pub fn encode(&mut self, index: u32, samples: &[f32]) -> Result<EncodedFrame, CodecError> {
        let expected_len = self.frame_samples * self.channels as usize;
        if samples.len() != expected_len {
            return Err(CodecError::InvalidFrameSize(samples.len()));
        }

        let size = self
            .encoder
            .encode_float(samples, &mut self.encode_buffer)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.frames_encoded += 1;
        self.bytes_produced += size as u64;

        Ok(EncodedFrame {
            index,
            payload: Bytes::copy_from_slice(&self.encode_buffer[..size]),
        })
    }

    /// Expected total samples per frame (including all channels)
    pub fn samples_per_frame(&self) -> usize {
        self.frame_samples * self.channels as usize
    }

    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_SAMPLES;

    #[test]
    fn encodes_silence_frame() {
        let mut encoder =
            FrameEncoder::new(&OpusConfig::music(), 48_000, 2, FRAME_SAMPLES).unwrap();
        let samples = vec![0.0f32; encoder.samples_per_frame()];

        let frame = encoder.encode(7, &samples).unwrap();
        assert_eq!(frame.index, 7);
        assert!(!frame.payload.is_empty());
        assert!(frame.payload.len() < samples.len() * 4);
    }

    #[test]
    fn rejects_wrong_frame_length() {
        let mut encoder =
            FrameEncoder::new(&OpusConfig::voice(), 48_000, 1, FRAME_SAMPLES).unwrap();
        let samples = vec![0.0f32; 100];
        assert!(matches!(
            encoder.encode(0, &samples),
            Err(CodecError::InvalidFrameSize(100))
        ));
    }

    #[test]
    fn counts_encoded_frames() {
        let mut encoder =
            FrameEncoder::new(&OpusConfig::music(), 48_000, 2, FRAME_SAMPLES).unwrap();
        let samples = vec![0.0f32; encoder.samples_per_frame()];
        for index in 0..3 {
            encoder.encode(index, &samples).unwrap();
        }
        assert_eq!(encoder.stats().frames_encoded, 3);
    }
}

//! Audio playback sink
//!
//! A dedicated thread owns the cpal output stream. The stream callback
//! pulls interleaved f32 samples from a shared bounded queue; an underrun
//! plays silence, an overflow drops the oldest samples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use tracing::error;

use crate::audio::device::default_output_device;
use crate::config::PipelineConfig;
use crate::error::AudioError;
use crate::pipeline::PcmSink;

/// Playback to the default output device
pub struct PlaybackSink {
    queue: Arc<Mutex<VecDeque<f32>>>,
    running: Arc<AtomicBool>,
    capacity: usize,
    dropped_samples: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PlaybackSink {
    /// Open the default output device at the codec rate and start playing.
    pub fn start(config: &PipelineConfig) -> Result<Self, AudioError> {
        let device = default_output_device()?;
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.codec_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Hold at most one latency window of decoded samples
        let capacity = config.samples_per_frame() * config.window_frames();
        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));
        let running = Arc::new(AtomicBool::new(true));

        let queue_for_cb = queue.clone();
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let stream = device.build_output_stream(
                    &stream_config,
                    move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut queue = queue_for_cb.lock().unwrap();
                        for slot in output.iter_mut() {
                            // Underrun plays silence
                            *slot = queue.pop_front().unwrap_or(0.0);
                        }
                    },
                    move |err| {
                        error!("Playback stream error: {}", err);
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            error!("Failed to start playback stream: {}", e);
                            return;
                        }
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        error!("Failed to build playback stream: {}", e);
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self {
            queue,
            running,
            capacity,
            dropped_samples: Arc::new(AtomicU64::new(0)),
            thread_handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Samples discarded because playback fell behind
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }
}

impl PcmSink for PlaybackSink {
    fn write(&mut self, samples: &[f32]) {
        let mut queue = self.queue.lock().unwrap();
        queue.extend(samples);
        let excess = queue.len().saturating_sub(self.capacity);
        if excess > 0 {
            queue.drain(..excess);
            self.dropped_samples
                .fetch_add(excess as u64, Ordering::Relaxed);
        }
    }
}

impl Drop for PlaybackSink {
    fn drop(&mut self) {
        self.stop();
    }
}

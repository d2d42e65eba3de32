//! Audio capture feeding the chunker's byte source contract
//!
//! A dedicated thread owns the cpal input stream. The callback converts
//! device samples to interleaved s16-LE bytes in a bounded ring and fires
//! a readable notification; the pipeline task drains the ring through
//! non-blocking reads. On overflow the oldest bytes are dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};
use tokio::sync::Notify;
use tracing::error;

use crate::audio::device::default_input_device;
use crate::audio::source::{ByteSource, SourceRead};
use crate::config::PipelineConfig;
use crate::error::AudioError;

struct CaptureShared {
    ring: Mutex<VecDeque<u8>>,
    closed: AtomicBool,
    overflow_bytes: AtomicU64,
}

/// Live capture from the default input device
pub struct CaptureSource {
    shared: Arc<CaptureShared>,
    readable: Arc<Notify>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    /// Channel for stream errors
    error_rx: Receiver<AudioError>,
}

impl CaptureSource {
    /// Open the default input device and start capturing interleaved
    /// s16-LE bytes at the configured source rate.
    pub fn start(config: &PipelineConfig) -> Result<Self, AudioError> {
        let device = default_input_device()?;
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.source_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Hold at most one latency window of raw bytes
        let capacity = config.chunk_bytes() * config.window_frames();
        let shared = Arc::new(CaptureShared {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            closed: AtomicBool::new(false),
            overflow_bytes: AtomicU64::new(0),
        });
        let readable = Arc::new(Notify::new());
        let running = Arc::new(AtomicBool::new(true));
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let shared_for_cb = shared.clone();
        let readable_for_cb = readable.clone();
        let running_for_cb = running.clone();
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !running_for_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        {
                            let mut ring = shared_for_cb.ring.lock().unwrap();
                            for &sample in data {
                                let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                                ring.extend(value.to_le_bytes());
                            }
                            let excess = ring.len().saturating_sub(capacity);
                            if excess > 0 {
                                ring.drain(..excess);
                                shared_for_cb
                                    .overflow_bytes
                                    .fetch_add(excess as u64, Ordering::Relaxed);
                            }
                        }
                        readable_for_cb.notify_one();
                    },
                    move |err| {
                        let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            error!("Failed to start capture stream: {}", e);
                            return;
                        }
                        // Keep thread alive while running
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                        // Stream is dropped here, stopping capture
                    }
                    Err(e) => {
                        error!("Failed to build capture stream: {}", e);
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self {
            shared,
            readable,
            running,
            thread_handle: Some(handle),
            error_rx,
        })
    }

    /// Notified whenever new capture data lands in the ring
    pub fn readable(&self) -> Arc<Notify> {
        self.readable.clone()
    }

    /// Stop capturing; buffered bytes remain readable as the stream tail
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.shared.closed.store(true, Ordering::SeqCst);
        self.readable.notify_one();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Bytes discarded because the pipeline fell behind
    pub fn overflow_bytes(&self) -> u64 {
        self.shared.overflow_bytes.load(Ordering::Relaxed)
    }

    /// Check for stream errors
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

impl ByteSource for CaptureSource {
    fn poll_read(&mut self, buf: &mut [u8]) -> SourceRead {
        let mut ring = self.shared.ring.lock().unwrap();
        if ring.len() >= buf.len() {
            let len = buf.len();
            for (slot, byte) in buf.iter_mut().zip(ring.drain(..len)) {
                *slot = byte;
            }
            return SourceRead::Filled(len);
        }
        if !self.shared.closed.load(Ordering::SeqCst) {
            return SourceRead::Pending;
        }
        if ring.is_empty() {
            return SourceRead::Closed;
        }
        let len = ring.len();
        for (slot, byte) in buf.iter_mut().zip(ring.drain(..)) {
            *slot = byte;
        }
        SourceRead::Filled(len)
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

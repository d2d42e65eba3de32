//! Time-anchored chunk emission
//!
//! Converts a byte-rate-bursty source into a clock-rate-stable sequence of
//! fixed-size PCM chunks. Chunk indices reflect real time: while data flows
//! they advance by one per chunk duration, and after a prolonged stall the
//! next index is re-derived from the wall clock so playback position never
//! drifts from real time.

use std::time::{Duration, Instant};

use crate::audio::source::{ByteSource, SourceRead};
use crate::constants::MAX_IDLE_POLLS;
use crate::pipeline::PcmChunk;

/// What the driver should do after a drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Next chunk is in the future or the source is briefly dry; keep the
    /// timer running
    Waiting,
    /// Source starved for `MAX_IDLE_POLLS` passes; stop the timer and wait
    /// for a readable signal
    Parked,
    /// Source closed; the stream is complete
    Ended,
}

/// Emits `(index, chunk)` pairs of exactly `chunk_bytes` bytes each.
pub struct Chunker {
    start: Instant,
    chunk_duration: Duration,
    chunk_bytes: usize,
    last_index: Option<u32>,
    idle_polls: u32,
    chunks_emitted: u64,
}

impl Chunker {
    pub fn new(start: Instant, chunk_duration: Duration, chunk_bytes: usize) -> Self {
        Self {
            start,
            chunk_duration,
            chunk_bytes,
            last_index: None,
            idle_polls: 0,
            chunks_emitted: 0,
        }
    }

    /// Run the drain loop: emit every chunk whose time has come and for
    /// which source data is available.
    ///
    /// Called on every timer tick and on every source-readable signal.
    /// `now` is passed in so pacing is testable.
    pub fn drain<S: ByteSource>(
        &mut self,
        source: &mut S,
        now: Instant,
        emit: &mut dyn FnMut(PcmChunk),
    ) -> DrainOutcome {
        loop {
            let elapsed = now.saturating_duration_since(self.start);
            let target = match self.last_index {
                Some(last) => last + 1,
                // Re-anchor to the wall clock after a fresh start or a stall
                None => (elapsed.as_millis() / self.chunk_duration.as_millis()) as u32,
            };

            if elapsed < self.chunk_duration * target {
                return DrainOutcome::Waiting;
            }

            let mut pcm = vec![0u8; self.chunk_bytes];
            match source.poll_read(&mut pcm) {
                SourceRead::Pending => {
                    self.idle_polls += 1;
                    if self.idle_polls >= MAX_IDLE_POLLS {
                        self.last_index = None;
                        return DrainOutcome::Parked;
                    }
                    return DrainOutcome::Waiting;
                }
                SourceRead::Closed => return DrainOutcome::Ended,
                SourceRead::Filled(len) => {
                    // A short fill is the end-of-stream tail; the remainder
                    // of `pcm` is already zeroed.
                    debug_assert!(len <= self.chunk_bytes);
                    self.idle_polls = 0;
                    self.last_index = Some(target);
                    self.chunks_emitted += 1;
                    emit(PcmChunk { index: target, pcm });
                }
            }
        }
    }

    /// Index of the most recently emitted chunk, if any
    pub fn last_index(&self) -> Option<u32> {
        self.last_index
    }

    /// Total chunks emitted since construction
    pub fn chunks_emitted(&self) -> u64 {
        self.chunks_emitted
    }
}

//! Audio endpoints: capture source, playback sink, device helpers

pub mod capture;
pub mod device;
pub mod playback;
pub mod source;

pub use capture::CaptureSource;
pub use playback::PlaybackSink;
pub use source::{ByteSource, MemorySource, SourceRead};

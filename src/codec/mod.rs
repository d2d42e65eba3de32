//! Opus codec glue
//!
//! Thin adapters around libopus. Frame indices are not seen by the codec;
//! each encode/decode call carries its index straight through.

pub mod decoder;
pub mod encoder;

pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;

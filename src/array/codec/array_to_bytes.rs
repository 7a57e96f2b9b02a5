//! `array->bytes` stages and the complete codec chain.

pub mod bytes;
pub mod codec_chain;

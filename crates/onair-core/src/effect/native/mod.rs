//! Native Rust effects
//!
//! Every stage of the voice chain runs in-process on the audio thread.
//! Parameter changes arrive as [`EffectSettings`](crate::effect::EffectSettings)
//! and are smoothed inside each processor.

mod biquad;
mod compressor;
mod delay;
mod enhance;
mod impulse;
mod pitch_shift;
mod reverb;
mod tone;

pub use biquad::{BiquadCoeffs, BiquadState, SmoothedBiquad};
pub use compressor::CompressorEffect;
pub use delay::DelayEffect;
pub use enhance::EnhanceEffect;
pub use impulse::{
    max_partitions, synthesize_impulse, ReverbImpulse, MAX_IMPULSE_SECONDS, PARTITION_SIZE,
};
pub use pitch_shift::PitchShiftEffect;
pub use reverb::ReverbEffect;
pub use tone::ToneEffect;

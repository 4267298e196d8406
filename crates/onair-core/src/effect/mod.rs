//! Effect system - the voice processing chain
//!
//! The chain is a fixed, statically ordered set of built-in processors:
//!
//! ```text
//! enhance → tone → compressor → pitch-shift → delay → reverb
//! ```
//!
//! - [`params`]: effect kinds, typed parameter records and the pure
//!   parameter-to-DSP mappings
//! - [`chain`]: control-side manager holding enabled state and parameters
//!   and producing topology snapshots
//! - [`native`]: the real-time processors behind each kind

pub mod chain;
pub mod native;
pub mod params;

pub use chain::{ChainNode, ChainTopology, EffectState, EffectUpdate, EffectsChain};
pub use params::{
    enhance_gate_threshold_db, param_map, CompressorParams, CompressorSettings, DelayParams,
    DelaySettings, EffectKind, EffectParams, EffectSettings, EnhanceParams, EnhanceSettings,
    ImpulseShape, ParamInfo, ParamMap, PitchShiftParams, PitchShiftSettings, ReverbParams,
    ReverbSettings, ToneParams, ToneSettings, UnknownEffect, NUM_EFFECTS,
};

use crate::types::StereoBuffer;

/// The core effect trait, implemented by every processor in the chain
///
/// Processors run on the audio thread: `process` and `apply` must be
/// bounded-time and must not allocate.
pub trait Effect: Send {
    /// Which slot this processor fills
    fn kind(&self) -> EffectKind;

    /// Process a stereo buffer in place
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Apply new settings; settings of another kind are ignored
    ///
    /// Coefficient changes are smoothed by the processor itself so an update
    /// while audio is flowing never steps.
    fn apply(&mut self, settings: &EffectSettings);

    /// Processing latency in samples
    fn latency_samples(&self) -> u32 {
        0
    }

    /// Clear internal state (delay lines, envelopes, filter memory)
    fn reset(&mut self);
}

//! Audio engine - gate, effects, soundboard, mixer graph and output stages
//!
//! This module contains the render-domain half of the console:
//! - NoiseGate: RMS gate at the head of the mic path
//! - RenderChain: the enabled effects in static order
//! - Soundboard: sample pads summed into the soundboard bus
//! - MixerGraph: gain stages, limiter and clipper producing program and monitor
//! - AudioEngine: owns all of the above and drains the command queue

mod chain;
mod command;
mod engine;
mod gain_stage;
pub mod gc;
mod hard_clipper;
mod meters;
mod mixer;
mod noise_gate;
mod output_limiter;
mod soundboard;

pub use chain::{EffectRack, RenderChain, DECLICK_SAMPLES};
pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use engine::AudioEngine;
pub use gain_stage::GainStage;
pub use hard_clipper::{ClipCurve, HardClipper};
pub use meters::{
    DiagnosticsSnapshot, EngineDiagnostics, LevelMeter, LevelReading, MeterBank, MONO_DETECT_DB,
};
pub use mixer::*;
pub use noise_gate::*;
pub use output_limiter::OutputLimiter;
pub use soundboard::{clamp_pad_gain, PadAtomics, Soundboard, MAX_PAD_GAIN, NUM_PADS};

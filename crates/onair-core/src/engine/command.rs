//! Lock-free command queue from the control thread to the audio thread
//!
//! The control thread pushes commands into an `rtrb` ring; the engine drains
//! the ring at the start of every block, so a change takes effect on the
//! next processed block and never in the middle of one. Commands issued in
//! a given order are applied in that order.
//!
//! Heap payloads (pad samples, impulse responses, the capture batcher) travel
//! as `basedrop` handles. Whatever the audio thread replaces is dropped into
//! the collector instead of being freed on the render path.

use basedrop::{Owned, Shared};

use super::mixer::{BusGains, LimiterCeiling, SourceId};
use crate::capture::CaptureBatcher;
use crate::effect::native::ReverbImpulse;
use crate::effect::{ChainTopology, EffectSettings};
use crate::loader::PadSample;

/// Commands sent from the control thread to the audio thread
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Mixer
    // ─────────────────────────────────────────────────────────────
    /// New gain table for the current mode and mic volume
    SetBusGains(BusGains),
    SetLimiter(LimiterCeiling),
    /// Noise gate threshold (-100 or below disables)
    SetGateThreshold { db: f32 },
    ConnectSource(SourceId),
    RemoveSource(SourceId),

    // ─────────────────────────────────────────────────────────────
    // Effects chain
    // ─────────────────────────────────────────────────────────────
    /// Rebuilt path; swapped in between blocks with a short declick
    SetTopology(ChainTopology),
    UpdateEffect(EffectSettings),
    /// Pre-partitioned impulse response for the reverb
    SetReverbImpulse(Owned<ReverbImpulse>),

    // ─────────────────────────────────────────────────────────────
    // Soundboard
    // ─────────────────────────────────────────────────────────────
    LoadPad {
        pad: usize,
        sample: Shared<PadSample>,
    },
    UnloadPad { pad: usize },
    PlayPad { pad: usize },
    StopPad { pad: usize },
    SetPadLoop { pad: usize, looping: bool },
    SetPadGain { pad: usize, gain: f32 },

    // ─────────────────────────────────────────────────────────────
    // Capture
    // ─────────────────────────────────────────────────────────────
    /// Install a batcher; the engine starts feeding it on the next block
    StartCapture(Owned<CaptureBatcher>),
    /// Flush the partial batch and send the end marker
    StopCapture,
}

impl EngineCommand {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetBusGains(_) => "SetBusGains",
            Self::SetLimiter(_) => "SetLimiter",
            Self::SetGateThreshold { .. } => "SetGateThreshold",
            Self::ConnectSource(_) => "ConnectSource",
            Self::RemoveSource(_) => "RemoveSource",
            Self::SetTopology(_) => "SetTopology",
            Self::UpdateEffect(_) => "UpdateEffect",
            Self::SetReverbImpulse(_) => "SetReverbImpulse",
            Self::LoadPad { .. } => "LoadPad",
            Self::UnloadPad { .. } => "UnloadPad",
            Self::PlayPad { .. } => "PlayPad",
            Self::StopPad { .. } => "StopPad",
            Self::SetPadLoop { .. } => "SetPadLoop",
            Self::SetPadGain { .. } => "SetPadGain",
            Self::StartCapture(_) => "StartCapture",
            Self::StopCapture => "StopCapture",
        }
    }
}

/// Capacity of the command queue
///
/// A preset recall sends one update per effect plus a handful of mixer
/// commands; 256 leaves room for bursts from a fast control surface.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_creation() {
        let (mut tx, mut rx) = command_channel();
        assert!(tx.push(EngineCommand::PlayPad { pad: 2 }).is_ok());
        let cmd = rx.pop().expect("command");
        assert!(matches!(cmd, EngineCommand::PlayPad { pad: 2 }));
        assert_eq!(cmd.name(), "PlayPad");
    }

    #[test]
    fn test_command_channel_empty() {
        let (_tx, mut rx) = command_channel();
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_commands_arrive_in_order() {
        let (mut tx, mut rx) = command_channel();
        assert!(tx.push(EngineCommand::ConnectSource(SourceId::Pad(1))).is_ok());
        assert!(tx.push(EngineCommand::RemoveSource(SourceId::Pad(1))).is_ok());
        assert!(matches!(rx.pop(), Ok(EngineCommand::ConnectSource(_))));
        assert!(matches!(rx.pop(), Ok(EngineCommand::RemoveSource(_))));
    }

    #[test]
    fn test_command_size_is_small() {
        // Large payloads go behind basedrop handles
        assert!(std::mem::size_of::<EngineCommand>() <= 64);
    }
}

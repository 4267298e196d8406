//! Main audio engine - ties together gate, effects, soundboard, mixer and capture
//!
//! The engine is owned by the audio callback. Everything it touches per
//! block is pre-allocated; the control thread reaches it only through the
//! command queue and reads it back through atomics.

use std::sync::Arc;

use basedrop::Owned;

use super::chain::RenderChain;
use super::command::EngineCommand;
use super::meters::{EngineDiagnostics, MeterBank};
use super::mixer::{MixerGraph, MixerState, SourceId};
use super::noise_gate::{GateState, NoiseGate};
use super::soundboard::{PadAtomics, Soundboard, NUM_PADS};
use crate::capture::{CaptureBatcher, CaptureTap};
use crate::config::GateConfig;
use crate::types::{StereoBuffer, MAX_BLOCK_SIZE};

/// The render-domain half of the console
pub struct AudioEngine {
    sample_rate: u32,
    commands: rtrb::Consumer<EngineCommand>,
    gate: NoiseGate,
    chain: RenderChain,
    soundboard: Soundboard,
    graph: MixerGraph,
    /// Mic block copied out of the host buffer
    mic_buffer: StereoBuffer,
    soundboard_bus: StereoBuffer,
    /// Channel count the mic device declares (for metering)
    mic_channels: u16,
    meters: Arc<MeterBank>,
    diagnostics: Arc<EngineDiagnostics>,
    capture: Option<Owned<CaptureBatcher>>,
    /// Stopped batcher still waiting to get its end marker out
    closing: Option<Owned<CaptureBatcher>>,
}

impl AudioEngine {
    pub fn new(
        sample_rate: u32,
        gate: &GateConfig,
        mixer: &MixerState,
        commands: rtrb::Consumer<EngineCommand>,
    ) -> Self {
        let graph = MixerGraph::new(sample_rate, mixer);
        let meters = Arc::new(MeterBank::new(graph.clip_indicator()));
        Self {
            sample_rate,
            commands,
            gate: NoiseGate::new(gate, sample_rate),
            chain: RenderChain::new(sample_rate),
            soundboard: Soundboard::new(),
            graph,
            mic_buffer: StereoBuffer::silence(MAX_BLOCK_SIZE),
            soundboard_bus: StereoBuffer::silence(MAX_BLOCK_SIZE),
            mic_channels: 2,
            meters,
            diagnostics: Arc::new(EngineDiagnostics::default()),
            capture: None,
            closing: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Declare how many channels the mic device really has
    pub fn set_mic_channels(&mut self, channels: u16) {
        self.mic_channels = channels.max(1);
    }

    pub fn meters(&self) -> Arc<MeterBank> {
        Arc::clone(&self.meters)
    }

    pub fn diagnostics(&self) -> Arc<EngineDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Per-pad atomics, indexed by pad
    pub fn pad_atomics(&self) -> Vec<Arc<PadAtomics>> {
        (0..NUM_PADS)
            .filter_map(|pad| self.soundboard.atomics(pad))
            .collect()
    }

    pub fn graph(&self) -> &MixerGraph {
        &self.graph
    }

    pub fn chain(&self) -> &RenderChain {
        &self.chain
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Apply every queued command in arrival order
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::SetBusGains(gains) => self.graph.set_bus_gains(&gains),
            EngineCommand::SetLimiter(ceiling) => self.graph.set_limiter(ceiling),
            EngineCommand::SetGateThreshold { db } => self.gate.set_threshold_db(db),
            EngineCommand::ConnectSource(source) => {
                self.graph.connect(source);
            }
            EngineCommand::RemoveSource(source) => {
                self.graph.remove(source);
            }
            EngineCommand::SetTopology(topology) => self.chain.set_topology(topology),
            EngineCommand::UpdateEffect(settings) => self.chain.apply(&settings),
            EngineCommand::SetReverbImpulse(impulse) => self.chain.set_impulse(impulse),
            EngineCommand::LoadPad { pad, sample } => self.soundboard.load(pad, sample),
            EngineCommand::UnloadPad { pad } => {
                self.soundboard.unload(pad);
                self.graph.remove(SourceId::Pad(pad));
            }
            EngineCommand::PlayPad { pad } => self.soundboard.play(pad),
            EngineCommand::StopPad { pad } => self.soundboard.stop(pad),
            EngineCommand::SetPadLoop { pad, looping } => self.soundboard.set_loop(pad, looping),
            EngineCommand::SetPadGain { pad, gain } => self.soundboard.set_gain(pad, gain),
            EngineCommand::StartCapture(batcher) => {
                // A second start without a stop closes the first session
                if let Some(mut previous) = self.capture.take() {
                    if !previous.finish() {
                        self.closing = Some(previous);
                    }
                }
                self.capture = Some(batcher);
            }
            EngineCommand::StopCapture => {
                if let Some(mut batcher) = self.capture.take() {
                    if !batcher.finish() {
                        self.closing = Some(batcher);
                    }
                }
            }
        }
    }

    /// Render one block
    ///
    /// `mic_in` is borrowed from the host and copied before use. Both
    /// outputs are overwritten and take the length of `mic_in` (at most
    /// [`MAX_BLOCK_SIZE`]).
    pub fn process(
        &mut self,
        mic_in: &StereoBuffer,
        program_out: &mut StereoBuffer,
        monitor_out: &mut StereoBuffer,
    ) {
        self.process_commands();

        let len = mic_in.len().min(MAX_BLOCK_SIZE);
        self.mic_buffer.copy_from_slice(&mic_in.as_slice()[..len]);

        // Mic path: gate → effects chain
        self.gate.process(&mut self.mic_buffer);
        self.chain.process(&mut self.mic_buffer);
        self.meters.mic.update(&self.mic_buffer, self.mic_channels);
        self.meters
            .set_gate(self.gate.gain(), self.gate.state() != GateState::Closed);

        // Pads → soundboard bus
        let pads = *self.graph.connections().pads();
        self.soundboard
            .render(&pads, len, &mut self.soundboard_bus);

        self.graph.process(
            &self.mic_buffer,
            &self.soundboard_bus,
            program_out,
            monitor_out,
        );
        self.meters.program.update(program_out, 2);
        self.meters.monitor.update(monitor_out, 2);

        if let Some(batcher) = self.capture.as_mut() {
            match batcher.tap() {
                CaptureTap::Program => batcher.push(program_out),
                CaptureTap::Monitor => batcher.push(monitor_out),
            }
        }
        if let Some(closing) = self.closing.as_mut() {
            if closing.finish() {
                self.closing = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::command_channel;
    use crate::engine::mixer::LimiterCeiling;
    use crate::types::StereoSample;

    fn engine() -> (rtrb::Producer<EngineCommand>, AudioEngine) {
        let (tx, rx) = command_channel();
        let engine = AudioEngine::new(
            48000,
            &GateConfig::default(),
            &MixerState::default(),
            rx,
        );
        (tx, engine)
    }

    fn dc(value: f32, len: usize) -> StereoBuffer {
        StereoBuffer::from_vec(vec![StereoSample::mono(value); len])
    }

    #[test]
    fn test_disconnected_mic_is_silent() {
        let (_tx, mut engine) = engine();
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
        engine.process(&dc(0.5, 128), &mut program, &mut monitor);
        assert_eq!(program.len(), 128);
        assert_eq!(program.peak(), 0.0);
        assert_eq!(monitor.peak(), 0.0);
    }

    #[test]
    fn test_connected_mic_reaches_program_not_monitor() {
        let (mut tx, mut engine) = engine();
        assert!(tx
            .push(EngineCommand::ConnectSource(SourceId::Microphone))
            .is_ok());
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
        engine.process(&dc(0.5, 128), &mut program, &mut monitor);
        assert!((program[127].left - 0.5).abs() < 1e-4);
        assert_eq!(monitor.peak(), 0.0);

        let reading = engine.meters().program.read();
        assert!(reading.mono);
        assert!(reading.peak[0] > 0.49);
    }

    #[test]
    fn test_limiter_command_caps_program() {
        let (mut tx, mut engine) = engine();
        assert!(tx
            .push(EngineCommand::ConnectSource(SourceId::Microphone))
            .is_ok());
        assert!(tx
            .push(EngineCommand::SetLimiter(LimiterCeiling::Minus12Db))
            .is_ok());
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
        engine.process(&dc(0.9, 256), &mut program, &mut monitor);
        let ceiling = LimiterCeiling::Minus12Db.db();
        assert!(program.peak() <= crate::types::db_to_linear(ceiling) + 1e-6);
    }

    #[test]
    fn test_bad_pad_index_is_ignored() {
        let (mut tx, mut engine) = engine();
        assert!(tx.push(EngineCommand::PlayPad { pad: 99 }).is_ok());
        assert!(tx.push(EngineCommand::SetPadGain { pad: 42, gain: 2.0 }).is_ok());
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
        engine.process(&dc(0.0, 64), &mut program, &mut monitor);
        assert_eq!(engine.pad_atomics().len(), NUM_PADS);
    }
}

//! Control surface for the console
//!
//! `Console` is the control-thread half: it owns the operator-facing state
//! (mixer modes, effect parameters, which sources are connected), turns
//! every call into [`EngineCommand`]s for the audio thread and reads the
//! engine back through atomics. Nothing here blocks the audio thread.
//!
//! ```ignore
//! let (mut console, engine) = Console::new(&config, sample_rate);
//! // hand `engine` to the audio backend, keep `console` on the UI side
//! console.toggle_effect(EffectKind::Compressor);
//! console.set_cue_mode(true);
//! ```

use std::path::Path;
use std::sync::Arc;

use basedrop::{Handle, Owned, Shared};
use crossbeam::channel::Receiver;

use crate::capture::{
    wav_encoder_factory, CaptureTap, EncoderFactory, FinalizeHandle, Recorder, RecordingError,
    RecordingEvent, RecordingResult, RecordingSession,
};
use crate::config::ConsoleConfig;
use crate::effect::native::ReverbImpulse;
use crate::effect::{EffectKind, EffectState, EffectsChain, ParamMap};
use crate::engine::gc::gc_handle;
use crate::engine::{
    clamp_gate_threshold, clamp_pad_gain, command_channel, AudioEngine, Connections,
    DiagnosticsSnapshot, EngineCommand, EngineDiagnostics, LimiterCeiling, MeterBank, MixerState,
    PadAtomics, SourceId, NUM_PADS,
};
use crate::loader::{load_pad_file, PadLoadError, PadLoadResult, PadSample};

/// Command sender for the control thread
struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
    diagnostics: Arc<EngineDiagnostics>,
}

impl CommandSender {
    /// Push a command to the audio thread
    ///
    /// A full queue hands the command back; the drop is counted.
    fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => {
                self.diagnostics.record_dropped_command();
                log::warn!("Engine command queue full, dropped {}", value.name());
                value
            }
        })
    }
}

/// Control-thread handle to a running console
pub struct Console {
    sample_rate: u32,
    commands: CommandSender,
    gc: Handle,
    mixer: MixerState,
    effects: EffectsChain,
    /// Mirror of the engine's connections
    connections: Connections,
    gate_threshold_db: f32,
    recorder: Recorder,
    meters: Arc<MeterBank>,
    diagnostics: Arc<EngineDiagnostics>,
    last_diagnostics: DiagnosticsSnapshot,
    pads: Vec<Arc<PadAtomics>>,
}

impl Console {
    /// Build a console and the engine it controls, recording to WAV
    pub fn new(config: &ConsoleConfig, sample_rate: u32) -> (Self, AudioEngine) {
        Self::with_encoder_factory(config, sample_rate, wav_encoder_factory())
    }

    /// Same as [`Console::new`] with a custom recording encoder
    pub fn with_encoder_factory(
        config: &ConsoleConfig,
        sample_rate: u32,
        factory: EncoderFactory,
    ) -> (Self, AudioEngine) {
        let mut mixer = MixerState {
            limiter: LimiterCeiling::nearest(config.mixer.limiter_threshold_db),
            ..MixerState::default()
        };
        mixer.set_mic_volume(config.mixer.mic_volume);

        let (producer, consumer) = command_channel();
        let engine = AudioEngine::new(sample_rate, &config.gate, &mixer, consumer);
        let diagnostics = engine.diagnostics();

        let mut console = Self {
            sample_rate,
            commands: CommandSender {
                producer,
                diagnostics: Arc::clone(&diagnostics),
            },
            gc: gc_handle(),
            mixer,
            effects: EffectsChain::new(),
            connections: Connections::default(),
            gate_threshold_db: clamp_gate_threshold(config.gate.threshold_db),
            recorder: Recorder::new(
                config.capture.clone(),
                sample_rate,
                factory,
                Arc::clone(&diagnostics),
            ),
            meters: engine.meters(),
            diagnostics,
            last_diagnostics: DiagnosticsSnapshot::default(),
            pads: engine.pad_atomics(),
        };

        // The mic is live from the start; the reverb gets its first response
        // now so enabling it later does not wait for synthesis
        console.connect_source(SourceId::Microphone);
        console.send_impulse();

        log::info!(
            "Console ready at {} Hz (limiter {} dB, mic volume {:.2})",
            sample_rate,
            mixer.limiter.db(),
            mixer.mic_volume
        );
        (console, engine)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&mut self, cmd: EngineCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    fn send_bus_gains(&mut self) -> bool {
        let gains = self.mixer.bus_gains();
        self.send(EngineCommand::SetBusGains(gains))
    }

    fn send_impulse(&mut self) -> bool {
        let shape = self.effects.impulse_shape();
        let impulse = ReverbImpulse::synthesize(&shape, self.sample_rate);
        let impulse = Owned::new(&self.gc, impulse);
        self.send(EngineCommand::SetReverbImpulse(impulse))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────────────

    /// Flip an effect in or out of the chain; returns the new enabled state
    ///
    /// If the engine queue is full the toggle is undone and the old state
    /// is returned.
    pub fn toggle_effect(&mut self, kind: EffectKind) -> bool {
        let topology = self.effects.toggle(kind);
        if !self.send(EngineCommand::SetTopology(topology)) {
            self.effects.toggle(kind);
            return self.effects.is_enabled(kind);
        }

        // The enhance slot drives the gate
        if kind == EffectKind::Enhance {
            let db = self.effects.gate_threshold_db();
            self.set_gate_threshold(db);
        }
        self.effects.is_enabled(kind)
    }

    /// Merge parameters into an effect
    ///
    /// Unknown keys are ignored and values are clamped. Returns false when
    /// nothing changed, or when the engine queue was full and the update was
    /// rolled back.
    pub fn update_effect(&mut self, kind: EffectKind, params: &ParamMap) -> bool {
        let before = self.effects.state(kind).params;
        let Some(update) = self.effects.update(kind, params) else {
            return false;
        };
        if !self.send(EngineCommand::UpdateEffect(update.settings)) {
            self.effects.restore(kind, before);
            return false;
        }
        if update.impulse.is_some() {
            self.send_impulse();
        }
        if let Some(db) = update.gate_threshold_db {
            self.set_gate_threshold(db);
        }
        true
    }

    pub fn effect_state(&self, kind: EffectKind) -> &EffectState {
        self.effects.state(kind)
    }

    pub fn effects(&self) -> &EffectsChain {
        &self.effects
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mixer
    // ─────────────────────────────────────────────────────────────────────

    pub fn mixer_state(&self) -> MixerState {
        self.mixer
    }

    /// Mic volume, clamped to 0..1
    pub fn set_mic_volume(&mut self, volume: f32) {
        self.mixer.set_mic_volume(volume);
        self.send_bus_gains();
    }

    pub fn set_mic_muted(&mut self, muted: bool) {
        self.mixer.muted = muted;
        self.send_bus_gains();
    }

    pub fn set_listening(&mut self, listening: bool) {
        self.mixer.listening = listening;
        self.send_bus_gains();
    }

    /// Preview-only routing; overrides listen while on
    pub fn set_cue_mode(&mut self, cue_mode: bool) {
        self.mixer.cue_mode = cue_mode;
        self.send_bus_gains();
    }

    /// Set the output ceiling, snapped to the nearest of 0/-3/-6/-12 dB
    pub fn set_limiter_threshold(&mut self, db: f32) -> LimiterCeiling {
        let ceiling = LimiterCeiling::nearest(db);
        self.mixer.limiter = ceiling;
        self.send(EngineCommand::SetLimiter(ceiling));
        ceiling
    }

    /// Noise gate threshold in dBFS; returns the value actually applied
    ///
    /// -100 or below disables the gate, anything else lands in -80..-20.
    pub fn set_gate_threshold(&mut self, db: f32) -> f32 {
        let db = clamp_gate_threshold(db);
        self.gate_threshold_db = db;
        self.send(EngineCommand::SetGateThreshold { db });
        db
    }

    pub fn gate_threshold_db(&self) -> f32 {
        self.gate_threshold_db
    }

    /// Connect a source into the graph; false if it already was
    pub fn connect_source(&mut self, source: SourceId) -> bool {
        if self.connections.contains(source) {
            return false;
        }
        if !self.send(EngineCommand::ConnectSource(source)) {
            return false;
        }
        self.connections.connect(source)
    }

    /// Remove a source from the graph; false if it was not connected
    pub fn remove_source(&mut self, source: SourceId) -> bool {
        if !self.connections.contains(source) {
            return false;
        }
        if !self.send(EngineCommand::RemoveSource(source)) {
            return false;
        }
        self.connections.remove(source)
    }

    pub fn is_connected(&self, source: SourceId) -> bool {
        self.connections.contains(source)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Recording
    // ─────────────────────────────────────────────────────────────────────

    /// Start recording a bus
    ///
    /// Blocks until the encoder reports ready. The engine starts feeding
    /// the session on its next block.
    pub fn start_recording(&mut self, tap: CaptureTap) -> RecordingResult<RecordingSession> {
        let (session, batcher) = self.recorder.start(tap)?;
        let batcher = Owned::new(&self.gc, batcher);
        if self.commands.send(EngineCommand::StartCapture(batcher)).is_err() {
            // The rejected batcher is gone, so the worker sees the stream end
            // and finalizes an empty asset nobody waits for
            let _ = self.recorder.stop();
            return Err(RecordingError::QueueFull);
        }
        Ok(session)
    }

    /// Stop recording
    ///
    /// The engine flushes its partial batch; the returned handle resolves
    /// once the encoder has finalized the asset.
    pub fn stop_recording(&mut self) -> RecordingResult<FinalizeHandle> {
        if !self.recorder.is_recording() {
            return Err(RecordingError::NotRecording);
        }
        if self.commands.send(EngineCommand::StopCapture).is_err() {
            return Err(RecordingError::QueueFull);
        }
        self.recorder.stop()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recording_session(&self) -> Option<RecordingSession> {
        self.recorder.session()
    }

    /// Recording lifecycle events
    pub fn events(&self) -> Receiver<RecordingEvent> {
        self.recorder.events()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Soundboard
    // ─────────────────────────────────────────────────────────────────────

    /// Decode a file into a pad
    pub fn load_pad(&mut self, index: usize, path: &Path) -> PadLoadResult<()> {
        if index >= NUM_PADS {
            return Err(PadLoadError::InvalidPad(index));
        }
        let sample = load_pad_file(path, self.sample_rate)?;
        self.load_pad_samples(index, sample)
    }

    /// Put an already decoded buffer into a pad and connect it
    pub fn load_pad_samples(&mut self, index: usize, sample: PadSample) -> PadLoadResult<()> {
        if index >= NUM_PADS {
            return Err(PadLoadError::InvalidPad(index));
        }
        log::info!(
            "Pad {}: loaded '{}' ({:.2}s)",
            index,
            sample.name,
            sample.duration_secs()
        );
        let sample = Shared::new(&self.gc, sample);
        if !self.send(EngineCommand::LoadPad { pad: index, sample }) {
            return Err(PadLoadError::QueueFull);
        }
        self.connect_source(SourceId::Pad(index));
        Ok(())
    }

    /// Start a pad from the top; an empty pad does nothing
    pub fn play_pad(&mut self, index: usize) -> bool {
        self.send(EngineCommand::PlayPad { pad: index })
    }

    pub fn stop_pad(&mut self, index: usize) -> bool {
        self.send(EngineCommand::StopPad { pad: index })
    }

    pub fn set_pad_loop(&mut self, index: usize, looping: bool) -> bool {
        self.send(EngineCommand::SetPadLoop {
            pad: index,
            looping,
        })
    }

    /// Per-pad gain, clamped to 0..3
    pub fn set_pad_gain(&mut self, index: usize, gain: f32) -> bool {
        let gain = clamp_pad_gain(gain);
        self.send(EngineCommand::SetPadGain { pad: index, gain })
    }

    /// Empty a pad and disconnect it
    pub fn remove_pad(&mut self, index: usize) -> bool {
        if index >= NUM_PADS {
            return false;
        }
        if !self.send(EngineCommand::UnloadPad { pad: index }) {
            return false;
        }
        // The engine drops the connection together with the sample
        self.connections.remove(SourceId::Pad(index));
        true
    }

    /// Readback for one pad
    pub fn pad(&self, index: usize) -> Option<&PadAtomics> {
        self.pads.get(index).map(|p| p.as_ref())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Readback
    // ─────────────────────────────────────────────────────────────────────

    pub fn meters(&self) -> &MeterBank {
        &self.meters
    }

    /// Log any render-path condition counted since the last call
    pub fn poll_diagnostics(&mut self) -> DiagnosticsSnapshot {
        let now = self.diagnostics.snapshot();
        let last = self.last_diagnostics;

        if now.mic_underruns > last.mic_underruns {
            log::warn!(
                "Mic input underrun ({} new, {} total)",
                now.mic_underruns - last.mic_underruns,
                now.mic_underruns
            );
        }
        if now.capture_overflows > last.capture_overflows {
            log::warn!(
                "Recording dropped {} batch(es): encoder falling behind",
                now.capture_overflows - last.capture_overflows
            );
        }
        if now.capture_pool_exhausted > last.capture_pool_exhausted {
            log::warn!(
                "Capture pool exhausted {} time(s), allocated on the audio thread",
                now.capture_pool_exhausted - last.capture_pool_exhausted
            );
        }
        if now.dropped_commands > last.dropped_commands {
            log::warn!(
                "{} engine command(s) dropped",
                now.dropped_commands - last.dropped_commands
            );
        }

        self.last_diagnostics = now;
        now
    }
}

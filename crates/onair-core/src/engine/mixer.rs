//! Mixer graph - buses, mode gain table and the broadcast safety stage
//!
//! ```text
//!   mic chain ──[mic]────────────┐
//!                                ├─ broadcast bus ─[broadcast]─ limiter ─ clipper ─► program
//!   soundboard ─[sbToBroadcast]──┘                                           │
//!        │                                                                   │
//!        └──────[sbLocal]──────────┬──────────[listenMonitor]────────────────┘
//!                                  └─► monitor
//! ```
//!
//! The control side keeps a [`MixerState`] and derives the [`BusGains`] for
//! the current mode from it. The render side ([`MixerGraph`]) only ever
//! receives complete gain sets, so no block can observe half a mode switch.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::gain_stage::GainStage;
use super::hard_clipper::HardClipper;
use super::output_limiter::OutputLimiter;
use super::soundboard::NUM_PADS;
use crate::types::{StereoBuffer, MAX_BLOCK_SIZE};

// ─────────────────────────────────────────────────────────────────────────────
// Control-side state
// ─────────────────────────────────────────────────────────────────────────────

/// Allowed limiter ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimiterCeiling {
    #[default]
    ZeroDb,
    Minus3Db,
    Minus6Db,
    Minus12Db,
}

impl LimiterCeiling {
    pub const ALL: [LimiterCeiling; 4] = [
        LimiterCeiling::ZeroDb,
        LimiterCeiling::Minus3Db,
        LimiterCeiling::Minus6Db,
        LimiterCeiling::Minus12Db,
    ];

    pub fn db(self) -> f32 {
        match self {
            LimiterCeiling::ZeroDb => 0.0,
            LimiterCeiling::Minus3Db => -3.0,
            LimiterCeiling::Minus6Db => -6.0,
            LimiterCeiling::Minus12Db => -12.0,
        }
    }

    /// Snap an arbitrary dB value to the nearest allowed ceiling
    ///
    /// NaN maps to 0 dB.
    pub fn nearest(db: f32) -> Self {
        if db.is_nan() {
            return LimiterCeiling::ZeroDb;
        }
        let mut best = LimiterCeiling::ZeroDb;
        for ceiling in Self::ALL {
            if (ceiling.db() - db).abs() < (best.db() - db).abs() {
                best = ceiling;
            }
        }
        best
    }
}

/// Listening mode derived from the listen and cue flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// Broadcast on air, soundboard monitored locally
    Default,
    /// Broadcast on air and monitored; local soundboard path silenced
    Listen,
    /// Preview only: nothing reaches the broadcast path
    Cue,
}

/// Target gains of every stage in the graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusGains {
    pub mic: f32,
    pub broadcast: f32,
    pub sb_to_broadcast: f32,
    pub sb_local: f32,
    pub listen_monitor: f32,
}

impl Default for BusGains {
    fn default() -> Self {
        MixerState::default().bus_gains()
    }
}

/// Operator-facing mixer controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerState {
    pub muted: bool,
    pub mic_volume: f32,
    pub listening: bool,
    pub cue_mode: bool,
    pub limiter: LimiterCeiling,
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            muted: false,
            mic_volume: 1.0,
            listening: false,
            cue_mode: false,
            limiter: LimiterCeiling::ZeroDb,
        }
    }
}

impl MixerState {
    /// Set the mic volume, clamped to 0..1; NaN is ignored
    pub fn set_mic_volume(&mut self, volume: f32) {
        if !volume.is_nan() {
            self.mic_volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn mode(&self) -> MonitorMode {
        if self.cue_mode {
            MonitorMode::Cue
        } else if self.listening {
            MonitorMode::Listen
        } else {
            MonitorMode::Default
        }
    }

    /// Mic gain: volume times mute, independent of the mode
    pub fn mic_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.mic_volume
        }
    }

    /// Gain table for the current mode
    pub fn bus_gains(&self) -> BusGains {
        let (broadcast, sb_to_broadcast, sb_local, listen_monitor) = match self.mode() {
            MonitorMode::Default => (1.0, 1.0, 1.0, 0.0),
            MonitorMode::Listen => (1.0, 1.0, 0.0, 1.0),
            MonitorMode::Cue => (0.0, 0.0, 1.0, 0.0),
        };
        BusGains {
            mic: self.mic_gain(),
            broadcast,
            sb_to_broadcast,
            sb_local,
            listen_monitor,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

/// A source that can be connected into the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    /// The mic chain output, feeding the broadcast bus
    Microphone,
    /// A soundboard pad, feeding the soundboard bus
    Pad(usize),
}

/// Which sources are connected
///
/// Connecting twice or removing something absent is a no-op; both calls
/// report whether anything changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connections {
    mic: bool,
    pads: [bool; NUM_PADS],
}

impl Connections {
    pub fn contains(&self, source: SourceId) -> bool {
        match source {
            SourceId::Microphone => self.mic,
            SourceId::Pad(i) => self.pads.get(i).copied().unwrap_or(false),
        }
    }

    fn slot(&mut self, source: SourceId) -> Option<&mut bool> {
        match source {
            SourceId::Microphone => Some(&mut self.mic),
            SourceId::Pad(i) => self.pads.get_mut(i),
        }
    }

    pub fn connect(&mut self, source: SourceId) -> bool {
        match self.slot(source) {
            Some(slot) if !*slot => {
                *slot = true;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, source: SourceId) -> bool {
        match self.slot(source) {
            Some(slot) if *slot => {
                *slot = false;
                true
            }
            _ => false,
        }
    }

    /// Connected flag per pad
    pub fn pads(&self) -> &[bool; NUM_PADS] {
        &self.pads
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Render-side graph
// ─────────────────────────────────────────────────────────────────────────────

/// The render-side graph; lives on the audio thread
pub struct MixerGraph {
    mic: GainStage,
    broadcast: GainStage,
    sb_to_broadcast: GainStage,
    sb_local: GainStage,
    listen_monitor: GainStage,
    connections: Connections,
    broadcast_bus: StereoBuffer,
    limiter: OutputLimiter,
    clipper: HardClipper,
}

impl MixerGraph {
    pub fn new(sample_rate: u32, state: &MixerState) -> Self {
        let gains = state.bus_gains();
        let ceiling = state.limiter.db();
        Self {
            mic: GainStage::new(gains.mic),
            broadcast: GainStage::new(gains.broadcast),
            sb_to_broadcast: GainStage::new(gains.sb_to_broadcast),
            sb_local: GainStage::new(gains.sb_local),
            listen_monitor: GainStage::new(gains.listen_monitor),
            connections: Connections::default(),
            broadcast_bus: StereoBuffer::silence(MAX_BLOCK_SIZE),
            limiter: OutputLimiter::new(sample_rate, ceiling),
            clipper: HardClipper::new(ceiling),
        }
    }

    /// Retarget every stage; the change ramps across the next block
    pub fn set_bus_gains(&mut self, gains: &BusGains) {
        self.mic.set_target(gains.mic);
        self.broadcast.set_target(gains.broadcast);
        self.sb_to_broadcast.set_target(gains.sb_to_broadcast);
        self.sb_local.set_target(gains.sb_local);
        self.listen_monitor.set_target(gains.listen_monitor);
    }

    /// Gains the stages are heading to
    pub fn bus_gains(&self) -> BusGains {
        BusGains {
            mic: self.mic.target(),
            broadcast: self.broadcast.target(),
            sb_to_broadcast: self.sb_to_broadcast.target(),
            sb_local: self.sb_local.target(),
            listen_monitor: self.listen_monitor.target(),
        }
    }

    pub fn set_limiter(&mut self, ceiling: LimiterCeiling) {
        self.limiter.set_threshold_db(ceiling.db());
        self.clipper.set_threshold_db(ceiling.db());
    }

    pub fn connect(&mut self, source: SourceId) -> bool {
        self.connections.connect(source)
    }

    pub fn remove(&mut self, source: SourceId) -> bool {
        self.connections.remove(source)
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn clip_indicator(&self) -> Arc<AtomicBool> {
        self.clipper.clip_indicator()
    }

    /// Render one block
    ///
    /// `mic` is the processed mic chain output and `soundboard` the summed
    /// pads. Both outputs are overwritten and take the length of `mic`.
    pub fn process(
        &mut self,
        mic: &StereoBuffer,
        soundboard: &StereoBuffer,
        program_out: &mut StereoBuffer,
        monitor_out: &mut StereoBuffer,
    ) {
        let len = mic.len();
        self.broadcast_bus.set_len_from_capacity(len);
        self.broadcast_bus.fill_silence();
        program_out.set_len_from_capacity(len);
        monitor_out.set_len_from_capacity(len);

        if self.connections.mic {
            self.mic.mix_into(mic, &mut self.broadcast_bus);
        } else {
            self.mic.jump_to(self.mic.target());
        }
        self.sb_to_broadcast.mix_into(soundboard, &mut self.broadcast_bus);

        // Program: broadcast bus → gain → limiter → clipper
        program_out.copy_from(&self.broadcast_bus);
        self.broadcast.process(program_out);
        self.limiter.process(program_out);
        self.clipper.process(program_out);

        monitor_out.fill_silence();
        self.sb_local.mix_into(soundboard, monitor_out);
        self.listen_monitor.mix_into(program_out, monitor_out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains(listening: bool, cue_mode: bool) -> BusGains {
        MixerState {
            listening,
            cue_mode,
            ..MixerState::default()
        }
        .bus_gains()
    }

    fn table_row(g: BusGains) -> (f32, f32, f32, f32) {
        (g.broadcast, g.sb_to_broadcast, g.sb_local, g.listen_monitor)
    }

    #[test]
    fn test_mode_table() {
        assert_eq!(table_row(gains(false, false)), (1.0, 1.0, 1.0, 0.0));
        assert_eq!(table_row(gains(true, false)), (1.0, 1.0, 0.0, 1.0));
        assert_eq!(table_row(gains(false, true)), (0.0, 0.0, 1.0, 0.0));
        assert_eq!(table_row(gains(true, true)), (0.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn test_mic_gain_independent_of_mode() {
        let mut state = MixerState::default();
        state.set_mic_volume(0.4);
        state.cue_mode = true;
        assert_eq!(state.bus_gains().mic, 0.4);
        state.muted = true;
        assert_eq!(state.bus_gains().mic, 0.0);

        state.set_mic_volume(7.0);
        assert_eq!(state.mic_volume, 1.0);
        state.set_mic_volume(f32::NAN);
        assert_eq!(state.mic_volume, 1.0);
    }

    #[test]
    fn test_limiter_snapping() {
        assert_eq!(LimiterCeiling::nearest(0.0), LimiterCeiling::ZeroDb);
        assert_eq!(LimiterCeiling::nearest(5.0), LimiterCeiling::ZeroDb);
        assert_eq!(LimiterCeiling::nearest(-4.0), LimiterCeiling::Minus3Db);
        assert_eq!(LimiterCeiling::nearest(-5.0), LimiterCeiling::Minus6Db);
        assert_eq!(LimiterCeiling::nearest(-40.0), LimiterCeiling::Minus12Db);
        assert_eq!(LimiterCeiling::nearest(f32::NAN), LimiterCeiling::ZeroDb);
    }

    #[test]
    fn test_connections_are_idempotent() {
        let mut c = Connections::default();
        assert!(c.connect(SourceId::Pad(2)));
        assert!(!c.connect(SourceId::Pad(2)));
        assert!(c.contains(SourceId::Pad(2)));
        assert!(c.remove(SourceId::Pad(2)));
        assert!(!c.remove(SourceId::Pad(2)));
        assert!(!c.connect(SourceId::Pad(NUM_PADS)));
        assert!(!c.contains(SourceId::Pad(99)));
    }

    #[test]
    fn test_cue_keeps_program_silent() {
        let mut graph = MixerGraph::new(48000, &MixerState::default());
        graph.connect(SourceId::Microphone);
        graph.set_bus_gains(&gains(true, true));

        let mic = StereoBuffer::from_mono(&[0.5; 128]);
        let pads = StereoBuffer::from_mono(&[0.25; 128]);
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);

        // First block ramps, second is settled
        graph.process(&mic, &pads, &mut program, &mut monitor);
        graph.process(&mic, &pads, &mut program, &mut monitor);

        assert_eq!(program.len(), 128);
        assert_eq!(program.peak(), 0.0);
        assert_eq!(monitor[64].left, 0.25);
    }

    #[test]
    fn test_listen_routes_program_to_monitor() {
        let mut graph = MixerGraph::new(48000, &MixerState::default());
        graph.connect(SourceId::Microphone);
        graph.set_bus_gains(&gains(true, false));

        let mic = StereoBuffer::from_mono(&[0.5; 128]);
        let pads = StereoBuffer::from_mono(&[0.25; 128]);
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
        graph.process(&mic, &pads, &mut program, &mut monitor);
        graph.process(&mic, &pads, &mut program, &mut monitor);

        assert_eq!(program[10].left, 0.75);
        // Local soundboard path is silenced: monitor is the program only
        assert_eq!(monitor[10].left, 0.75);
    }

    #[test]
    fn test_disconnected_mic_is_silent() {
        let mut graph = MixerGraph::new(48000, &MixerState::default());
        let mic = StereoBuffer::from_mono(&[0.5; 64]);
        let pads = StereoBuffer::silence(64);
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
        graph.process(&mic, &pads, &mut program, &mut monitor);
        assert_eq!(program.peak(), 0.0);
    }

    #[test]
    fn test_program_never_exceeds_ceiling() {
        let state = MixerState {
            limiter: LimiterCeiling::Minus6Db,
            ..MixerState::default()
        };
        let mut graph = MixerGraph::new(48000, &state);
        graph.connect(SourceId::Microphone);

        let mic = StereoBuffer::from_mono(&[0.9; 128]);
        let pads = StereoBuffer::from_mono(&[0.9; 128]);
        let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
        let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
        graph.process(&mic, &pads, &mut program, &mut monitor);
        assert!(program.peak() <= crate::types::db_to_linear(-6.0));
    }
}

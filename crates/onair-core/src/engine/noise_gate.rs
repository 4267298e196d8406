//! Noise gate for the microphone path
//!
//! Runs on the audio thread at the head of the mic chain. Each block the gate
//! measures the RMS level across both channels and every frame, then drives a
//! three-state machine:
//!
//! ```text
//!            rms >= threshold                  hold counter hits 0
//!   Closed ──────────────────► Open ──► Held ─────────────────────► Closed
//!                               ▲        │
//!                               └────────┘ rms >= threshold (hold reloads)
//! ```
//!
//! The gain applied to the signal follows the state's target gain through a
//! one-pole smoother evaluated per sample, with a fast coefficient when
//! opening and a slow one when closing.

use crate::config::GateConfig;
use crate::types::{db_to_linear, StereoBuffer};

/// Thresholds at or below this value disable the gate
pub const GATE_DISABLED_DB: f32 = -100.0;
/// Lowest active threshold (dBFS)
pub const MIN_GATE_THRESHOLD_DB: f32 = -80.0;
/// Highest active threshold (dBFS)
pub const MAX_GATE_THRESHOLD_DB: f32 = -20.0;

/// Clamp a requested threshold into the accepted range
///
/// Anything at or below [`GATE_DISABLED_DB`] maps to exactly that sentinel.
pub fn clamp_gate_threshold(db: f32) -> f32 {
    if db.is_nan() || db <= GATE_DISABLED_DB {
        GATE_DISABLED_DB
    } else {
        db.clamp(MIN_GATE_THRESHOLD_DB, MAX_GATE_THRESHOLD_DB)
    }
}

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Signal above threshold (or gate disabled)
    Open,
    /// Signal fell below threshold, hold counter running
    Held,
    /// Signal muted
    Closed,
}

impl GateState {
    /// Gain this state is heading for
    #[inline]
    pub fn target_gain(self) -> f32 {
        match self {
            GateState::Open | GateState::Held => 1.0,
            GateState::Closed => 0.0,
        }
    }
}

/// RMS-triggered noise gate with hold and asymmetric smoothing
#[derive(Debug, Clone)]
pub struct NoiseGate {
    /// Threshold as linear amplitude, `None` when disabled
    threshold: Option<f32>,
    threshold_db: f32,
    hold_samples: usize,
    hold_counter: usize,
    state: GateState,
    /// Currently applied gain (0.0 - 1.0)
    gain: f32,
    attack: f32,
    release: f32,
}

impl NoiseGate {
    /// Create a gate for the given sample rate
    pub fn new(config: &GateConfig, sample_rate: u32) -> Self {
        let mut gate = Self {
            threshold: None,
            threshold_db: GATE_DISABLED_DB,
            hold_samples: config.hold_samples(sample_rate),
            hold_counter: 0,
            state: GateState::Open,
            gain: 1.0,
            attack: config.attack.clamp(f32::EPSILON, 1.0),
            release: config.release.clamp(f32::EPSILON, 1.0),
        };
        gate.set_threshold_db(config.threshold_db);
        gate
    }

    /// Apply a threshold message. Takes effect on the next processed block.
    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold_db = clamp_gate_threshold(db);
        self.threshold = if self.threshold_db <= GATE_DISABLED_DB {
            None
        } else {
            Some(db_to_linear(self.threshold_db))
        };
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn is_disabled(&self) -> bool {
        self.threshold.is_none()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Gain applied to the last processed sample
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Remaining hold time in samples
    pub fn hold_counter(&self) -> usize {
        self.hold_counter
    }

    /// Advance the state machine for one block with the given RMS level
    fn update_state(&mut self, rms: f32, block_len: usize) {
        let threshold = match self.threshold {
            None => {
                self.state = GateState::Open;
                self.hold_counter = self.hold_samples;
                return;
            }
            Some(threshold) => threshold,
        };

        if rms >= threshold {
            self.state = GateState::Open;
            self.hold_counter = self.hold_samples;
            return;
        }

        match self.state {
            GateState::Open | GateState::Held => {
                self.hold_counter = self.hold_counter.saturating_sub(block_len);
                self.state = if self.hold_counter == 0 {
                    GateState::Closed
                } else {
                    GateState::Held
                };
            }
            GateState::Closed => {}
        }
    }

    /// Gate a block in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if buffer.is_empty() {
            return;
        }

        self.update_state(buffer.rms(), buffer.len());

        let target = self.state.target_gain();
        if self.gain == target && target == 1.0 {
            return;
        }

        let coeff = if target > self.gain {
            self.attack
        } else {
            self.release
        };

        for sample in buffer.iter_mut() {
            self.gain += (target - self.gain) * coeff;
            *sample *= self.gain;
        }
        self.gain = self.gain.clamp(0.0, 1.0);
    }

    /// Return to the open state with unity gain
    pub fn reset(&mut self) {
        self.state = GateState::Open;
        self.hold_counter = self.hold_samples;
        self.gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BLOCK_SIZE;

    fn gate_at(threshold_db: f32) -> NoiseGate {
        let mut gate = NoiseGate::new(&GateConfig::default(), 48000);
        gate.set_threshold_db(threshold_db);
        gate
    }

    fn block(level: f32) -> StereoBuffer {
        StereoBuffer::from_mono(&[level; BLOCK_SIZE])
    }

    #[test]
    fn test_threshold_clamping() {
        assert_eq!(clamp_gate_threshold(-150.0), GATE_DISABLED_DB);
        assert_eq!(clamp_gate_threshold(-100.0), GATE_DISABLED_DB);
        assert_eq!(clamp_gate_threshold(-90.0), -80.0);
        assert_eq!(clamp_gate_threshold(-10.0), -20.0);
        assert_eq!(clamp_gate_threshold(-40.0), -40.0);
    }

    #[test]
    fn test_disabled_gate_is_permanently_open() {
        for threshold in [-100.0, -120.0, -500.0, f32::NEG_INFINITY] {
            let mut gate = gate_at(threshold);
            assert!(gate.is_disabled());
            for _ in 0..200 {
                let mut buf = block(0.0);
                gate.process(&mut buf);
                assert_eq!(gate.state(), GateState::Open);
            }
            assert_eq!(gate.gain(), 1.0);

            let mut buf = block(1e-6);
            gate.process(&mut buf);
            assert_eq!(buf[0].left, 1e-6);
        }
    }

    #[test]
    fn test_gain_is_monotonic_and_bounded() {
        let mut gate = gate_at(-40.0);

        // Close the gate
        for _ in 0..100 {
            gate.process(&mut block(0.0));
        }
        assert_eq!(gate.state(), GateState::Closed);

        // Open: gain must rise monotonically without exceeding 1
        let mut last = gate.gain();
        for _ in 0..50 {
            let mut buf = block(0.5);
            gate.process(&mut buf);
            for s in buf.iter() {
                let applied = s.left / 0.5;
                assert!(applied >= last - 1e-6, "gain fell while opening");
                assert!(applied <= 1.0 + 1e-6);
                last = applied;
            }
        }

        // Close: gain must fall monotonically without going below 0
        gate.set_threshold_db(-20.0);
        let mut last = gate.gain();
        for _ in 0..100 {
            let mut buf = block(0.05);
            gate.process(&mut buf);
            for s in buf.iter() {
                let applied = s.left / 0.05;
                assert!(applied <= last + 1e-6, "gain rose while closing");
                assert!(applied >= 0.0);
                last = applied;
            }
        }
    }

    #[test]
    fn test_short_dip_keeps_gate_open() {
        let mut gate = gate_at(-40.0);
        gate.process(&mut block(0.5));

        // 15 blocks = 1920 samples, shorter than the 2400-sample hold
        for _ in 0..15 {
            let mut buf = block(0.001);
            gate.process(&mut buf);
            assert_ne!(gate.state(), GateState::Closed);
            assert_eq!(buf[BLOCK_SIZE - 1].left, 0.001);
        }
        assert_eq!(gate.gain(), 1.0);
    }

    #[test]
    fn test_hold_scenario_closes_on_block_19() {
        // threshold -40 dBFS, hold 50 ms @ 48 kHz = 2400 samples
        let mut gate = gate_at(-40.0);
        assert_eq!(gate.hold_samples, 2400);

        for _ in 0..3 {
            gate.process(&mut block(0.5));
            assert_eq!(gate.state(), GateState::Open);
            assert_eq!(gate.hold_counter(), 2400);
        }

        let mut closed_at = None;
        for n in 1..=25 {
            gate.process(&mut block(0.001));
            if gate.state() == GateState::Closed && closed_at.is_none() {
                closed_at = Some(n);
            }
        }
        assert_eq!(closed_at, Some(19));
        assert!(gate.gain() < 0.01, "gain {} did not decay", gate.gain());
    }

    #[test]
    fn test_slow_release_is_still_closing_after_25_blocks() {
        let config = GateConfig {
            release: 0.002,
            ..GateConfig::default()
        };
        let mut gate = NoiseGate::new(&config, 48000);
        gate.set_threshold_db(-40.0);

        for _ in 0..3 {
            gate.process(&mut block(0.5));
        }
        for _ in 0..25 {
            gate.process(&mut block(0.001));
        }
        // 7 closing blocks: (1 - 0.002)^896 ~= 0.166
        assert_eq!(gate.state(), GateState::Closed);
        assert!(gate.gain() > 0.1 && gate.gain() < 0.2);
    }

    #[test]
    fn test_threshold_change_applies_next_block() {
        let mut gate = gate_at(-40.0);
        gate.process(&mut block(0.05)); // ~-26 dBFS, open
        assert_eq!(gate.state(), GateState::Open);

        gate.set_threshold_db(-20.0);
        gate.process(&mut block(0.05));
        assert_eq!(gate.state(), GateState::Held);
    }
}

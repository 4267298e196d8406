//! Level meters and render-domain diagnostics
//!
//! The audio thread publishes through relaxed atomics once per block; the
//! control thread reads whenever it likes. Floats are stored as their bit
//! patterns in `AtomicU32`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::StereoBuffer;

/// A right channel this far below the left counts as absent
pub const MONO_DETECT_DB: f32 = 50.0;

#[inline]
fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

/// Peak and RMS of one block, per channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelReading {
    pub peak: [f32; 2],
    pub rms: [f32; 2],
    /// True when the block was treated as mono (right mirrors left)
    pub mono: bool,
}

#[derive(Debug, Default)]
pub struct LevelMeter {
    peak: [AtomicU32; 2],
    rms: [AtomicU32; 2],
    mono: AtomicBool,
}

impl LevelMeter {
    /// Measure one block and publish it
    ///
    /// `channel_hint` is the channel count the source declares. A source
    /// declaring one channel is always mono; a stereo source whose right
    /// channel is identical to the left, or sits more than
    /// [`MONO_DETECT_DB`] below it, is reported as mono too.
    pub fn update(&self, buffer: &StereoBuffer, channel_hint: u16) {
        let (mut peak_l, mut peak_r) = (0.0f32, 0.0f32);
        let (mut sum_l, mut sum_r) = (0.0f64, 0.0f64);
        let mut identical = true;
        for s in buffer.iter() {
            peak_l = peak_l.max(s.left.abs());
            peak_r = peak_r.max(s.right.abs());
            sum_l += (s.left as f64) * (s.left as f64);
            sum_r += (s.right as f64) * (s.right as f64);
            identical &= s.left == s.right;
        }
        let n = buffer.len().max(1) as f64;
        let rms_l = (sum_l / n).sqrt() as f32;
        let rms_r = (sum_r / n).sqrt() as f32;

        let right_silent = rms_l > 0.0
            && (rms_r == 0.0 || 20.0 * (rms_l / rms_r).log10() > MONO_DETECT_DB);
        let mono = channel_hint <= 1 || identical || right_silent;

        let (peak_r, rms_r) = if mono { (peak_l, rms_l) } else { (peak_r, rms_r) };
        store_f32(&self.peak[0], peak_l);
        store_f32(&self.peak[1], peak_r);
        store_f32(&self.rms[0], rms_l);
        store_f32(&self.rms[1], rms_r);
        self.mono.store(mono, Ordering::Relaxed);
    }

    pub fn read(&self) -> LevelReading {
        LevelReading {
            peak: [load_f32(&self.peak[0]), load_f32(&self.peak[1])],
            rms: [load_f32(&self.rms[0]), load_f32(&self.rms[1])],
            mono: self.mono.load(Ordering::Relaxed),
        }
    }
}

/// Every meter the engine publishes
#[derive(Debug)]
pub struct MeterBank {
    /// Mic after the effects chain
    pub mic: LevelMeter,
    /// Broadcast output
    pub program: LevelMeter,
    pub monitor: LevelMeter,
    gate_gain: AtomicU32,
    gate_open: AtomicBool,
    clip: Arc<AtomicBool>,
}

impl MeterBank {
    pub fn new(clip: Arc<AtomicBool>) -> Self {
        Self {
            mic: LevelMeter::default(),
            program: LevelMeter::default(),
            monitor: LevelMeter::default(),
            gate_gain: AtomicU32::new(1.0f32.to_bits()),
            gate_open: AtomicBool::new(true),
            clip,
        }
    }

    pub(crate) fn set_gate(&self, gain: f32, open: bool) {
        store_f32(&self.gate_gain, gain);
        self.gate_open.store(open, Ordering::Relaxed);
    }

    /// Smoothed gate gain (0 closed, 1 open)
    pub fn gate_gain(&self) -> f32 {
        load_f32(&self.gate_gain)
    }

    pub fn gate_open(&self) -> bool {
        self.gate_open.load(Ordering::Relaxed)
    }

    /// True if the clipper engaged since the last call
    pub fn take_clip(&self) -> bool {
        self.clip.swap(false, Ordering::Relaxed)
    }
}

/// Counters for rare conditions on the render path
///
/// The audio thread never logs; it bumps these and the control thread
/// reports changes.
#[derive(Debug, Default)]
pub struct EngineDiagnostics {
    mic_underruns: AtomicU64,
    capture_overflows: AtomicU64,
    capture_pool_exhausted: AtomicU64,
    dropped_commands: AtomicU64,
}

/// Point-in-time copy of [`EngineDiagnostics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticsSnapshot {
    pub mic_underruns: u64,
    pub capture_overflows: u64,
    pub capture_pool_exhausted: u64,
    pub dropped_commands: u64,
}

impl EngineDiagnostics {
    #[inline]
    pub fn record_mic_underrun(&self) {
        self.mic_underruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_capture_overflow(&self) {
        self.capture_overflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pool_exhausted(&self) {
        self.capture_pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_command(&self) {
        self.dropped_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            mic_underruns: self.mic_underruns.load(Ordering::Relaxed),
            capture_overflows: self.capture_overflows.load(Ordering::Relaxed),
            capture_pool_exhausted: self.capture_pool_exhausted.load(Ordering::Relaxed),
            dropped_commands: self.dropped_commands.load(Ordering::Relaxed),
        }
    }
}

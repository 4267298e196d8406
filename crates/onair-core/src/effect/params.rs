//! Effect kinds, parameter records and parameter-to-DSP mappings
//!
//! Each effect carries its own typed parameter record. Control-side updates
//! arrive as loose `key -> value` maps ([`ParamMap`]); known keys are clamped
//! into range and merged, unknown keys are ignored and missing keys keep
//! their previous value.
//!
//! The mapping from a record to the values a processor needs is a pure
//! function per kind, producing an [`EffectSettings`] variant that can be
//! pushed to the audio thread without allocation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::engine::GATE_DISABLED_DB;

/// Loose parameter update: key -> value
pub type ParamMap = HashMap<String, f32>;

/// Build a [`ParamMap`] from literal pairs
pub fn param_map<const N: usize>(pairs: [(&str, f32); N]) -> ParamMap {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Number of effect slots in the chain
pub const NUM_EFFECTS: usize = 6;

/// The built-in effects, in chain order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    Enhance,
    Tone,
    Compressor,
    PitchShift,
    Delay,
    Reverb,
}

impl EffectKind {
    /// Static chain order
    pub const ALL: [EffectKind; NUM_EFFECTS] = [
        EffectKind::Enhance,
        EffectKind::Tone,
        EffectKind::Compressor,
        EffectKind::PitchShift,
        EffectKind::Delay,
        EffectKind::Reverb,
    ];

    /// Position in the chain
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Enhance => "enhance",
            EffectKind::Tone => "tone",
            EffectKind::Compressor => "compressor",
            EffectKind::PitchShift => "pitch-shift",
            EffectKind::Delay => "delay",
            EffectKind::Reverb => "reverb",
        }
    }

    /// Parameter table for this kind
    pub fn param_info(self) -> &'static [ParamInfo] {
        match self {
            EffectKind::Enhance => &EnhanceParams::INFO,
            EffectKind::Tone => &ToneParams::INFO,
            EffectKind::Compressor => &CompressorParams::INFO,
            EffectKind::PitchShift => &PitchShiftParams::INFO,
            EffectKind::Delay => &DelayParams::INFO,
            EffectKind::Reverb => &ReverbParams::INFO,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for unknown effect names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown effect: {0}")]
pub struct UnknownEffect(pub String);

impl FromStr for EffectKind {
    type Err = UnknownEffect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "enhance" => Ok(EffectKind::Enhance),
            "tone" | "eq" => Ok(EffectKind::Tone),
            "compressor" | "comp" => Ok(EffectKind::Compressor),
            "pitch-shift" | "pitchshift" | "pitch" => Ok(EffectKind::PitchShift),
            "delay" | "echo" => Ok(EffectKind::Delay),
            "reverb" => Ok(EffectKind::Reverb),
            _ => Err(UnknownEffect(s.to_string())),
        }
    }
}

/// Description of one parameter key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub key: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub unit: &'static str,
}

impl ParamInfo {
    const fn percent(key: &'static str, default: f32) -> Self {
        Self {
            key,
            min: 0.0,
            max: 100.0,
            default,
            unit: "%",
        }
    }

    const fn decibels(key: &'static str, min: f32, max: f32) -> Self {
        Self {
            key,
            min,
            max,
            default: 0.0,
            unit: "dB",
        }
    }

    /// Clamp a value into this parameter's range
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Merge `map` into `slots`, returning whether any value changed
fn merge_slots<const N: usize>(
    info: &[ParamInfo; N],
    slots: [&mut f32; N],
    map: &ParamMap,
) -> bool {
    let mut changed = false;
    for (info, slot) in info.iter().zip(slots) {
        if let Some(&value) = map.get(info.key) {
            if !value.is_finite() {
                continue;
            }
            let value = info.clamp(value);
            if *slot != value {
                *slot = value;
                changed = true;
            }
        }
    }
    changed
}

fn to_map<const N: usize>(info: &[ParamInfo; N], values: [f32; N]) -> ParamMap {
    info.iter()
        .zip(values)
        .map(|(info, value)| (info.key.to_string(), value))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Enhance
// ─────────────────────────────────────────────────────────────────────────────

/// Voice cleanup: noise gate, rumble filter and presence lift
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceParams {
    /// Gate strength (0 disables the gate)
    pub gate: f32,
    /// Low-cut amount
    pub cleanup: f32,
    /// Presence lift
    pub clarity: f32,
}

impl EnhanceParams {
    pub const INFO: [ParamInfo; 3] = [
        ParamInfo::percent("gate", 0.0),
        ParamInfo::percent("cleanup", 25.0),
        ParamInfo::percent("clarity", 25.0),
    ];

    /// Centre of the presence peak (Hz)
    pub const PRESENCE_HZ: f32 = 3500.0;

    pub fn merge(&mut self, map: &ParamMap) -> bool {
        merge_slots(&Self::INFO, [&mut self.gate, &mut self.cleanup, &mut self.clarity], map)
    }

    pub fn settings(&self) -> EnhanceSettings {
        EnhanceSettings {
            gate_threshold_db: enhance_gate_threshold_db(self.gate),
            highpass_hz: 20.0 + (self.cleanup / 100.0) * 280.0,
            presence_db: (self.clarity / 100.0) * 12.0,
        }
    }
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            gate: Self::INFO[0].default,
            cleanup: Self::INFO[1].default,
            clarity: Self::INFO[2].default,
        }
    }
}

/// Gate strength to gate threshold: 0 disables, otherwise -80..-20 dBFS
pub fn enhance_gate_threshold_db(gate: f32) -> f32 {
    if gate <= 0.0 {
        GATE_DISABLED_DB
    } else {
        -80.0 + (gate.min(100.0) / 100.0) * 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceSettings {
    /// Sent to the noise gate rather than the enhance processor
    pub gate_threshold_db: f32,
    pub highpass_hz: f32,
    pub presence_db: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tone
// ─────────────────────────────────────────────────────────────────────────────

/// Three-band tone control, gains in dB
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ToneParams {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl ToneParams {
    pub const INFO: [ParamInfo; 3] = [
        ParamInfo::decibels("bass", -12.0, 12.0),
        ParamInfo::decibels("mid", -12.0, 12.0),
        ParamInfo::decibels("treble", -12.0, 12.0),
    ];

    pub const BASS_HZ: f32 = 250.0;
    pub const MID_HZ: f32 = 1000.0;
    pub const TREBLE_HZ: f32 = 4000.0;

    pub fn merge(&mut self, map: &ParamMap) -> bool {
        merge_slots(&Self::INFO, [&mut self.bass, &mut self.mid, &mut self.treble], map)
    }

    pub fn settings(&self) -> ToneSettings {
        ToneSettings {
            bass_db: self.bass,
            mid_db: self.mid,
            treble_db: self.treble,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSettings {
    pub bass_db: f32,
    pub mid_db: f32,
    pub treble_db: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Compressor
// ─────────────────────────────────────────────────────────────────────────────

/// One-knob compressor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    pub amount: f32,
    pub speed: f32,
    pub makeup: f32,
}

impl CompressorParams {
    pub const INFO: [ParamInfo; 3] = [
        ParamInfo::percent("amount", 50.0),
        ParamInfo::percent("speed", 50.0),
        ParamInfo::percent("makeup", 0.0),
    ];

    pub fn merge(&mut self, map: &ParamMap) -> bool {
        merge_slots(&Self::INFO, [&mut self.amount, &mut self.speed, &mut self.makeup], map)
    }

    pub fn settings(&self) -> CompressorSettings {
        let amount = self.amount / 100.0;
        let speed = self.speed / 100.0;
        CompressorSettings {
            threshold_db: -amount * 50.0,
            ratio: 1.0 + amount * 11.0,
            knee_db: 30.0 - amount * 25.0,
            attack_secs: 0.1 - speed * 0.099,
            release_secs: 0.5 - speed * 0.45,
            makeup_gain: 10.0_f32.powf((self.makeup / 100.0 * 24.0) / 20.0),
        }
    }
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            amount: Self::INFO[0].default,
            speed: Self::INFO[1].default,
            makeup: Self::INFO[2].default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub ratio: f32,
    pub knee_db: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
    /// Linear makeup gain
    pub makeup_gain: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pitch shift
// ─────────────────────────────────────────────────────────────────────────────

/// Pitch shifter: 0 = octave down, 50 = unity, 100 = octave up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchShiftParams {
    pub shift: f32,
}

impl PitchShiftParams {
    pub const INFO: [ParamInfo; 1] = [ParamInfo::percent("shift", 50.0)];

    pub fn merge(&mut self, map: &ParamMap) -> bool {
        merge_slots(&Self::INFO, [&mut self.shift], map)
    }

    pub fn settings(&self) -> PitchShiftSettings {
        PitchShiftSettings {
            ratio: 2.0_f32.powf((self.shift - 50.0) / 50.0),
        }
    }
}

impl Default for PitchShiftParams {
    fn default() -> Self {
        Self {
            shift: Self::INFO[0].default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchShiftSettings {
    /// Frequency ratio (0.5 - 2.0)
    pub ratio: f32,
}

impl PitchShiftSettings {
    /// Ratio expressed in semitones
    pub fn semitones(&self) -> f32 {
        12.0 * self.ratio.max(f32::MIN_POSITIVE).log2()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delay
// ─────────────────────────────────────────────────────────────────────────────

/// Echo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParams {
    pub timing: f32,
    pub repeats: f32,
    pub amount: f32,
}

impl DelayParams {
    pub const INFO: [ParamInfo; 3] = [
        ParamInfo::percent("timing", 30.0),
        ParamInfo::percent("repeats", 40.0),
        ParamInfo::percent("amount", 30.0),
    ];

    pub fn merge(&mut self, map: &ParamMap) -> bool {
        merge_slots(&Self::INFO, [&mut self.timing, &mut self.repeats, &mut self.amount], map)
    }

    pub fn settings(&self) -> DelaySettings {
        DelaySettings {
            time_secs: 0.05 + (self.timing / 100.0) * 0.95,
            feedback: (self.repeats / 100.0) * 0.9,
            wet: self.amount / 100.0,
        }
    }
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            timing: Self::INFO[0].default,
            repeats: Self::INFO[1].default,
            amount: Self::INFO[2].default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySettings {
    pub time_secs: f32,
    pub feedback: f32,
    pub wet: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reverb
// ─────────────────────────────────────────────────────────────────────────────

/// Convolution reverb with a synthesised room
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    pub space: f32,
    pub fade: f32,
    pub amount: f32,
}

impl ReverbParams {
    pub const INFO: [ParamInfo; 3] = [
        ParamInfo::percent("space", 30.0),
        ParamInfo::percent("fade", 40.0),
        ParamInfo::percent("amount", 30.0),
    ];

    pub fn merge(&mut self, map: &ParamMap) -> bool {
        merge_slots(&Self::INFO, [&mut self.space, &mut self.fade, &mut self.amount], map)
    }

    pub fn settings(&self) -> ReverbSettings {
        ReverbSettings {
            wet: self.amount / 100.0,
        }
    }

    /// Shape of the impulse response; a change means it must be regenerated
    pub fn impulse_shape(&self) -> ImpulseShape {
        ImpulseShape {
            duration_secs: 0.1 + (self.space / 100.0) * 4.9,
            decay: 0.5 + (self.fade / 100.0) * 5.0,
        }
    }
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            space: Self::INFO[0].default,
            fade: Self::INFO[1].default,
            amount: Self::INFO[2].default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSettings {
    pub wet: f32,
}

/// Impulse response duration and decay exponent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseShape {
    pub duration_secs: f32,
    pub decay: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tagged unions
// ─────────────────────────────────────────────────────────────────────────────

/// Parameter record of any effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectParams {
    Enhance(EnhanceParams),
    Tone(ToneParams),
    Compressor(CompressorParams),
    PitchShift(PitchShiftParams),
    Delay(DelayParams),
    Reverb(ReverbParams),
}

impl EffectParams {
    /// Default record for a kind
    pub fn default_for(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Enhance => EffectParams::Enhance(EnhanceParams::default()),
            EffectKind::Tone => EffectParams::Tone(ToneParams::default()),
            EffectKind::Compressor => EffectParams::Compressor(CompressorParams::default()),
            EffectKind::PitchShift => EffectParams::PitchShift(PitchShiftParams::default()),
            EffectKind::Delay => EffectParams::Delay(DelayParams::default()),
            EffectKind::Reverb => EffectParams::Reverb(ReverbParams::default()),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            EffectParams::Enhance(_) => EffectKind::Enhance,
            EffectParams::Tone(_) => EffectKind::Tone,
            EffectParams::Compressor(_) => EffectKind::Compressor,
            EffectParams::PitchShift(_) => EffectKind::PitchShift,
            EffectParams::Delay(_) => EffectKind::Delay,
            EffectParams::Reverb(_) => EffectKind::Reverb,
        }
    }

    /// Merge an update, returning whether anything changed
    pub fn merge(&mut self, map: &ParamMap) -> bool {
        match self {
            EffectParams::Enhance(p) => p.merge(map),
            EffectParams::Tone(p) => p.merge(map),
            EffectParams::Compressor(p) => p.merge(map),
            EffectParams::PitchShift(p) => p.merge(map),
            EffectParams::Delay(p) => p.merge(map),
            EffectParams::Reverb(p) => p.merge(map),
        }
    }

    /// Current values as a key -> value map
    pub fn to_map(&self) -> ParamMap {
        match self {
            EffectParams::Enhance(p) => to_map(&EnhanceParams::INFO, [p.gate, p.cleanup, p.clarity]),
            EffectParams::Tone(p) => to_map(&ToneParams::INFO, [p.bass, p.mid, p.treble]),
            EffectParams::Compressor(p) => {
                to_map(&CompressorParams::INFO, [p.amount, p.speed, p.makeup])
            }
            EffectParams::PitchShift(p) => to_map(&PitchShiftParams::INFO, [p.shift]),
            EffectParams::Delay(p) => to_map(&DelayParams::INFO, [p.timing, p.repeats, p.amount]),
            EffectParams::Reverb(p) => to_map(&ReverbParams::INFO, [p.space, p.fade, p.amount]),
        }
    }

    /// Map the record onto processor settings
    pub fn settings(&self) -> EffectSettings {
        match self {
            EffectParams::Enhance(p) => EffectSettings::Enhance(p.settings()),
            EffectParams::Tone(p) => EffectSettings::Tone(p.settings()),
            EffectParams::Compressor(p) => EffectSettings::Compressor(p.settings()),
            EffectParams::PitchShift(p) => EffectSettings::PitchShift(p.settings()),
            EffectParams::Delay(p) => EffectSettings::Delay(p.settings()),
            EffectParams::Reverb(p) => EffectSettings::Reverb(p.settings()),
        }
    }
}

/// Processor-ready values for any effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectSettings {
    Enhance(EnhanceSettings),
    Tone(ToneSettings),
    Compressor(CompressorSettings),
    PitchShift(PitchShiftSettings),
    Delay(DelaySettings),
    Reverb(ReverbSettings),
}

impl EffectSettings {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectSettings::Enhance(_) => EffectKind::Enhance,
            EffectSettings::Tone(_) => EffectKind::Tone,
            EffectSettings::Compressor(_) => EffectKind::Compressor,
            EffectSettings::PitchShift(_) => EffectKind::PitchShift,
            EffectSettings::Delay(_) => EffectKind::Delay,
            EffectSettings::Reverb(_) => EffectKind::Reverb,
        }
    }
}

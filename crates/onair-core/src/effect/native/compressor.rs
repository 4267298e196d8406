//! Compressor - feed-forward soft-knee dynamics
//!
//! Gain computer (in dB, with threshold T, ratio R and knee width W):
//!
//! ```text
//!   x - T < -W/2        : y = x
//!   |x - T| <= W/2      : y = x + (1/R - 1)(x - T + W/2)² / 2W
//!   x - T > W/2         : y = T + (x - T)/R
//! ```
//!
//! The gain reduction `x - y` is smoothed with separate attack and release
//! time constants and the makeup gain is applied after. With ratio 1 the
//! computer never reduces gain, so amount 0 is equivalent to bypass.

use crate::effect::{CompressorParams, CompressorSettings, Effect, EffectKind, EffectSettings};
use crate::types::{db_to_linear, linear_to_db, StereoBuffer};

pub struct CompressorEffect {
    sample_rate: f32,
    settings: CompressorSettings,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain reduction in dB (>= 0)
    envelope_db: f32,
    /// Makeup gain reached by the end of the last block
    makeup: f32,
}

/// One-pole coefficient for a time constant
fn time_coeff(secs: f32, sample_rate: f32) -> f32 {
    if secs <= 0.0 {
        0.0
    } else {
        (-1.0 / (secs * sample_rate)).exp()
    }
}

impl CompressorEffect {
    pub fn new(sample_rate: u32) -> Self {
        let settings = CompressorParams::default().settings();
        let mut effect = Self {
            sample_rate: sample_rate as f32,
            settings,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope_db: 0.0,
            makeup: settings.makeup_gain,
        };
        effect.set(&settings);
        effect
    }

    fn set(&mut self, settings: &CompressorSettings) {
        self.settings = *settings;
        self.attack_coeff = time_coeff(settings.attack_secs, self.sample_rate);
        self.release_coeff = time_coeff(settings.release_secs, self.sample_rate);
    }

    /// Gain reduction in dB for an input level in dB
    #[inline]
    fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let s = &self.settings;
        if s.ratio <= 1.0 {
            return 0.0;
        }
        let over = level_db - s.threshold_db;
        let knee = s.knee_db.max(0.0);
        let slope = 1.0 / s.ratio - 1.0;

        let output_db = if 2.0 * over < -knee {
            level_db
        } else if knee > 0.0 && 2.0 * over.abs() <= knee {
            let x = over + knee / 2.0;
            level_db + slope * x * x / (2.0 * knee)
        } else {
            s.threshold_db + over / s.ratio
        };
        (level_db - output_db).max(0.0)
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }
}

impl Effect for CompressorEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Compressor
    }

    fn process(&mut self, buffer: &mut StereoBuffer) {
        let len = buffer.len().max(1) as f32;
        let makeup_from = self.makeup;
        let makeup_to = self.settings.makeup_gain;

        for (i, sample) in buffer.iter_mut().enumerate() {
            let level_db = linear_to_db(sample.peak());
            let target = self.gain_reduction_db(level_db);

            let coeff = if target > self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = target + (self.envelope_db - target) * coeff;

            let makeup = makeup_from + (makeup_to - makeup_from) * ((i + 1) as f32 / len);
            let gain = if self.envelope_db > 0.0 {
                db_to_linear(-self.envelope_db) * makeup
            } else {
                makeup
            };
            *sample *= gain;
        }
        self.makeup = makeup_to;
    }

    fn apply(&mut self, settings: &EffectSettings) {
        if let EffectSettings::Compressor(s) = settings {
            self.set(s);
        }
    }

    fn reset(&mut self) {
        self.envelope_db = 0.0;
        self.makeup = self.settings.makeup_gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_params(amount: f32, speed: f32, makeup: f32) -> CompressorEffect {
        let mut effect = CompressorEffect::new(48000);
        let settings = CompressorParams {
            amount,
            speed,
            makeup,
        }
        .settings();
        effect.apply(&EffectSettings::Compressor(settings));
        effect.reset();
        effect
    }

    #[test]
    fn test_amount_zero_is_bypass_equivalent() {
        let mut effect = with_params(0.0, 50.0, 0.0);
        let input: Vec<f32> = (0..2048).map(|i| ((i as f32) * 0.01).sin() * 0.99).collect();
        let mut buf = StereoBuffer::from_mono(&input);
        effect.process(&mut buf);
        for (out, inp) in buf.iter().zip(input.iter()) {
            assert!((out.left - inp).abs() < 1e-6);
        }
    }

    #[test]
    fn test_full_amount_compresses_loud_signal() {
        let mut effect = with_params(100.0, 100.0, 0.0);
        assert_eq!(effect.settings().ratio, 12.0);

        // -6 dBFS steady tone, 44 dB over a -50 dB threshold
        let mut buf = StereoBuffer::from_mono(&[0.5; 9600]);
        effect.process(&mut buf);
        let out_db = linear_to_db(buf[9599].left);
        // Above the knee: -50 + 44/12 ≈ -46.3 dBFS
        assert!((out_db + 46.33).abs() < 0.5, "out {} dB", out_db);
    }

    #[test]
    fn test_quiet_signal_below_knee_untouched() {
        let mut effect = with_params(50.0, 50.0, 0.0);
        // threshold -25 dB, knee 17.5 dB: -60 dBFS is far below the knee
        let level = db_to_linear(-60.0);
        let mut buf = StereoBuffer::from_mono(&[level; 1024]);
        effect.process(&mut buf);
        assert!((buf[1023].left - level).abs() < 1e-7);
    }

    #[test]
    fn test_gain_reduction_is_continuous_across_knee() {
        let effect = with_params(100.0, 50.0, 0.0);
        let t = effect.settings().threshold_db;
        let w = effect.settings().knee_db;
        let below = effect.gain_reduction_db(t - w / 2.0 - 0.001);
        let edge = effect.gain_reduction_db(t - w / 2.0 + 0.001);
        assert!((below - edge).abs() < 0.01);
        let inside = effect.gain_reduction_db(t + w / 2.0 - 0.001);
        let above = effect.gain_reduction_db(t + w / 2.0 + 0.001);
        assert!((inside - above).abs() < 0.01);
    }
}

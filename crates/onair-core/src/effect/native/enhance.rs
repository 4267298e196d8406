//! Enhance - rumble filter and presence lift for speech
//!
//! The gate part of the enhance effect is not processed here: its threshold
//! is routed to the mic noise gate, which sits ahead of the whole chain.

use crate::effect::{Effect, EffectKind, EffectSettings, EnhanceParams, EnhanceSettings};
use crate::types::StereoBuffer;

use super::biquad::{BiquadCoeffs, SmoothedBiquad};

/// Q of the presence peak
const PRESENCE_Q: f32 = 1.0;
/// Butterworth Q for the low cut
const HIGHPASS_Q: f32 = 0.707;

pub struct EnhanceEffect {
    sample_rate: f32,
    highpass: SmoothedBiquad,
    presence: SmoothedBiquad,
}

impl EnhanceEffect {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        let settings = EnhanceParams::default().settings();
        Self {
            sample_rate,
            highpass: SmoothedBiquad::new(BiquadCoeffs::high_pass(
                settings.highpass_hz,
                HIGHPASS_Q,
                sample_rate,
            )),
            presence: SmoothedBiquad::new(BiquadCoeffs::peaking(
                EnhanceParams::PRESENCE_HZ,
                settings.presence_db,
                PRESENCE_Q,
                sample_rate,
            )),
        }
    }

    fn set(&mut self, settings: &EnhanceSettings) {
        self.highpass.set_target(BiquadCoeffs::high_pass(
            settings.highpass_hz,
            HIGHPASS_Q,
            self.sample_rate,
        ));
        self.presence.set_target(BiquadCoeffs::peaking(
            EnhanceParams::PRESENCE_HZ,
            settings.presence_db,
            PRESENCE_Q,
            self.sample_rate,
        ));
    }
}

impl Effect for EnhanceEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Enhance
    }

    fn process(&mut self, buffer: &mut StereoBuffer) {
        self.highpass.process(buffer);
        self.presence.process(buffer);
    }

    fn apply(&mut self, settings: &EffectSettings) {
        if let EffectSettings::Enhance(s) = settings {
            self.set(s);
        }
    }

    fn reset(&mut self) {
        self.highpass.reset();
        self.presence.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{param_map, EffectParams};
    use std::f32::consts::PI;

    fn sine(freq: f32, len: usize) -> StereoBuffer {
        let samples: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / 48000.0).sin() * 0.5)
            .collect();
        StereoBuffer::from_mono(&samples)
    }

    #[test]
    fn test_cleanup_removes_low_rumble() {
        let mut effect = EnhanceEffect::new(48000);
        let mut params = EffectParams::default_for(EffectKind::Enhance);
        params.merge(&param_map([("cleanup", 100.0), ("clarity", 0.0)]));
        effect.apply(&params.settings());

        let mut buf = sine(30.0, 48000);
        effect.process(&mut buf);
        let tail = StereoBuffer::from_vec(buf.as_slice()[24000..].to_vec());
        assert!(tail.peak() < 0.02, "rumble peak {}", tail.peak());
    }

    #[test]
    fn test_ignores_other_kinds() {
        let mut effect = EnhanceEffect::new(48000);
        let before = *effect.highpass.coeffs();
        effect.apply(&EffectParams::default_for(EffectKind::Tone).settings());
        assert_eq!(*effect.highpass.coeffs(), before);
    }
}

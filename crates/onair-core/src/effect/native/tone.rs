//! Tone - three-band shelf/peak equaliser

use crate::effect::{Effect, EffectKind, EffectSettings, ToneParams, ToneSettings};
use crate::types::StereoBuffer;

use super::biquad::{BiquadCoeffs, SmoothedBiquad};

/// Q for the mid band
const MID_Q: f32 = 0.7;

pub struct ToneEffect {
    sample_rate: f32,
    bass: SmoothedBiquad,
    mid: SmoothedBiquad,
    treble: SmoothedBiquad,
}

impl ToneEffect {
    pub fn new(sample_rate: u32) -> Self {
        let mut effect = Self {
            sample_rate: sample_rate as f32,
            bass: SmoothedBiquad::new(BiquadCoeffs::passthrough()),
            mid: SmoothedBiquad::new(BiquadCoeffs::passthrough()),
            treble: SmoothedBiquad::new(BiquadCoeffs::passthrough()),
        };
        effect.set(&ToneParams::default().settings());
        effect.reset();
        effect
    }

    fn set(&mut self, settings: &ToneSettings) {
        let sr = self.sample_rate;
        self.bass
            .set_target(BiquadCoeffs::low_shelf(ToneParams::BASS_HZ, settings.bass_db, sr));
        self.mid
            .set_target(BiquadCoeffs::peaking(ToneParams::MID_HZ, settings.mid_db, MID_Q, sr));
        self.treble
            .set_target(BiquadCoeffs::high_shelf(ToneParams::TREBLE_HZ, settings.treble_db, sr));
    }
}

impl Effect for ToneEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Tone
    }

    fn process(&mut self, buffer: &mut StereoBuffer) {
        self.bass.process(buffer);
        self.mid.process(buffer);
        self.treble.process(buffer);
    }

    fn apply(&mut self, settings: &EffectSettings) {
        if let EffectSettings::Tone(s) = settings {
            self.set(s);
        }
    }

    fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_tone_is_transparent() {
        let mut effect = ToneEffect::new(48000);
        let input: Vec<f32> = (0..512).map(|i| ((i as f32) * 0.05).sin() * 0.4).collect();
        let mut buf = StereoBuffer::from_mono(&input);
        effect.process(&mut buf);
        for (out, inp) in buf.iter().zip(input.iter()) {
            assert!((out.left - inp).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bass_cut_reduces_low_end() {
        let mut effect = ToneEffect::new(48000);
        effect.apply(&EffectSettings::Tone(ToneSettings {
            bass_db: -12.0,
            mid_db: 0.0,
            treble_db: 0.0,
        }));

        let input: Vec<f32> = (0..24000)
            .map(|i| (2.0 * std::f32::consts::PI * 60.0 * i as f32 / 48000.0).sin() * 0.5)
            .collect();
        let mut buf = StereoBuffer::from_mono(&input);
        effect.process(&mut buf);
        let tail = StereoBuffer::from_vec(buf.as_slice()[12000..].to_vec());
        assert!(tail.peak() < 0.2, "peak {}", tail.peak());
    }
}

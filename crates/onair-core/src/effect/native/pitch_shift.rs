//! Pitch shift via signalsmith-stretch
//!
//! The stretcher runs with equal input and output lengths, so there is no
//! time stretching, only transposition. Buffers are handed over as
//! interleaved views of the stereo blocks, without per-frame copying.

use signalsmith_stretch::Stretch;

use crate::effect::{Effect, EffectKind, EffectSettings, PitchShiftSettings};
use crate::types::{StereoBuffer, MAX_BLOCK_SIZE};

/// Number of channels (stereo)
const CHANNELS: u32 = 2;

/// Transposition range (one octave either way)
const MAX_SEMITONES: f32 = 12.0;

pub struct PitchShiftEffect {
    stretcher: Stretch,
    semitones: f32,
    /// Copy of the incoming block (the output is written in place)
    input: StereoBuffer,
}

impl PitchShiftEffect {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_default(CHANNELS, sample_rate),
            semitones: 0.0,
            input: StereoBuffer::silence(MAX_BLOCK_SIZE),
        }
    }

    /// Current transposition in semitones
    pub fn semitones(&self) -> f32 {
        self.semitones
    }

    fn set(&mut self, settings: &PitchShiftSettings) {
        let semitones = settings.semitones().clamp(-MAX_SEMITONES, MAX_SEMITONES);
        if semitones != self.semitones {
            self.semitones = semitones;
            self.stretcher.set_transpose_factor_semitones(semitones, None);
        }
    }
}

impl Effect for PitchShiftEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::PitchShift
    }

    fn process(&mut self, buffer: &mut StereoBuffer) {
        let len = buffer.len();
        if len == 0 {
            return;
        }

        self.input.copy_from(buffer);
        let output = buffer.as_interleaved_mut();
        output.fill(0.0);
        self.stretcher
            .process(&self.input.as_interleaved()[..len * 2], &mut output[..len * 2]);
    }

    fn apply(&mut self, settings: &EffectSettings) {
        if let EffectSettings::PitchShift(s) = settings {
            self.set(s);
        }
    }

    fn latency_samples(&self) -> u32 {
        (self.stretcher.input_latency() + self.stretcher.output_latency()) as u32
    }

    fn reset(&mut self) {
        self.stretcher.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::PitchShiftParams;

    #[test]
    fn test_shift_maps_to_semitones() {
        let mut effect = PitchShiftEffect::new(48000);
        effect.apply(&EffectSettings::PitchShift(PitchShiftParams { shift: 100.0 }.settings()));
        assert!((effect.semitones() - 12.0).abs() < 1e-3);

        effect.apply(&EffectSettings::PitchShift(PitchShiftParams { shift: 0.0 }.settings()));
        assert!((effect.semitones() + 12.0).abs() < 1e-3);
    }

    #[test]
    fn test_reports_latency() {
        let effect = PitchShiftEffect::new(48000);
        assert!(effect.latency_samples() > 0);
    }

    #[test]
    fn test_process_keeps_block_length() {
        let mut effect = PitchShiftEffect::new(48000);
        let mut buf = StereoBuffer::silence(128);
        effect.process(&mut buf);
        assert_eq!(buf.len(), 128);
        assert_eq!(buf.peak(), 0.0);
    }
}

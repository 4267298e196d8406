//! Biquad filter primitives (RBJ cookbook) with coefficient smoothing

use std::f32::consts::PI;

use crate::types::StereoBuffer;

/// Biquad filter coefficients (normalized, a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Passthrough (unity gain, no filtering)
    pub fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    /// Keep `freq` strictly inside (0, nyquist)
    fn safe_freq(freq: f32, sample_rate: f32) -> f32 {
        freq.clamp(1.0, sample_rate * 0.49)
    }

    /// Second-order high-pass
    pub fn high_pass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * Self::safe_freq(freq, sample_rate) / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Low shelf; `gain_db` is the boost/cut below `freq`
    pub fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * Self::safe_freq(freq, sample_rate) / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();
        let sqrt_a = a.sqrt();

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha) / a0,
        }
    }

    /// Peaking EQ
    pub fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * Self::safe_freq(freq, sample_rate) / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    /// High shelf; `gain_db` is the boost/cut above `freq`
    pub fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * Self::safe_freq(freq, sample_rate) / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();
        let sqrt_a = a.sqrt();

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha) / a0,
        }
    }

    /// Linear interpolation between two coefficient sets
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            b0: self.b0 + (other.b0 - self.b0) * t,
            b1: self.b1 + (other.b1 - self.b1) * t,
            b2: self.b2 + (other.b2 - self.b2) * t,
            a1: self.a1 + (other.a1 - self.a1) * t,
            a2: self.a2 + (other.a2 - self.a2) * t,
        }
    }
}

/// Stereo direct-form-I filter memory
#[derive(Debug, Clone, Default)]
pub struct BiquadState {
    x1: [f32; 2],
    x2: [f32; 2],
    y1: [f32; 2],
    y2: [f32; 2],
}

impl BiquadState {
    #[inline]
    fn tick(&mut self, ch: usize, input: f32, c: &BiquadCoeffs) -> f32 {
        let out = c.b0 * input + c.b1 * self.x1[ch] + c.b2 * self.x2[ch]
            - c.a1 * self.y1[ch]
            - c.a2 * self.y2[ch];
        self.x2[ch] = self.x1[ch];
        self.x1[ch] = input;
        self.y2[ch] = self.y1[ch];
        self.y1[ch] = out;
        out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Biquad whose coefficient changes glide across one block
#[derive(Debug, Clone)]
pub struct SmoothedBiquad {
    state: BiquadState,
    current: BiquadCoeffs,
    target: BiquadCoeffs,
}

impl SmoothedBiquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            state: BiquadState::default(),
            current: coeffs,
            target: coeffs,
        }
    }

    /// Coefficients reached by the end of the next block
    pub fn set_target(&mut self, coeffs: BiquadCoeffs) {
        self.target = coeffs;
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.target
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.current == self.target {
            let c = self.current;
            for s in buffer.iter_mut() {
                s.left = self.state.tick(0, s.left, &c);
                s.right = self.state.tick(1, s.right, &c);
            }
            return;
        }

        let len = buffer.len().max(1) as f32;
        let from = self.current;
        for (i, s) in buffer.iter_mut().enumerate() {
            let c = from.lerp(&self.target, (i + 1) as f32 / len);
            s.left = self.state.tick(0, s.left, &c);
            s.right = self.state.tick(1, s.right, &c);
        }
        self.current = self.target;
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.current = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Steady-state gain of a filter for a sine at `freq`
    fn measure_gain(coeffs: BiquadCoeffs, freq: f32) -> f32 {
        let sr = 48000.0;
        let mut filter = SmoothedBiquad::new(coeffs);
        let input: Vec<f32> = (0..9600)
            .map(|i| (2.0 * PI * freq * i as f32 / sr).sin() * 0.5)
            .collect();
        let mut buf = StereoBuffer::from_mono(&input);
        filter.process(&mut buf);
        let tail = StereoBuffer::from_vec(buf.as_slice()[4800..].to_vec());
        tail.peak() / 0.5
    }

    #[test]
    fn test_passthrough_is_identity() {
        let mut filter = SmoothedBiquad::new(BiquadCoeffs::passthrough());
        let mut buf = StereoBuffer::from_interleaved(&[0.1, -0.2, 0.3, 0.4]);
        filter.process(&mut buf);
        assert_eq!(buf.as_interleaved(), &[0.1, -0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_high_pass_attenuates_rumble() {
        let hp = BiquadCoeffs::high_pass(300.0, 0.707, 48000.0);
        assert!(measure_gain(hp, 40.0) < 0.05);
        assert!(measure_gain(hp, 3000.0) > 0.95);
    }

    #[test]
    fn test_low_shelf_boost() {
        let shelf = BiquadCoeffs::low_shelf(250.0, 12.0, 48000.0);
        let gain = measure_gain(shelf, 50.0);
        assert!(gain > 3.3 && gain < 4.1, "gain {}", gain);
        assert!((measure_gain(shelf, 10000.0) - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_peaking_at_centre() {
        let peak = BiquadCoeffs::peaking(3500.0, 6.0, 1.0, 48000.0);
        let gain = measure_gain(peak, 3500.0);
        assert!((gain - 1.995).abs() < 0.1, "gain {}", gain);
    }

    #[test]
    fn test_coefficient_glide_lands_on_target() {
        let mut filter = SmoothedBiquad::new(BiquadCoeffs::passthrough());
        let target = BiquadCoeffs::high_shelf(4000.0, -6.0, 48000.0);
        filter.set_target(target);
        let mut buf = StereoBuffer::silence(128);
        filter.process(&mut buf);
        assert_eq!(filter.current, target);
    }
}

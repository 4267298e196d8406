//! Gain stage - the smallest controllable element of the mixer graph
//!
//! A gain stage multiplies a stereo signal by a scalar. Target changes are
//! ramped linearly across one block so a switch never produces a step. The
//! ramp always lands exactly on the target at the last sample of the block,
//! which keeps mode switches bit-exact: a stage set to 0.0 is truly silent
//! from the next block on, and a stage set to 1.0 is a true passthrough.

use crate::types::StereoBuffer;

/// Scalar amplitude multiplier with per-block linear smoothing
#[derive(Debug, Clone)]
pub struct GainStage {
    /// Gain applied at the end of the last processed block
    current: f32,
    /// Gain the stage is moving towards
    target: f32,
}

impl GainStage {
    /// Create a stage that starts settled at `gain`
    pub fn new(gain: f32) -> Self {
        Self {
            current: gain,
            target: gain,
        }
    }

    /// Unity passthrough stage
    pub fn unity() -> Self {
        Self::new(1.0)
    }

    /// Set the gain reached by the end of the next block
    #[inline]
    pub fn set_target(&mut self, gain: f32) {
        self.target = if gain.is_finite() { gain } else { 0.0 };
    }

    /// Jump straight to `gain` without a ramp
    pub fn jump_to(&mut self, gain: f32) {
        self.set_target(gain);
        self.current = self.target;
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Whether the next block will ramp
    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.current != self.target
    }

    /// Gain for frame `i` of a block of `len` frames
    #[inline]
    fn gain_at(&self, i: usize, len: usize) -> f32 {
        if i + 1 >= len {
            self.target
        } else {
            let t = (i + 1) as f32 / len as f32;
            self.current + (self.target - self.current) * t
        }
    }

    /// Apply the gain to a buffer in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let len = buffer.len();
        if !self.is_ramping() {
            if self.current == 1.0 {
                return;
            }
            if self.current == 0.0 {
                buffer.fill_silence();
                return;
            }
            buffer.scale(self.current);
            return;
        }

        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample *= self.gain_at(i, len);
        }
        self.current = self.target;
    }

    /// Sum `src` scaled by this stage into `dst` without touching `src`
    ///
    /// Used for bus sends, where one source feeds several destinations with
    /// independent gains.
    pub fn mix_into(&mut self, src: &StereoBuffer, dst: &mut StereoBuffer) {
        let len = src.len().min(dst.len());
        if !self.is_ramping() {
            if self.current != 0.0 {
                dst.mix_from(src, self.current);
            }
            return;
        }

        let src = src.as_slice();
        let out = dst.as_mut_slice();
        for i in 0..len {
            let gain = self.gain_at(i, len);
            out[i] += src[i] * gain;
        }
        self.current = self.target;
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::unity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_lands_exactly_on_target() {
        let mut stage = GainStage::unity();
        stage.set_target(0.0);

        let mut buf = StereoBuffer::from_mono(&[1.0; 128]);
        stage.process(&mut buf);

        assert_eq!(buf[127].left, 0.0);
        assert!(buf[0].left > 0.99);
        assert!(!stage.is_ramping());

        // Next block is fully silent
        let mut buf = StereoBuffer::from_mono(&[1.0; 128]);
        stage.process(&mut buf);
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn test_ramp_is_monotonic() {
        let mut stage = GainStage::new(0.0);
        stage.set_target(1.0);

        let mut buf = StereoBuffer::from_mono(&[1.0; 64]);
        stage.process(&mut buf);

        for i in 1..64 {
            assert!(buf[i].left >= buf[i - 1].left);
        }
        assert_eq!(buf[63].left, 1.0);
    }

    #[test]
    fn test_unity_is_passthrough() {
        let mut stage = GainStage::unity();
        let mut buf = StereoBuffer::from_mono(&[0.3, -0.7]);
        stage.process(&mut buf);
        assert_eq!(buf[0].left, 0.3);
        assert_eq!(buf[1].right, -0.7);
    }

    #[test]
    fn test_mix_into_leaves_source_untouched() {
        let mut stage = GainStage::new(0.5);
        let src = StereoBuffer::from_mono(&[1.0; 4]);
        let mut dst = StereoBuffer::from_mono(&[1.0; 4]);
        stage.mix_into(&src, &mut dst);
        assert_eq!(dst[0].left, 1.5);
        assert_eq!(src[0].left, 1.0);
    }

    #[test]
    fn test_non_finite_target_is_silenced() {
        let mut stage = GainStage::unity();
        stage.jump_to(f32::NAN);
        assert_eq!(stage.current(), 0.0);
    }
}

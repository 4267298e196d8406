//! Hard clipper - absolute ceiling on the program path
//!
//! The transfer curve is `clamp(x, -ceiling, +ceiling)` and is rebuilt when
//! the ceiling changes. Anything at or below the ceiling passes bit-exact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::{db_to_linear, StereoBuffer};

/// Clamp transfer curve for one ceiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipCurve {
    ceiling: f32,
}

impl ClipCurve {
    /// Curve for a ceiling in dBFS; 0 dBFS maps to exactly 1.0
    pub fn from_threshold_db(db: f32) -> Self {
        let ceiling = if db >= 0.0 { 1.0 } else { db_to_linear(db) };
        Self { ceiling }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Map one sample through the curve; NaN becomes silence
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        if x.is_nan() {
            0.0
        } else {
            x.clamp(-self.ceiling, self.ceiling)
        }
    }
}

pub struct HardClipper {
    curve: ClipCurve,
    /// Set by the audio thread when anything clipped; cleared by the reader
    clip_active: Arc<AtomicBool>,
}

impl HardClipper {
    pub fn new(threshold_db: f32) -> Self {
        Self {
            curve: ClipCurve::from_threshold_db(threshold_db),
            clip_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Rebuild the curve for a new ceiling
    pub fn set_threshold_db(&mut self, db: f32) {
        self.curve = ClipCurve::from_threshold_db(db);
    }

    pub fn curve(&self) -> &ClipCurve {
        &self.curve
    }

    /// Get the clip indicator atomic (shared with the control thread)
    pub fn clip_indicator(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.clip_active)
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let ceiling = self.curve.ceiling;
        let mut clipped = false;
        for sample in buffer.iter_mut() {
            clipped |= !(sample.left.abs() <= ceiling && sample.right.abs() <= ceiling);
            sample.left = self.curve.apply(sample.left);
            sample.right = self.curve.apply(sample.right);
        }
        if clipped {
            self.clip_active.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_bounds_for_every_ceiling() {
        for db in [0.0, -3.0, -6.0, -12.0] {
            let curve = ClipCurve::from_threshold_db(db);
            let ceiling = curve.ceiling();
            for i in -400..=400 {
                let x = i as f32 / 100.0;
                let y = curve.apply(x);
                assert!(y.abs() <= ceiling);
                if x.abs() <= ceiling {
                    assert_eq!(y, x);
                }
            }
        }
    }

    #[test]
    fn test_zero_db_is_unity() {
        assert_eq!(ClipCurve::from_threshold_db(0.0).ceiling(), 1.0);
        let c = ClipCurve::from_threshold_db(-6.0).ceiling();
        assert!((c - 0.501_187).abs() < 1e-5);
    }

    #[test]
    fn test_clipper_flags_and_handles_nan() {
        let mut clipper = HardClipper::new(-6.0);
        let indicator = clipper.clip_indicator();

        let mut quiet = StereoBuffer::from_mono(&[0.1; 16]);
        clipper.process(&mut quiet);
        assert!(!indicator.load(Ordering::Relaxed));

        let mut hot = StereoBuffer::from_mono(&[0.9, f32::NAN, -2.0]);
        clipper.process(&mut hot);
        assert!(indicator.load(Ordering::Relaxed));
        assert!((hot[0].left - clipper.curve().ceiling()).abs() < 1e-7);
        assert_eq!(hot[1].left, 0.0);
        assert!((hot[2].right + clipper.curve().ceiling()).abs() < 1e-7);
    }

    #[test]
    fn test_ceiling_change_rebuilds_curve() {
        let mut clipper = HardClipper::new(0.0);
        clipper.set_threshold_db(-12.0);
        let mut buf = StereoBuffer::from_mono(&[0.5]);
        clipper.process(&mut buf);
        assert!(buf[0].left <= db_to_linear(-12.0));
    }
}

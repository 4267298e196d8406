//! Output limiter - first half of the broadcast safety stage
//!
//! Placed before the hard clipper on the program path:
//!   broadcast bus → **limiter** → clipper → program out
//!
//! A compressor-style limiter with a fixed 20:1 ratio, zero attack and a
//! 50 ms release. Detection is on the stereo peak; both channels share one
//! gain so the image never shifts. Because there is no lookahead, the first
//! sample of a transient can still overshoot; the clipper behind it catches
//! that.

use crate::types::{db_to_linear, linear_to_db, StereoBuffer};

/// Compression ratio above the ceiling
const RATIO: f32 = 20.0;

/// Release time-constant in seconds
const RELEASE_SECS: f32 = 0.05;

pub struct OutputLimiter {
    threshold_db: f32,
    /// Current gain reduction in dB (>= 0)
    reduction_db: f32,
    release_coeff: f32,
}

impl OutputLimiter {
    pub fn new(sample_rate: u32, threshold_db: f32) -> Self {
        Self {
            threshold_db,
            reduction_db: 0.0,
            release_coeff: (-1.0 / (RELEASE_SECS * sample_rate as f32)).exp(),
        }
    }

    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold_db = db;
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Gain reduction currently applied, in dB
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    #[inline]
    fn target_reduction(&self, peak: f32) -> f32 {
        let over = linear_to_db(peak) - self.threshold_db;
        if over > 0.0 {
            over * (1.0 - 1.0 / RATIO)
        } else {
            0.0
        }
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let target = self.target_reduction(sample.peak());
            if target > self.reduction_db {
                // Zero attack
                self.reduction_db = target;
            } else {
                self.reduction_db = target + (self.reduction_db - target) * self.release_coeff;
            }
            if self.reduction_db > 1e-6 {
                *sample *= db_to_linear(-self.reduction_db);
            }
        }
    }

    pub fn reset(&mut self) {
        self.reduction_db = 0.0;
    }
}

//! Delay - feedback echo
//!
//! Output is the dry signal plus the delayed signal scaled by the wet mix.
//! Delay time changes glide (fractional read with linear interpolation), so
//! moving the timing knob bends pitch briefly instead of clicking.

use crate::effect::{DelayParams, DelaySettings, Effect, EffectKind, EffectSettings};
use crate::types::StereoBuffer;

/// Longest delay the mapping can produce
const MAX_DELAY_SECONDS: f32 = 1.0;

/// Per-sample glide coefficient for delay time (~20 ms at 48 kHz)
const TIME_GLIDE: f32 = 0.001;

/// Stereo delay line with fractional read
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer_l: vec![0.0; len],
            buffer_r: vec![0.0; len],
            write_pos: 0,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.buffer_l.len()
    }

    /// Read `delay` samples behind the write head
    #[inline]
    fn read(&self, delay: f32) -> (f32, f32) {
        let len = self.len();
        let delay = delay.clamp(1.0, (len - 2) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let i0 = (self.write_pos + len - whole) % len;
        let i1 = (i0 + len - 1) % len;
        let l = self.buffer_l[i0] + (self.buffer_l[i1] - self.buffer_l[i0]) * frac;
        let r = self.buffer_r[i0] + (self.buffer_r[i1] - self.buffer_r[i0]) * frac;
        (l, r)
    }

    #[inline]
    fn write(&mut self, left: f32, right: f32) {
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;
        self.write_pos = (self.write_pos + 1) % self.len();
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

pub struct DelayEffect {
    sample_rate: f32,
    line: DelayLine,
    /// Delay time in samples, gliding towards `target_delay`
    delay: f32,
    target_delay: f32,
    feedback: f32,
    target_feedback: f32,
    wet: f32,
    target_wet: f32,
}

impl DelayEffect {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let capacity = (sr * MAX_DELAY_SECONDS) as usize + 4;
        let settings = DelayParams::default().settings();
        let delay = settings.time_secs * sr;
        Self {
            sample_rate: sr,
            line: DelayLine::new(capacity),
            delay,
            target_delay: delay,
            feedback: settings.feedback,
            target_feedback: settings.feedback,
            wet: settings.wet,
            target_wet: settings.wet,
        }
    }

    fn set(&mut self, settings: &DelaySettings) {
        let time = settings.time_secs.clamp(0.0, MAX_DELAY_SECONDS);
        self.target_delay = time * self.sample_rate;
        self.target_feedback = settings.feedback.clamp(0.0, 0.9);
        self.target_wet = settings.wet.clamp(0.0, 1.0);
    }

    /// Current delay time in seconds
    pub fn delay_secs(&self) -> f32 {
        self.delay / self.sample_rate
    }
}

impl Effect for DelayEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Delay
    }

    fn process(&mut self, buffer: &mut StereoBuffer) {
        let len = buffer.len().max(1) as f32;
        let (fb_from, wet_from) = (self.feedback, self.wet);

        for (i, sample) in buffer.iter_mut().enumerate() {
            let t = (i + 1) as f32 / len;
            let feedback = fb_from + (self.target_feedback - fb_from) * t;
            let wet = wet_from + (self.target_wet - wet_from) * t;
            self.delay += (self.target_delay - self.delay) * TIME_GLIDE;

            let (dl, dr) = self.line.read(self.delay);
            self.line.write(sample.left + dl * feedback, sample.right + dr * feedback);

            sample.left += dl * wet;
            sample.right += dr * wet;
        }

        self.feedback = self.target_feedback;
        self.wet = self.target_wet;
    }

    fn apply(&mut self, settings: &EffectSettings) {
        if let EffectSettings::Delay(s) = settings {
            self.set(s);
        }
    }

    fn reset(&mut self) {
        self.line.reset();
        self.delay = self.target_delay;
    }
}

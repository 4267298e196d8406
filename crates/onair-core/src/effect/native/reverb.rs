//! Reverb - partitioned FFT convolution
//!
//! Uniformly partitioned overlap-save. Every `PARTITION_SIZE` input samples
//! the newest `2 * PARTITION_SIZE` samples are transformed into the
//! frequency-domain delay line (FDL), multiplied against every impulse
//! partition and summed, and the inverse transform yields the next block of
//! wet output. The wet path therefore lags the dry path by one partition.
//!
//! All buffers are sized for the longest impulse at construction. Swapping
//! the impulse crossfades old and new over one partition; the old response is
//! then dropped through the GC handle it was allocated with.

use std::sync::Arc;

use basedrop::Owned;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::impulse::{max_partitions, ReverbImpulse, PARTITION_BINS, PARTITION_SIZE};
use crate::effect::{Effect, EffectKind, EffectSettings, ReverbParams, ReverbSettings};
use crate::types::StereoBuffer;

const FFT_LEN: usize = PARTITION_SIZE * 2;

/// Per-channel convolution state
struct Convolver {
    /// Last `FFT_LEN` input samples; the newest partition fills the upper half
    history: Vec<f32>,
    /// Input spectra, ring of `max_partitions` slots
    fdl: Vec<Complex<f32>>,
    /// Wet output being read out during the current partition
    out_block: Vec<f32>,
}

impl Convolver {
    fn new(slots: usize) -> Self {
        Self {
            history: vec![0.0; FFT_LEN],
            fdl: vec![Complex::new(0.0, 0.0); slots * PARTITION_BINS],
            out_block: vec![0.0; PARTITION_SIZE],
        }
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
        self.fdl.fill(Complex::new(0.0, 0.0));
        self.out_block.fill(0.0);
    }
}

pub struct ReverbEffect {
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    channels: [Convolver; 2],
    slots: usize,
    /// Slot the next input spectrum is written to
    fdl_pos: usize,
    /// Samples collected into the current partition
    fill: usize,

    impulse: Option<Owned<ReverbImpulse>>,
    /// Response being faded out; `Some` only until the next partition
    previous: Option<Owned<ReverbImpulse>>,
    fading: bool,

    wet: f32,
    target_wet: f32,

    // Scratch
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    acc_old: Vec<Complex<f32>>,
    time_new: Vec<f32>,
    time_old: Vec<f32>,
    fwd_scratch: Vec<Complex<f32>>,
    inv_scratch: Vec<Complex<f32>>,
}

impl ReverbEffect {
    pub fn new(sample_rate: u32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(FFT_LEN);
        let inverse = planner.plan_fft_inverse(FFT_LEN);
        let slots = max_partitions(sample_rate);
        let wet = ReverbParams::default().settings().wet;

        Self {
            frame: forward.make_input_vec(),
            spectrum: forward.make_output_vec(),
            acc: inverse.make_input_vec(),
            acc_old: inverse.make_input_vec(),
            time_new: inverse.make_output_vec(),
            time_old: inverse.make_output_vec(),
            fwd_scratch: forward.make_scratch_vec(),
            inv_scratch: inverse.make_scratch_vec(),
            forward,
            inverse,
            channels: [Convolver::new(slots), Convolver::new(slots)],
            slots,
            fdl_pos: 0,
            fill: 0,
            impulse: None,
            previous: None,
            fading: false,
            wet,
            target_wet: wet,
        }
    }

    /// Install a new impulse response
    ///
    /// The switch crossfades over the next partition. If a previous swap is
    /// still fading, the intermediate response is discarded.
    pub fn set_impulse(&mut self, impulse: Owned<ReverbImpulse>) {
        if !self.fading {
            self.previous = self.impulse.take();
        }
        self.impulse = Some(impulse);
        self.fading = true;
    }

    pub fn impulse(&self) -> Option<&ReverbImpulse> {
        self.impulse.as_deref()
    }

    fn set(&mut self, settings: &ReverbSettings) {
        self.target_wet = settings.wet.clamp(0.0, 1.0);
    }

    /// Sum `X[pos - k] * H[k]` over all partitions of `impulse`
    fn accumulate(
        acc: &mut [Complex<f32>],
        conv: &Convolver,
        impulse: Option<&ReverbImpulse>,
        ch: usize,
        pos: usize,
        slots: usize,
    ) {
        acc.fill(Complex::new(0.0, 0.0));
        let Some(impulse) = impulse else {
            return;
        };
        let count = impulse.num_partitions().min(slots);
        for k in 0..count {
            let slot = (pos + slots - k) % slots;
            let x = &conv.fdl[slot * PARTITION_BINS..(slot + 1) * PARTITION_BINS];
            let h = impulse.partition(ch, k);
            for ((a, x), h) in acc.iter_mut().zip(x).zip(h) {
                *a += x * h;
            }
        }
        // DC and Nyquist must be purely real for the inverse transform
        acc[0].im = 0.0;
        acc[PARTITION_SIZE].im = 0.0;
    }

    /// Run one partition through the convolution
    fn process_partition(&mut self) {
        let pos = self.fdl_pos;
        for ch in 0..2 {
            let conv = &mut self.channels[ch];

            self.frame.copy_from_slice(&conv.history);
            if self
                .forward
                .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.fwd_scratch)
                .is_err()
            {
                self.spectrum.fill(Complex::new(0.0, 0.0));
            }
            conv.fdl[pos * PARTITION_BINS..(pos + 1) * PARTITION_BINS]
                .copy_from_slice(&self.spectrum);
            conv.history.copy_within(PARTITION_SIZE.., 0);

            let conv = &self.channels[ch];
            Self::accumulate(&mut self.acc, conv, self.impulse.as_deref(), ch, pos, self.slots);
            if self
                .inverse
                .process_with_scratch(&mut self.acc, &mut self.time_new, &mut self.inv_scratch)
                .is_err()
            {
                self.time_new.fill(0.0);
            }

            if self.fading {
                Self::accumulate(
                    &mut self.acc_old,
                    conv,
                    self.previous.as_deref(),
                    ch,
                    pos,
                    self.slots,
                );
                if self
                    .inverse
                    .process_with_scratch(&mut self.acc_old, &mut self.time_old, &mut self.inv_scratch)
                    .is_err()
                {
                    self.time_old.fill(0.0);
                }
            }

            let out = &mut self.channels[ch].out_block;
            let new = &self.time_new[PARTITION_SIZE..];
            if self.fading {
                let old = &self.time_old[PARTITION_SIZE..];
                for (i, o) in out.iter_mut().enumerate() {
                    let t = (i + 1) as f32 / PARTITION_SIZE as f32;
                    *o = old[i] + (new[i] - old[i]) * t;
                }
            } else {
                out.copy_from_slice(new);
            }
        }

        if self.fading {
            self.fading = false;
            self.previous = None;
        }
        self.fdl_pos = (pos + 1) % self.slots;
    }
}

impl Effect for ReverbEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Reverb
    }

    fn process(&mut self, buffer: &mut StereoBuffer) {
        let len = buffer.len().max(1) as f32;
        let wet_from = self.wet;

        for (i, sample) in buffer.iter_mut().enumerate() {
            let wet = wet_from + (self.target_wet - wet_from) * ((i + 1) as f32 / len);
            let slot = PARTITION_SIZE + self.fill;
            let [left, right] = &mut self.channels;
            left.history[slot] = sample.left;
            right.history[slot] = sample.right;
            let wet_l = left.out_block[self.fill];
            let wet_r = right.out_block[self.fill];

            sample.left += wet_l * wet;
            sample.right += wet_r * wet;

            self.fill += 1;
            if self.fill == PARTITION_SIZE {
                self.fill = 0;
                self.process_partition();
            }
        }
        self.wet = self.target_wet;
    }

    fn apply(&mut self, settings: &EffectSettings) {
        if let EffectSettings::Reverb(s) = settings {
            self.set(s);
        }
    }

    fn latency_samples(&self) -> u32 {
        PARTITION_SIZE as u32
    }

    fn reset(&mut self) {
        for conv in self.channels.iter_mut() {
            conv.reset();
        }
        self.fdl_pos = 0;
        self.fill = 0;
        self.fading = false;
        self.previous = None;
        self.wet = self.target_wet;
    }
}

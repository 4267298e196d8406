//! Reverb impulse responses
//!
//! Synthesis and FFT partitioning both happen on the control thread. The
//! audio thread only ever receives a finished [`ReverbImpulse`].
//!
//! The response is stereo noise shaped by `(1 - t/T)^decay`, run through a
//! gentle one-pole low-pass so the tail darkens like a real room, then
//! normalised to unit energy.

use rand::Rng;
use realfft::num_complex::Complex;
use realfft::RealFftPlanner;

use crate::effect::ImpulseShape;

/// Convolution partition length in samples (also the wet-path latency)
pub const PARTITION_SIZE: usize = 256;

/// Longest impulse response the convolver allocates for
pub const MAX_IMPULSE_SECONDS: f32 = 5.0;

/// Frequency bins per partition spectrum
pub const PARTITION_BINS: usize = PARTITION_SIZE + 1;

/// One-pole low-pass coefficient applied to the noise
const DAMPING: f32 = 0.35;

/// Maximum partitions at a given sample rate
pub fn max_partitions(sample_rate: u32) -> usize {
    let samples = (MAX_IMPULSE_SECONDS * sample_rate as f32).ceil() as usize;
    samples.div_ceil(PARTITION_SIZE)
}

/// Synthesise a stereo impulse response for `shape`
pub fn synthesize_impulse<R: Rng>(
    shape: &ImpulseShape,
    sample_rate: u32,
    rng: &mut R,
) -> [Vec<f32>; 2] {
    let duration = shape.duration_secs.clamp(0.0, MAX_IMPULSE_SECONDS);
    let len = ((duration * sample_rate as f32) as usize).max(1);
    let decay = shape.decay.max(0.0);

    let mut channels = [vec![0.0f32; len], vec![0.0f32; len]];
    for channel in channels.iter_mut() {
        let mut lp = 0.0f32;
        for (i, s) in channel.iter_mut().enumerate() {
            let envelope = (1.0 - i as f32 / len as f32).powf(decay);
            let noise: f32 = rng.gen_range(-1.0..1.0);
            lp += (noise - lp) * (1.0 - DAMPING);
            *s = lp * envelope;
        }
    }

    let energy: f32 = channels.iter().flatten().map(|s| s * s).sum();
    if energy > 0.0 {
        let scale = (2.0 / energy).sqrt();
        for s in channels.iter_mut().flatten() {
            *s *= scale;
        }
    }
    channels
}

/// A stereo impulse response split into FFT partitions
///
/// Each partition is `PARTITION_SIZE` samples, zero-padded to twice that
/// and transformed. Spectra are pre-scaled by `1 / (2 * PARTITION_SIZE)` so
/// the unnormalised inverse transform needs no further scaling.
pub struct ReverbImpulse {
    num_partitions: usize,
    /// `num_partitions * PARTITION_BINS` bins per channel, partition-major
    spectra: [Vec<Complex<f32>>; 2],
    shape: Option<ImpulseShape>,
}

impl ReverbImpulse {
    /// Partition a time-domain response
    pub fn from_samples(channels: &[Vec<f32>; 2]) -> Self {
        let len = channels[0].len().max(channels[1].len()).max(1);
        let num_partitions = len.div_ceil(PARTITION_SIZE);
        let fft_len = PARTITION_SIZE * 2;
        let norm = 1.0 / fft_len as f32;

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_len);
        let mut frame = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();
        let mut scratch = fft.make_scratch_vec();

        let mut spectra = [
            Vec::with_capacity(num_partitions * PARTITION_BINS),
            Vec::with_capacity(num_partitions * PARTITION_BINS),
        ];

        for (ch, samples) in channels.iter().enumerate() {
            for p in 0..num_partitions {
                frame.fill(0.0);
                let start = p * PARTITION_SIZE;
                let end = (start + PARTITION_SIZE).min(samples.len());
                if start < end {
                    frame[..end - start].copy_from_slice(&samples[start..end]);
                }
                if fft.process_with_scratch(&mut frame, &mut spectrum, &mut scratch).is_err() {
                    spectrum.fill(Complex::new(0.0, 0.0));
                }
                spectra[ch].extend(
                    spectrum
                        .iter()
                        .map(|c| Complex::new(c.re * norm, c.im * norm)),
                );
            }
        }

        Self {
            num_partitions,
            spectra,
            shape: None,
        }
    }

    /// Synthesise and partition a response for `shape`
    pub fn synthesize(shape: &ImpulseShape, sample_rate: u32) -> Self {
        let channels = synthesize_impulse(shape, sample_rate, &mut rand::thread_rng());
        let mut impulse = Self::from_samples(&channels);
        impulse.shape = Some(*shape);
        impulse
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Shape this response was synthesised from, if any
    pub fn shape(&self) -> Option<&ImpulseShape> {
        self.shape.as_ref()
    }

    /// Spectrum of partition `p` for channel `ch`
    #[inline]
    pub fn partition(&self, ch: usize, p: usize) -> &[Complex<f32>] {
        let start = p * PARTITION_BINS;
        &self.spectra[ch][start..start + PARTITION_BINS]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_impulse_length_follows_duration() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = ImpulseShape {
            duration_secs: 0.5,
            decay: 2.0,
        };
        let ir = synthesize_impulse(&shape, 48000, &mut rng);
        assert_eq!(ir[0].len(), 24000);
        assert_eq!(ir[1].len(), 24000);
    }

    #[test]
    fn test_impulse_decays_and_is_normalised() {
        let mut rng = StdRng::seed_from_u64(11);
        let shape = ImpulseShape {
            duration_secs: 1.0,
            decay: 3.0,
        };
        let ir = synthesize_impulse(&shape, 48000, &mut rng);

        let energy = |s: &[f32]| s.iter().map(|x| x * x).sum::<f32>();
        let head = energy(&ir[0][..4800]);
        let tail = energy(&ir[0][43200..]);
        assert!(head > tail * 100.0);

        let total: f32 = ir.iter().map(|c| energy(&c[..])).sum();
        assert!((total - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_channels_are_decorrelated() {
        let mut rng = StdRng::seed_from_u64(3);
        let shape = ImpulseShape {
            duration_secs: 0.2,
            decay: 1.0,
        };
        let ir = synthesize_impulse(&shape, 48000, &mut rng);
        assert_ne!(ir[0], ir[1]);
    }

    #[test]
    fn test_partition_count() {
        let samples = [vec![0.0; 1000], vec![0.0; 1000]];
        let impulse = ReverbImpulse::from_samples(&samples);
        assert_eq!(impulse.num_partitions(), 4);
        assert_eq!(impulse.partition(1, 3).len(), PARTITION_BINS);
        assert_eq!(max_partitions(48000), 938);
    }
}

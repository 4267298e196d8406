//! Encode session state, owned by the encoder thread
//!
//! Turns mono float batches into encoder frames, counts what went in and
//! what came out, and assembles the finished asset.

use super::encoder::{f32_to_i16, AudioEncoder, EncodeResult, EncoderSpec, FRAME_SIZE};

/// A finished recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAsset {
    /// Complete encoded file
    pub bytes: Vec<u8>,
    /// `total_samples / sample_rate`
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate_kbps: u32,
    /// Mono frames encoded
    pub total_samples: u64,
}

/// What happened to one batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Accepted,
    /// Accepted and a progress interval was crossed
    Progress { bytes: u64, seconds: f64 },
    /// Encoding failed on this batch; later batches are dropped
    Failed(String),
    /// The session already failed
    Dropped,
}

pub struct EncodeSession {
    encoder: Box<dyn AudioEncoder>,
    spec: EncoderSpec,
    /// Interleaved frame being filled
    frame: Vec<i16>,
    bytes: u64,
    /// Mono samples taken in, including the frame being filled
    received: u64,
    /// Mono samples the encoder accepted
    total_samples: u64,
    progress_every: u64,
    next_progress: u64,
    failed: bool,
}

impl EncodeSession {
    /// Wrap an initialized encoder
    ///
    /// `progress_interval_secs` is converted to samples at the encoder rate.
    pub fn new(encoder: Box<dyn AudioEncoder>, progress_interval_secs: f64) -> Self {
        let spec = *encoder.spec();
        let progress_every =
            ((progress_interval_secs.max(0.1)) * spec.sample_rate as f64).round() as u64;
        Self {
            encoder,
            spec,
            frame: Vec::with_capacity(FRAME_SIZE * spec.channels as usize),
            bytes: 0,
            received: 0,
            total_samples: 0,
            progress_every: progress_every.max(1),
            next_progress: progress_every.max(1),
            failed: false,
        }
    }

    pub fn spec(&self) -> &EncoderSpec {
        &self.spec
    }

    /// Encoded bytes so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Samples that made it into the encoder
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Captured time so far, counted on input
    pub fn seconds(&self) -> f64 {
        self.received as f64 / self.spec.sample_rate as f64
    }

    /// Feed one batch of mono samples
    pub fn push_batch(&mut self, batch: &[f32]) -> BatchOutcome {
        if self.failed {
            return BatchOutcome::Dropped;
        }

        let channels = self.spec.channels as usize;
        for &sample in batch {
            let s = f32_to_i16(sample);
            for _ in 0..channels {
                self.frame.push(s);
            }
            self.received += 1;

            if self.frame.len() >= FRAME_SIZE * channels {
                if let Err(e) = self.flush_frame() {
                    self.failed = true;
                    return BatchOutcome::Failed(e.to_string());
                }
            }
        }

        if self.received >= self.next_progress {
            while self.next_progress <= self.received {
                self.next_progress += self.progress_every;
            }
            BatchOutcome::Progress {
                bytes: self.bytes,
                seconds: self.seconds(),
            }
        } else {
            BatchOutcome::Accepted
        }
    }

    fn flush_frame(&mut self) -> EncodeResult<()> {
        if self.frame.is_empty() {
            return Ok(());
        }
        let samples = (self.frame.len() / self.spec.channels as usize) as u64;
        let produced = self.encoder.encode_frame(&self.frame);
        self.frame.clear();
        self.bytes += produced? as u64;
        self.total_samples += samples;
        Ok(())
    }

    /// Emit the final partial frame and assemble the asset
    ///
    /// A session that failed mid-stream still finalizes with whatever was
    /// encoded before the failure.
    pub fn finish(mut self) -> EncodeResult<RecordedAsset> {
        if !self.failed {
            if let Err(e) = self.flush_frame() {
                log::warn!("Dropping final frame: {}", e);
            }
        } else {
            self.frame.clear();
        }

        let spec = self.spec;
        let total_samples = self.total_samples;
        let bytes = self.encoder.finish()?;
        Ok(RecordedAsset {
            bytes,
            duration_seconds: total_samples as f64 / spec.sample_rate as f64,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bit_rate_kbps: spec.bit_rate_kbps,
            total_samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::encoder::{EncodeError, WavEncoder};
    use std::io::Cursor;

    fn wav_session(channels: u16, progress_secs: f64) -> EncodeSession {
        let spec = EncoderSpec {
            sample_rate: 8000,
            channels,
            bit_rate_kbps: 128,
        };
        EncodeSession::new(
            Box::new(WavEncoder::new(&spec).expect("encoder")),
            progress_secs,
        )
    }

    /// Fails on the Nth frame
    struct FlakyEncoder {
        spec: EncoderSpec,
        frames: usize,
        fail_at: usize,
    }

    impl AudioEncoder for FlakyEncoder {
        fn spec(&self) -> &EncoderSpec {
            &self.spec
        }

        fn encode_frame(&mut self, pcm: &[i16]) -> EncodeResult<usize> {
            self.frames += 1;
            if self.frames == self.fail_at {
                return Err(EncodeError::Write("disk on fire".to_string()));
            }
            Ok(pcm.len())
        }

        fn finish(self: Box<Self>) -> EncodeResult<Vec<u8>> {
            Ok(vec![0; self.frames])
        }
    }

    #[test]
    fn test_mono_is_duplicated_for_stereo_encoder() {
        let mut session = wav_session(2, 5.0);
        assert_eq!(session.push_batch(&[0.5; 100]), BatchOutcome::Accepted);
        let asset = session.finish().expect("finish");
        assert_eq!(asset.total_samples, 100);

        let mut reader = hound::WavReader::new(Cursor::new(asset.bytes)).expect("reader");
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 100);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.expect("sample")).collect();
        assert!(samples.iter().all(|&s| s == 16383));
    }

    #[test]
    fn test_progress_is_coarse() {
        let mut session = wav_session(1, 1.0);
        let batch = vec![0.1; 4000];
        assert_eq!(session.push_batch(&batch), BatchOutcome::Accepted);
        match session.push_batch(&batch) {
            BatchOutcome::Progress { seconds, bytes } => {
                assert!((seconds - 1.0).abs() < 1e-9);
                // Six full mono frames so far
                assert_eq!(bytes, (6 * FRAME_SIZE * 2) as u64);
            }
            other => panic!("expected progress, got {:?}", other),
        }
        assert_eq!(session.push_batch(&batch), BatchOutcome::Accepted);
    }

    #[test]
    fn test_duration_counts_partial_frame() {
        let mut session = wav_session(1, 5.0);
        session.push_batch(&vec![0.0; FRAME_SIZE + 10]);
        let asset = session.finish().expect("finish");
        assert_eq!(asset.total_samples, FRAME_SIZE as u64 + 10);
        assert!((asset.duration_seconds - (FRAME_SIZE + 10) as f64 / 8000.0).abs() < 1e-12);
        let reader = hound::WavReader::new(Cursor::new(asset.bytes)).expect("reader");
        assert_eq!(reader.duration(), FRAME_SIZE as u32 + 10);
    }

    #[test]
    fn test_mid_stream_error_drops_later_batches() {
        let spec = EncoderSpec {
            sample_rate: 8000,
            channels: 1,
            bit_rate_kbps: 64,
        };
        let encoder = FlakyEncoder {
            spec,
            frames: 0,
            fail_at: 2,
        };
        let mut session = EncodeSession::new(Box::new(encoder), 5.0);
        assert!(matches!(
            session.push_batch(&vec![0.0; FRAME_SIZE * 3]),
            BatchOutcome::Failed(_)
        ));
        assert_eq!(session.push_batch(&[0.0; 10]), BatchOutcome::Dropped);
        assert!(session.is_failed());
        assert_eq!(session.bytes(), FRAME_SIZE as u64);

        assert_eq!(session.total_samples(), FRAME_SIZE as u64);

        // Still finalizable with what made it through; the failed frame is
        // not part of the duration
        let asset = session.finish().expect("finish");
        assert_eq!(asset.bytes.len(), 2);
        assert_eq!(asset.total_samples, FRAME_SIZE as u64);
        assert!((asset.duration_seconds - FRAME_SIZE as f64 / 8000.0).abs() < 1e-12);
    }
}

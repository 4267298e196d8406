//! Encoder abstraction and the built-in RIFF/WAVE encoder
//!
//! The pipeline only talks to [`AudioEncoder`]: 16-bit frames in, byte
//! counts out, one container at the end. Other codecs plug in through an
//! [`EncoderFactory`].

use std::io::{Cursor, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

/// Frames per encoder call (the final frame may be shorter)
pub const FRAME_SIZE: usize = 1152;

/// Target format of an encode session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSpec {
    pub sample_rate: u32,
    /// Channels the encoder wants; mono input is duplicated when this is 2
    pub channels: u16,
    pub bit_rate_kbps: u32,
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Encoder initialization failed: {0}")]
    Init(String),

    #[error("Encoder write failed: {0}")]
    Write(String),

    #[error("Encoder finalize failed: {0}")]
    Finalize(String),
}

pub type EncodeResult<T> = Result<T, EncodeError>;

/// A streaming encoder fed with interleaved 16-bit frames
pub trait AudioEncoder: Send {
    /// Effective output format
    fn spec(&self) -> &EncoderSpec;

    /// Encode one frame of interleaved samples, returning the bytes produced
    fn encode_frame(&mut self, pcm: &[i16]) -> EncodeResult<usize>;

    /// Flush and return the complete asset
    fn finish(self: Box<Self>) -> EncodeResult<Vec<u8>>;
}

/// Creates an encoder for a session
pub type EncoderFactory =
    Arc<dyn Fn(&EncoderSpec) -> EncodeResult<Box<dyn AudioEncoder>> + Send + Sync>;

/// Factory for the built-in WAV encoder
pub fn wav_encoder_factory() -> EncoderFactory {
    Arc::new(|spec: &EncoderSpec| {
        let encoder = WavEncoder::new(spec)?;
        Ok(Box::new(encoder) as Box<dyn AudioEncoder>)
    })
}

/// Convert a float sample to 16-bit
///
/// Clamped to [-1, 1]; negative values scale by 2^15 and positive values by
/// 2^15 - 1, so both extremes map exactly. NaN becomes 0.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// In-memory seekable sink that can be reclaimed after the writer is gone
#[derive(Clone, Default)]
struct SharedCursor(Arc<Mutex<Cursor<Vec<u8>>>>);

impl SharedCursor {
    fn lock(&self) -> std::io::Result<std::sync::MutexGuard<'_, Cursor<Vec<u8>>>> {
        self.0
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "sink poisoned"))
    }

    fn into_bytes(self) -> Option<Vec<u8>> {
        Arc::try_unwrap(self.0)
            .ok()
            .and_then(|m| m.into_inner().ok())
            .map(Cursor::into_inner)
    }
}

impl Write for SharedCursor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedCursor {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.lock()?.seek(pos)
    }
}

/// 16-bit PCM RIFF/WAVE encoder writing to memory
pub struct WavEncoder {
    spec: EncoderSpec,
    sink: SharedCursor,
    writer: WavWriter<SharedCursor>,
}

impl WavEncoder {
    pub fn new(spec: &EncoderSpec) -> EncodeResult<Self> {
        if spec.sample_rate == 0 || !(1..=2).contains(&spec.channels) {
            return Err(EncodeError::Init(format!(
                "unsupported format: {} Hz, {} channels",
                spec.sample_rate, spec.channels
            )));
        }
        let wav_spec = WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let sink = SharedCursor::default();
        let writer = WavWriter::new(sink.clone(), wav_spec)
            .map_err(|e| EncodeError::Init(e.to_string()))?;

        // PCM bit rate is fixed by the format
        let spec = EncoderSpec {
            bit_rate_kbps: spec.sample_rate * spec.channels as u32 * 16 / 1000,
            ..*spec
        };
        Ok(Self { spec, sink, writer })
    }
}

impl AudioEncoder for WavEncoder {
    fn spec(&self) -> &EncoderSpec {
        &self.spec
    }

    fn encode_frame(&mut self, pcm: &[i16]) -> EncodeResult<usize> {
        for &s in pcm {
            self.writer
                .write_sample(s)
                .map_err(|e| EncodeError::Write(e.to_string()))?;
        }
        Ok(pcm.len() * 2)
    }

    fn finish(self: Box<Self>) -> EncodeResult<Vec<u8>> {
        let Self { sink, writer, .. } = *self;
        writer
            .finalize()
            .map_err(|e| EncodeError::Finalize(e.to_string()))?;
        sink.into_bytes()
            .ok_or_else(|| EncodeError::Finalize("output buffer still shared".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_conversion_is_asymmetric_and_clamped() {
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-3.0), i16::MIN);
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(0.5), 16383);
        assert_eq!(f32_to_i16(-0.5), -16384);
        assert_eq!(f32_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_wav_encoder_produces_readable_file() {
        let spec = EncoderSpec {
            sample_rate: 48000,
            channels: 2,
            bit_rate_kbps: 128,
        };
        let mut encoder: Box<dyn AudioEncoder> =
            Box::new(WavEncoder::new(&spec).expect("encoder"));
        assert_eq!(encoder.spec().bit_rate_kbps, 1536);

        let frame = vec![1000i16; FRAME_SIZE * 2];
        assert_eq!(encoder.encode_frame(&frame).expect("encode"), FRAME_SIZE * 4);
        let bytes = encoder.finish().expect("finish");

        let reader = hound::WavReader::new(Cursor::new(bytes)).expect("reader");
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), FRAME_SIZE as u32);
    }

    #[test]
    fn test_bad_spec_fails_init() {
        let spec = EncoderSpec {
            sample_rate: 48000,
            channels: 6,
            bit_rate_kbps: 128,
        };
        assert!(matches!(WavEncoder::new(&spec), Err(EncodeError::Init(_))));
    }
}

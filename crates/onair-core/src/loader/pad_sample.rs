//! Decode an audio file into a stereo pad buffer at the session rate

use std::fs::File;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{StereoBuffer, StereoSample};

/// Errors from loading a pad sample
#[derive(Error, Debug)]
pub enum PadLoadError {
    #[error("Failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("No decodable audio track in file")]
    NoAudioTrack,

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Pad index {0} out of range")]
    InvalidPad(usize),

    #[error("Engine command queue is full")]
    QueueFull,
}

pub type PadLoadResult<T> = Result<T, PadLoadError>;

/// A decoded, session-rate stereo sample
#[derive(Debug, Clone)]
pub struct PadSample {
    pub name: String,
    pub sample_rate: u32,
    pub frames: StereoBuffer,
}

impl PadSample {
    pub fn new(name: impl Into<String>, sample_rate: u32, frames: StereoBuffer) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            frames,
        }
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Decode `path` and resample it to `target_rate`
///
/// Mono files are duplicated to both channels; files with more than two
/// channels keep the first two.
pub fn load_pad_file(path: &Path, target_rate: u32) -> PadLoadResult<PadSample> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PadLoadError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(PadLoadError::NoAudioTrack)?;
    let track_id = track.id;
    let mut source_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PadLoadError::UnsupportedFormat(e.to_string()))?;

    let mut left = Vec::new();
    let mut right = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PadLoadError::UnsupportedFormat(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                source_rate = spec.rate;
                let channels = spec.channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);

                for frame in buf.samples().chunks_exact(channels) {
                    left.push(frame[0]);
                    right.push(if channels > 1 { frame[1] } else { frame[0] });
                }
            }
            // Corrupt packets are skipped
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet: {}", e);
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(PadLoadError::UnsupportedFormat(e.to_string())),
        }
    }

    if source_rate == 0 || left.is_empty() {
        return Err(PadLoadError::NoAudioTrack);
    }

    if source_rate != target_rate {
        let resampled = resample(vec![left, right], source_rate, target_rate)?;
        let mut channels = resampled.into_iter();
        left = channels.next().unwrap_or_default();
        right = channels.next().unwrap_or_default();
    }

    let frames = StereoBuffer::from_vec(
        left.iter()
            .zip(right.iter())
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect(),
    );

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    log::info!(
        "Loaded pad sample '{}': {} frames ({} Hz source)",
        name,
        frames.len(),
        source_rate
    );

    Ok(PadSample::new(name, target_rate, frames))
}

/// Resample whole channels in one pass
fn resample(waves: Vec<Vec<f32>>, from: u32, to: u32) -> PadLoadResult<Vec<Vec<f32>>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let len = waves[0].len();
    let mut resampler =
        SincFixedIn::<f32>::new(to as f64 / from as f64, 2.0, params, len, waves.len())
            .map_err(|e| PadLoadError::Resample(e.to_string()))?;
    resampler
        .process(&waves, None)
        .map_err(|e| PadLoadError::Resample(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for i in 0..frames {
            let v = ((i as f32 * 0.05).sin() * 16000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(v).expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn test_load_mono_at_session_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("clap.wav");
        write_wav(&path, 48000, 1, 4800);

        let sample = load_pad_file(&path, 48000).expect("load");
        assert_eq!(sample.name, "clap");
        assert_eq!(sample.len(), 4800);
        assert!((sample.duration_secs() - 0.1).abs() < 1e-9);
        // Mono duplicated to both channels
        assert_eq!(sample.frames[100].left, sample.frames[100].right);
    }

    #[test]
    fn test_load_resamples_to_session_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("horn.wav");
        write_wav(&path, 44100, 2, 44100);

        let sample = load_pad_file(&path, 48000).expect("load");
        assert_eq!(sample.sample_rate, 48000);
        let len = sample.len() as i64;
        assert!((len - 48000).abs() < 600, "resampled to {} frames", len);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_pad_file(Path::new("/nonexistent/pad.wav"), 48000).unwrap_err();
        assert!(matches!(err, PadLoadError::Io(_)));
    }

    #[test]
    fn test_garbage_file_is_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, vec![0x5au8; 2048]).expect("write");
        assert!(load_pad_file(&path, 48000).is_err());
    }
}

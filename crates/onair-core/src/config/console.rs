//! Console settings schema
//!
//! Every section is `#[serde(default)]` so a partial YAML file keeps the
//! defaults for whatever it leaves out.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::default_recordings_dir;
use crate::audio::AudioConfig;

/// Top-level console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Audio device selection
    pub audio: AudioConfig,
    /// Noise gate timing
    pub gate: GateConfig,
    /// Recording pipeline
    pub capture: CaptureConfig,
    /// Mixer startup state
    pub mixer: MixerConfig,
    /// Where finished recordings are written
    pub recordings_dir: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            gate: GateConfig::default(),
            capture: CaptureConfig::default(),
            mixer: MixerConfig::default(),
            recordings_dir: default_recordings_dir(),
        }
    }
}

/// Noise gate timing
///
/// Attack and release are per-sample smoothing coefficients tuned for 48 kHz.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Startup threshold in dBFS (-100 or below disables the gate)
    pub threshold_db: f32,
    /// Time the gate stays open after the signal drops (ms)
    pub hold_ms: f32,
    /// Opening coefficient
    pub attack: f32,
    /// Closing coefficient. The default closes a held gate to below -40 dB
    /// within 900 samples.
    pub release: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold_db: -100.0,
            hold_ms: 50.0,
            attack: 0.01,
            release: 0.006,
        }
    }
}

impl GateConfig {
    /// Hold time converted to samples at `sample_rate`
    pub fn hold_samples(&self, sample_rate: u32) -> usize {
        (self.hold_ms.max(0.0) / 1000.0 * sample_rate as f32).round() as usize
    }
}

/// Recording pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Samples per batch handed from the audio thread to the encoder
    pub batch_size: usize,
    /// Pre-allocated batch buffers cycling between the two threads
    pub pool_size: usize,
    /// Seconds of encoded audio between progress events
    pub progress_interval_secs: f64,
    /// Target encoder bit rate (kbps)
    pub bit_rate_kbps: u32,
    /// Channels the encoder writes (mono capture is duplicated for 2)
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            batch_size: 4096,
            pool_size: 16,
            progress_interval_secs: 5.0,
            bit_rate_kbps: 128,
            channels: 2,
        }
    }
}

/// Mixer state applied at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Limiter ceiling in dBFS (snapped to 0, -3, -6 or -12)
    pub limiter_threshold_db: f32,
    /// Mic volume (0.0 - 1.0)
    pub mic_volume: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            limiter_threshold_db: 0.0,
            mic_volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_samples_at_48k() {
        let gate = GateConfig::default();
        assert_eq!(gate.hold_samples(48000), 2400);
        assert_eq!(gate.hold_samples(44100), 2205);
    }

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.capture.batch_size, 4096);
        assert_eq!(config.capture.channels, 2);
        assert_eq!(config.mixer.mic_volume, 1.0);
        assert_eq!(config.gate.attack, 0.01);
    }
}

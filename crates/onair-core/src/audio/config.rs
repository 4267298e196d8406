//! Audio backend configuration
//!
//! Device selection and stream settings for the duplex mic/monitor pair.

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_SAMPLE_RATE, MAX_BLOCK_SIZE};

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Smallest buffer the backend will request (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Configuration for the audio backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Microphone device name (None = system default input)
    pub input_device: Option<String>,

    /// Monitor device name (None = system default output)
    pub output_device: Option<String>,

    /// Session sample rate; pads and recordings follow it
    pub sample_rate: u32,

    /// Preferred buffer size in frames (may be adjusted by the system)
    pub buffer_size: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl AudioConfig {
    /// Buffer size clamped to what the engine can render in one block
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BLOCK_SIZE as u32)
    }

    /// One-way latency of one buffer in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.buffer_frames() as f32 / self.sample_rate.max(1) as f32 * 1000.0
    }
}

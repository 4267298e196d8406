//! Live audio backend
//!
//! Opens a duplex pair with CPAL: the microphone input stream and the
//! monitor output stream. The output callback owns the
//! [`AudioEngine`](crate::engine::AudioEngine) by value.
//!
//! - **Control thread**: sends commands via the lock-free queue
//! - **Input callback**: pushes mic frames into an SPSC ring
//! - **Output callback**: drains the ring, renders, writes the monitor mix
//!   and pushes the program mix into the [`ProgramTap`] ring
//!
//! ```ignore
//! let devices = AudioDevices::open(&config.audio)?;
//! let (console, engine) = Console::new(&config, devices.sample_rate());
//! let audio = start_audio_system(devices, engine)?;
//! ```

mod config;
mod cpal_backend;
mod error;

pub use config::{AudioConfig, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use cpal_backend::{start_audio_system, AudioDevices, AudioHandle, AudioSystemResult, ProgramTap};
pub use error::{AudioError, AudioResult};

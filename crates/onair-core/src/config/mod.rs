//! Console configuration
//!
//! YAML-backed settings for the console, plus the generic load/save helpers
//! and standard paths.
//!
//! # Usage
//!
//! ```ignore
//! use onair_core::config::{default_config_path, load_config, save_config, ConsoleConfig};
//!
//! let path = default_config_path();
//! let config: ConsoleConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod console;
mod io;
mod paths;

pub use console::{CaptureConfig, ConsoleConfig, GateConfig, MixerConfig};
pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_recordings_dir, CONFIG_FILE_NAME};

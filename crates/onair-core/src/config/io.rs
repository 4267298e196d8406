//! Generic configuration I/O
//!
//! YAML loading and saving for any serde configuration type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file
///
/// A missing file yields the defaults. An unreadable or unparseable file
/// logs a warning and also yields the defaults, so a broken settings file
/// never keeps the console from starting.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("load_config: Failed to read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("load_config: Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: Failed to parse {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: ConsoleConfig = load_config(Path::new("/nonexistent/onair/console.yaml"));
        assert_eq!(config.capture.batch_size, 4096);
    }

    #[test]
    fn test_roundtrip_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("console.yaml");

        let mut config = ConsoleConfig::default();
        config.gate.hold_ms = 80.0;
        config.mixer.limiter_threshold_db = -6.0;

        save_config(&config, &path).unwrap();
        let loaded: ConsoleConfig = load_config(&path);

        assert_eq!(loaded.gate.hold_ms, 80.0);
        assert_eq!(loaded.mixer.limiter_threshold_db, -6.0);
    }

    #[test]
    fn test_garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.yaml");
        std::fs::write(&path, "gate: [this is: not a map").unwrap();

        let loaded: ConsoleConfig = load_config(&path);
        assert_eq!(loaded.gate.hold_ms, 50.0);
    }

    #[test]
    fn test_partial_file_fills_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.yaml");
        std::fs::write(&path, "capture:\n  batch_size: 2048\n").unwrap();

        let loaded: ConsoleConfig = load_config(&path);
        assert_eq!(loaded.capture.batch_size, 2048);
        assert_eq!(loaded.capture.progress_interval_secs, 5.0);
        assert_eq!(loaded.audio.sample_rate, 48000);
    }
}

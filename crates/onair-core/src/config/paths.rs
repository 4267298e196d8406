//! Standard locations for OnAir files

use std::path::PathBuf;

/// File name of the console settings
pub const CONFIG_FILE_NAME: &str = "console.yaml";

/// Directory holding OnAir settings
///
/// Returns: `~/.config/onair` (platform config dir)
fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("onair")
}

/// Default path of the console settings file
///
/// Returns: `~/.config/onair/console.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Default directory for finished recordings
///
/// Returns: `~/Music/OnAir`
pub fn default_recordings_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("OnAir")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_ends_with_file_name() {
        let path = default_config_path();
        assert!(path.ends_with("onair/console.yaml"));
    }

    #[test]
    fn test_recordings_dir_ends_with_onair() {
        assert!(default_recordings_dir().ends_with("OnAir"));
    }
}

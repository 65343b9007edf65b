//! Default locations for fader configuration files

use std::path::PathBuf;

/// Get the default config directory
///
/// Returns: `<platform config dir>/fader` (e.g. `~/.config/fader` on Linux),
/// or `./fader` when no config dir can be determined.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fader")
}

/// Get the default path for a config file (e.g. "engine.yaml")
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

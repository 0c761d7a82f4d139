//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir):
//!   Windows: %APPDATA%\clinical-cascade\
//!   macOS:   ~/Library/Application Support/clinical-cascade/
//!   Linux:   ~/.config/clinical-cascade/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `red-flags.json`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the red-flag catalog.
    pub red_flags_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "clinical-cascade";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let red_flags_file = config_dir.join("red-flags.json");

        Self {
            config_dir,
            settings_file,
            red_flags_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

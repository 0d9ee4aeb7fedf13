use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Analysis thresholds and window sizes.
    pub analysis: AnalysisConfig,
}

/// Tunables for the per-session analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Frames after each onset used to estimate its pitch.
    pub note_window: usize,
    /// Minimum distinct notes a take must yield to be graded.
    pub min_notes: usize,
    /// |z| above which an interval is flagged uneven.
    pub outlier_z: f64,
    /// CV (percent) below which timing counts as very even.
    pub very_even_cv: f64,
    /// CV (percent) below which timing counts as even.
    pub even_cv: f64,
    /// Intervals per tempo block.
    pub tempo_block: usize,
    /// Tuning reference for note naming.
    pub reference_a4_hz: f64,
    /// Frame hop in samples, for captures that don't record one.
    pub default_hop_length: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            note_window: 10,
            min_notes: crate::scales::SCALE_DEGREES,
            outlier_z: 1.5,
            very_even_cv: 3.0,
            even_cv: 5.0,
            tempo_block: 4,
            reference_a4_hz: 440.0,
            default_hop_length: 512,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/scaletrack/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("scaletrack.db")
    } else {
        // Fallback: current directory
        PathBuf::from("scaletrack.db")
    }
}

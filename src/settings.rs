//! Game settings and preferences
//!
//! Stored as JSON next to the executable's working directory. Every field
//! has a default, so partial files are fine.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Settings file looked up in the working directory
pub const SETTINGS_FILE: &str = "drop_dodge.json";
/// Overrides the settings file path
pub const SETTINGS_ENV: &str = "DROP_DODGE_SETTINGS";
/// Overrides the quality preset from the file
pub const QUALITY_ENV: &str = "DROP_DODGE_QUALITY";

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    /// Shadow map edge length, `None` disables the depth pass
    pub fn shadow_map_size(&self) -> Option<u32> {
        match self {
            QualityPreset::Low => None,
            QualityPreset::Medium => Some(2048),
            QualityPreset::High => Some(4096),
        }
    }

    /// Next preset, wrapping High back to Low
    pub fn next(&self) -> Self {
        match self {
            QualityPreset::Low => QualityPreset::Medium,
            QualityPreset::Medium => QualityPreset::High,
            QualityPreset::High => QualityPreset::Low,
        }
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(QualityPreset::Low),
            "medium" | "med" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            other => Err(format!("unknown quality preset '{}'", other)),
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset
    pub quality: QualityPreset,
    pub vsync: bool,

    // === Window ===
    pub window_width: u32,
    pub window_height: u32,

    // === Game ===
    /// OBJ model for the player; the player is a cube without one
    pub player_model: Option<PathBuf>,
    /// Fixed RNG seed; clock-seeded when absent
    pub seed: Option<u64>,

    // === HUD ===
    /// Log frames per second once a second
    pub show_fps: bool,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            vsync: true,

            window_width: 1280,
            window_height: 720,

            player_model: None,
            seed: None,

            show_fps: false,

            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Read settings from `path`
    ///
    /// A missing file gives defaults silently; a malformed one gives
    /// defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Could not read {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring malformed {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Settings file path, honouring the environment override
    pub fn path() -> PathBuf {
        std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }

    /// Load from the default location and apply environment overrides
    pub fn load() -> Self {
        let mut settings = Self::load_from(&Self::path());
        if let Ok(value) = std::env::var(QUALITY_ENV) {
            settings.apply_quality_override(&value);
        }
        settings
    }

    fn apply_quality_override(&mut self, value: &str) {
        match value.parse() {
            Ok(preset) => self.quality = preset,
            Err(e) => log::warn!("{}: {}", QUALITY_ENV, e),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_parsing() {
        assert_eq!("LOW".parse::<QualityPreset>(), Ok(QualityPreset::Low));
        assert_eq!(" med ".parse::<QualityPreset>(), Ok(QualityPreset::Medium));
        assert_eq!("high".parse::<QualityPreset>(), Ok(QualityPreset::High));
        assert!("ultra".parse::<QualityPreset>().is_err());
    }

    #[test]
    fn test_quality_cycle_and_shadow_sizes() {
        let mut q = QualityPreset::Low;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(q.shadow_map_size());
            q = q.next();
        }
        assert_eq!(q, QualityPreset::Low);
        assert_eq!(seen, vec![None, Some(2048), Some(4096)]);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, r#"{ "quality": "High", "seed": 42, "player_model": "assets/hero.obj" }"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.quality, QualityPreset::High);
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.player_model, Some(PathBuf::from("assets/hero.obj")));
        assert_eq!(settings.window_width, 1280);
        assert!(settings.vsync);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "{ quality: ").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let mut settings = Settings::from_preset(QualityPreset::Low);
        settings.muted = true;
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_quality_override() {
        let mut settings = Settings::default();
        settings.apply_quality_override("low");
        assert_eq!(settings.quality, QualityPreset::Low);
        settings.apply_quality_override("nonsense");
        assert_eq!(settings.quality, QualityPreset::Low);
    }
}

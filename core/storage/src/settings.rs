//! Plain, non-encrypted user preferences.
//!
//! Settings hold nothing sensitive and live outside the vault's trust
//! boundary, in a separate JSON file loaded and saved independently of
//! the manifest.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use veil_common::Result;

/// Available UI themes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    Light,
    #[default]
    Dark,
    NeonDark,
    Forest,
    Ocean,
}

impl Theme {
    /// Parse a theme name, returning `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "neon-dark" => Some(Self::NeonDark),
            "forest" => Some(Self::Forest),
            "ocean" => Some(Self::Ocean),
            _ => None,
        }
    }

    /// Canonical name of the theme.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::NeonDark => "neon-dark",
            Self::Forest => "forest",
            Self::Ocean => "ocean",
        }
    }
}

/// User preferences persisted next to the vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Active UI theme.
    #[serde(default)]
    pub theme: Theme,
}

impl Settings {
    /// Load settings, falling back to defaults when the file is
    /// missing or unparseable.
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "settings unreadable, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings with the same atomic-write discipline as the
    /// manifest blob.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| veil_common::Error::Serialization(e.to_string()))?;
        crate::blob::atomic_write(path, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");

        let settings = Settings { theme: Theme::Ocean };
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded = Settings::load(&temp.path().join("absent.json"));

        assert_eq!(loaded.theme, Theme::Dark);
    }

    #[test]
    fn test_corrupt_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, b"{not json").unwrap();

        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!(Theme::parse("neon-dark"), Some(Theme::NeonDark));
        assert_eq!(Theme::parse("mauve"), None);
    }
}

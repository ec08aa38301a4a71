use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use movie_writer_core::shared::constants::{
    DEFAULT_FRAMERATE, DEFAULT_FRAME_DURATION, MAX_MOVIE_WRITERS,
};

/// Defaults for every recording, read from a JSON file. Missing fields
/// fall back to the built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_writers: usize,
    pub framerate: f64,
    pub options: String,
    pub frame_duration: u32,
    pub synchronous_flush: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_writers: MAX_MOVIE_WRITERS,
            framerate: DEFAULT_FRAMERATE,
            options: String::new(),
            frame_duration: DEFAULT_FRAME_DURATION,
            synchronous_flush: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("MovieWriter").join("settings.json"))
    }

    /// Loads `explicit` if given (any failure is an error). Otherwise
    /// tries the user config file and falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let Some(path) = Self::config_path().filter(|p| p.exists()) else {
            return Ok(Self::default());
        };
        match Self::from_file(&path) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                log::warn!("Ignoring settings file {}: {e}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read settings {}: {e}", path.display()))?;
        Ok(Self::from_json(&json)?)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

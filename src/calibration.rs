// Calibration persistence
//
// Per-channel power scaling factors, restored at startup and saved when a
// command changes them. The engine itself never touches the filesystem;
// this store is the adapter around its calibration getters/setters.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Per-channel scaling factors in [0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub left: f32,
    pub right: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            left: 1.0,
            right: 1.0,
        }
    }
}

impl Calibration {
    pub fn clamped(self) -> Self {
        Self {
            left: self.left.clamp(0.0, 1.0),
            right: self.right.clamp(0.0, 1.0),
        }
    }
}

/// Error types for the calibration file
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("calibration file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// JSON file holding the calibration values
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load stored values, falling back to defaults when the file does not
    /// exist yet.
    pub fn load(&self) -> Result<Calibration, CalibrationError> {
        if !self.path.exists() {
            info!(
                "no calibration file at {}, using defaults",
                self.path.display()
            );
            return Ok(Calibration::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        let calibration: Calibration = serde_json::from_str(&contents)?;
        Ok(calibration.clamped())
    }

    pub fn save(&self, calibration: Calibration) -> Result<(), CalibrationError> {
        let json = serde_json::to_string_pretty(&calibration.clamped())?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

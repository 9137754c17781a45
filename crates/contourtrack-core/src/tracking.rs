//! Temporal tracker configuration

use crate::error::{ensure, ConfigError};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hysteresis, smoothing and ROI knobs shared by both detector slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Smoothed score at or above which a slot locks
    pub on_th: f64,
    /// Smoothed score below which a locked slot releases
    pub off_th: f64,
    /// Weight of the newest score in the moving average
    pub alpha: f64,
    /// Consecutive misses that force a slot back to global search
    pub miss_m: u32,
    /// ROI size relative to the last locked box
    pub roi_factor: f64,
    /// Search inside the ROI while locked; false keeps every search global
    pub use_roi: bool,
    pub return_overlay: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            on_th: 0.45,
            off_th: 0.30,
            alpha: 0.3,
            miss_m: 5,
            roi_factor: 1.8,
            use_roi: true,
            return_overlay: false,
        }
    }
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        ensure(
            self.on_th.is_finite() && self.off_th.is_finite() && self.off_th >= 0.0,
            "off_th",
            "thresholds must be finite and non-negative",
        )?;
        ensure(
            self.off_th < self.on_th,
            "off_th",
            format!("off_th ({}) must be below on_th ({})", self.off_th, self.on_th),
        )?;
        ensure(
            self.alpha > 0.0 && self.alpha <= 1.0,
            "alpha",
            format!("must lie in (0, 1], got {}", self.alpha),
        )?;
        ensure(self.miss_m >= 1, "miss_m", "must be at least 1")?;
        ensure(
            self.roi_factor >= 1.0 && self.roi_factor.is_finite(),
            "roi_factor",
            "must be at least 1",
        )
    }
}

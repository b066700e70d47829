use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Knobs of one fusion run. Every field has a default, so a partial JSON
/// document is enough.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FusionConfig {
    /// Largest gap between two anchors still treated as contiguous, in frame
    /// intervals. Slightly above 1 to absorb timestamp rounding; depends on
    /// how the decoder rounds, so validate it per codec and frame rate.
    pub gap_tolerance: f64,

    /// Most frames the in-memory frame cache may hold.
    pub max_cached_frames: usize,

    /// Detector runs on every Nth frame.
    pub detection_stride: usize,

    /// Run both propagation directions at once.
    pub parallel: bool,

    /// Retention under this is logged as a warning.
    pub low_retention_warning: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            gap_tolerance: 1.10,
            max_cached_frames: 108_000,
            detection_stride: 1,
            parallel: true,
            low_retention_warning: 0.5,
        }
    }
}

impl FusionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FusionConfig = serde_json::from_str(json)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gap_tolerance.is_finite() || self.gap_tolerance < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "gap_tolerance must be a finite number >= 1.0, got {}",
                self.gap_tolerance
            )));
        }

        if self.max_cached_frames == 0 {
            return Err(Error::InvalidConfig("max_cached_frames must be positive".into()));
        }

        if self.detection_stride == 0 {
            return Err(Error::InvalidConfig("detection_stride must be positive".into()));
        }

        if !(0.0..=1.0).contains(&self.low_retention_warning) {
            return Err(Error::InvalidConfig(format!(
                "low_retention_warning must be within [0, 1], got {}",
                self.low_retention_warning
            )));
        }

        Ok(())
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stage::PipelineStage;

/// Per-delegation timeouts for the narrative pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval_timeout_ms: u64,
    pub detection_timeout_ms: u64,
    pub drafting_timeout_ms: u64,
    pub fact_check_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_timeout_ms: 5_000,
            detection_timeout_ms: 30_000,
            drafting_timeout_ms: 60_000,
            fact_check_timeout_ms: 30_000,
        }
    }
}

impl PipelineConfig {
    /// Every delegation gets the same timeout.
    pub fn uniform(timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        Self {
            retrieval_timeout_ms: ms,
            detection_timeout_ms: ms,
            drafting_timeout_ms: ms,
            fact_check_timeout_ms: ms,
        }
    }

    /// Timeout for the delegation a stage performs. `None` for stages that
    /// do not delegate.
    pub fn timeout_for(&self, stage: PipelineStage) -> Option<Duration> {
        let ms = match stage {
            PipelineStage::Retrieving => self.retrieval_timeout_ms,
            PipelineStage::Analyzing => self.detection_timeout_ms,
            PipelineStage::Drafting => self.drafting_timeout_ms,
            PipelineStage::FactChecking => self.fact_check_timeout_ms,
            PipelineStage::Idle | PipelineStage::Complete | PipelineStage::Verified => {
                return None
            }
        };
        Some(Duration::from_millis(ms))
    }
}

/// Tuning for the built-in rule-based typology detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Currency transaction reporting threshold, in minor units.
    pub reporting_threshold_minor: i64,
    /// Width of the band just below the threshold, as a fraction of it.
    pub structuring_band: f64,
    pub structuring_window_days: i64,
    pub min_structuring_deposits: usize,
    /// How soon after a cash deposit an outbound transfer counts as rapid.
    pub rapid_movement_window_days: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            reporting_threshold_minor: 1_000_000,
            structuring_band: 0.10,
            structuring_window_days: 7,
            min_structuring_deposits: 2,
            rapid_movement_window_days: 3,
        }
    }
}

impl DetectionConfig {
    /// Lower edge of the structuring band, in minor units.
    pub fn band_floor_minor(&self) -> i64 {
        let band = self.structuring_band.clamp(0.0, 1.0);
        (self.reporting_threshold_minor as f64 * (1.0 - band)).round() as i64
    }
}

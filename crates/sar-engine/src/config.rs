use std::path::Path;

use sar_pipeline::{DetectionConfig, PipelineConfig};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Configuration for a [`CaseEngine`](crate::CaseEngine).
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Institution named in generated SAR reports.
    pub filing_institution: String,
    /// Prefix for generated case ids (`<prefix>-<year>-<seq>`).
    pub case_id_prefix: String,
    /// Per-delegation timeouts.
    pub pipeline: PipelineConfig,
    /// Thresholds for the built-in typology detector.
    pub detection: DetectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filing_institution: "SARaansh Financial Services".into(),
            case_id_prefix: "SAR".into(),
            pipeline: PipelineConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    fn validate(&self) -> EngineResult<()> {
        if self.case_id_prefix.trim().is_empty() {
            return Err(EngineError::Config("case_id_prefix must not be empty".into()));
        }
        let band = self.detection.structuring_band;
        if !(0.0..1.0).contains(&band) {
            return Err(EngineError::Config(format!(
                "detection.structuring_band must lie in [0, 1), got {band}"
            )));
        }
        if self.detection.reporting_threshold_minor <= 0 {
            return Err(EngineError::Config(
                "detection.reporting_threshold_minor must be positive".into(),
            ));
        }
        Ok(())
    }
}

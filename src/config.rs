//! Analysis parameters. Plain values handed in by the caller, never read from globals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Relative change (percent) that marks an entry significant. Default: 20.
    pub threshold_pct: f64,
    /// Percentage-point change that marks an entry significant on its own. Default: 2.
    pub absolute_pt_floor: f64,
    /// Default: 60.
    pub recent_window_days: i64,
    /// Default: 180.
    pub baseline_window_days: i64,
    /// Wall-clock budget for one analysis request. Default: 30.
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold_pct: 20.0,
            absolute_pt_floor: 2.0,
            recent_window_days: 60,
            baseline_window_days: 180,
            timeout_secs: 30,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !self.threshold_pct.is_finite() || self.threshold_pct <= 0.0 {
            return Err(invalid(format!(
                "threshold_pct must be positive, got {}",
                self.threshold_pct
            )));
        }
        if !self.absolute_pt_floor.is_finite() || self.absolute_pt_floor < 0.0 {
            return Err(invalid(format!(
                "absolute_pt_floor must not be negative, got {}",
                self.absolute_pt_floor
            )));
        }
        if self.recent_window_days <= 0 {
            return Err(invalid(format!(
                "recent_window_days must be positive, got {}",
                self.recent_window_days
            )));
        }
        if self.baseline_window_days <= 0 {
            return Err(invalid(format!(
                "baseline_window_days must be positive, got {}",
                self.baseline_window_days
            )));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidConfiguration(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threshold_pct, 20.0);
        assert_eq!(config.recent_window_days, 60);
        assert_eq!(config.baseline_window_days, 180);
    }

    #[test]
    fn rejects_non_positive_values() {
        let cases = [
            AnalysisConfig {
                threshold_pct: 0.0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                absolute_pt_floor: -1.0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                recent_window_days: 0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                baseline_window_days: -30,
                ..AnalysisConfig::default()
            },
        ];

        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"threshold_pct": 35}"#).unwrap();
        assert_eq!(config.threshold_pct, 35.0);
        assert_eq!(config.absolute_pt_floor, 2.0);
    }
}

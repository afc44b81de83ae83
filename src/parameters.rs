use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds of the linking analysis, and the time point range that is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParameters {
    /// Recorded divisions with a lower family score total are suspicious, and
    /// undivided cells reaching it may be mothers.
    pub min_mother_score: f64,
    /// Links with a lower score total are flagged. Zero disables the check.
    pub min_link_score: f64,
    pub max_distance_moved_um_per_minute: f64,
    pub min_time_between_divisions_h: f64,
    /// A cell whose volume drops below this fraction of its previous volume shrank a lot.
    pub shrink_fraction: f64,
    pub min_time_point: i32,
    pub max_time_point: i32,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            min_mother_score: 3.0,
            min_link_score: 0.0,
            max_distance_moved_um_per_minute: 1.0,
            min_time_between_divisions_h: 10.0,
            shrink_fraction: 0.5,
            min_time_point: 0,
            max_time_point: 5000,
        }
    }
}

impl AnalysisParameters {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let parameters = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded analysis parameters");
        Ok(parameters)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let parameters: AnalysisParameters =
            serde_json::from_str(r#"{"min_mother_score": 1.5}"#).unwrap();
        assert_eq!(parameters.min_mother_score, 1.5);
        assert_eq!(parameters.max_time_point, 5000);
        assert_eq!(parameters.shrink_fraction, 0.5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        let parameters = AnalysisParameters {
            min_link_score: -2.0,
            min_time_point: 3,
            ..AnalysisParameters::default()
        };
        parameters.save_to_path(&path).unwrap();
        assert_eq!(AnalysisParameters::load_from_path(&path).unwrap(), parameters);
    }
}

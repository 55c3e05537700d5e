//! Externally supplied tuning values.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "skeleton": { "edge_range": 4.0 }, "gaps": { "max_gap": 6.0 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algo::gaps::GapOptions;
use crate::algo::skeleton::SkeletonOptions;
use crate::error::{Result, TraceError};
use crate::history::DEFAULT_CAPACITY;

/// All numeric settings of a tracing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Skeleton graph builder settings.
    pub skeleton: SkeletonOptions,

    /// Gap scorer settings.
    pub gaps: GapOptions,

    /// Number of undo snapshots kept.
    pub history_capacity: usize,

    /// Leaf lines shorter than this count as small.
    pub small_line_length: f64,

    /// Gaps at or below this cost are merged by automatic merging.
    pub auto_merge_cost: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            skeleton: SkeletonOptions::default(),
            gaps: GapOptions::default(),
            history_capacity: DEFAULT_CAPACITY,
            small_line_length: 10.0,
            auto_merge_cost: 0.75,
        }
    }
}

impl TraceConfig {
    /// Read a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: TraceConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check every value range.
    pub fn validate(&self) -> Result<()> {
        self.skeleton.validate()?;
        self.gaps.validate()?;
        if self.history_capacity == 0 {
            return Err(TraceError::invalid_param(
                "history_capacity",
                self.history_capacity,
                "must be at least 1",
            ));
        }
        if !(self.small_line_length >= 0.0) {
            return Err(TraceError::invalid_param(
                "small_line_length",
                self.small_line_length,
                "must be non-negative",
            ));
        }
        if self.auto_merge_cost.is_nan() {
            return Err(TraceError::invalid_param(
                "auto_merge_cost",
                self.auto_merge_cost,
                "must be a number",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TraceConfig =
            serde_json::from_str(r#"{ "skeleton": { "edge_range": 4.0 }, "history_capacity": 3 }"#)
                .unwrap();
        assert_eq!(config.skeleton.edge_range, 4.0);
        assert_eq!(config.skeleton.power, SkeletonOptions::default().power);
        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.gaps, GapOptions::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = TraceConfig::default();
        config.gaps.max_gap = 3.5;
        config.save(&path).unwrap();
        assert_eq!(TraceConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "gaps": { "max_gap": -1.0 } }"#).unwrap();
        assert!(matches!(
            TraceConfig::load(&path),
            Err(TraceError::InvalidParameter { name: "max_gap", .. })
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(TraceConfig::load(&path), Err(TraceError::Json(_))));
    }
}

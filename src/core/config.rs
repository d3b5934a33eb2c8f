//! Simulation configuration
//!
//! The step size is owned by each container rather than living in a global,
//! so independent simulations (and nested containers) never interfere.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::ConfigError;

/// Step size used when none is configured.
pub const DEFAULT_DT: f64 = 0.01;

/// Per-container simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated time advanced by one step of every block.
    pub dt: f64,
    /// Run the unseeded-cycle check as part of validation.
    pub detect_unseeded_cycles: bool,
    /// Stack size for worker threads; the platform default when `None`.
    pub worker_stack_size: Option<usize>,
}

impl SimConfig {
    /// Default configuration with a different step size.
    pub fn with_dt(dt: f64) -> Self {
        Self {
            dt,
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Examples
    /// ```
    /// use block_flow::core::config::SimConfig;
    ///
    /// let config = SimConfig::from_json_str(r#"{ "dt": 0.001 }"#).unwrap();
    /// assert_eq!(config.dt, 0.001);
    /// assert!(!config.detect_unseeded_cycles);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check that the step size is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidStepSize(self.dt));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            detect_unseeded_cycles: false,
            worker_stack_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_step_size() {
        let config = SimConfig::default();
        assert_eq!(config.dt, DEFAULT_DT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_step_sizes() {
        for dt in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            let err = SimConfig::with_dt(dt).validate().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidStepSize(_)));
        }
    }

    #[test]
    fn test_parse_partial_json() {
        let config = SimConfig::from_json_str(r#"{ "detect_unseeded_cycles": true }"#).unwrap();
        assert_eq!(config.dt, DEFAULT_DT);
        assert!(config.detect_unseeded_cycles);
    }

    #[test]
    fn test_parse_rejects_negative_dt() {
        let err = SimConfig::from_json_str(r#"{ "dt": -1.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStepSize(_)));
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = SimConfig::from_json_str("{ dt: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "dt": 0.05, "worker_stack_size": 65536 }}"#).unwrap();

        let config = SimConfig::from_path(file.path()).unwrap();
        assert_eq!(config.dt, 0.05);
        assert_eq!(config.worker_stack_size, Some(65536));
    }

    #[test]
    fn test_from_missing_path() {
        let err = SimConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_INFRA_TARGET: f64 = 0.7;

/// Top-level configuration for a dashboard run.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    pub telemetry: TelemetryConfig,
    pub infra_target: f64,
    pub preview_rows: usize,
}

/// Tracing controls.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("scms_data.csv"),
            output_dir: PathBuf::from("."),
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
            infra_target: DEFAULT_INFRA_TARGET,
            preview_rows: 5,
        }
    }
}

impl AppConfig {
    /// Reads `.env` when present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let infra_target = match lookup("SCMS_INFRA_TARGET") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "SCMS_INFRA_TARGET",
                    value: raw.clone(),
                })?,
            None => defaults.infra_target,
        };
        let infra_target = validate_target(infra_target)?;

        let preview_rows = match lookup("SCMS_PREVIEW_ROWS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "SCMS_PREVIEW_ROWS",
                    value: raw.clone(),
                })?,
            None => defaults.preview_rows,
        };

        Ok(Self {
            data_path: lookup("SCMS_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            output_dir: lookup("SCMS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            telemetry: TelemetryConfig {
                log_level: lookup("SCMS_LOG_LEVEL").unwrap_or(defaults.telemetry.log_level),
            },
            infra_target,
            preview_rows,
        })
    }
}

/// Gap percentages divide by the target.
pub fn validate_target(target: f64) -> Result<f64, ConfigError> {
    if target.is_finite() && target > 0.0 {
        Ok(target)
    } else {
        Err(ConfigError::InvalidTarget(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn falls_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).expect("defaults are valid");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SCMS_DATA_PATH", "data/scms.csv"),
            ("SCMS_INFRA_TARGET", "0.75"),
            ("SCMS_LOG_LEVEL", "debug"),
            ("SCMS_PREVIEW_ROWS", "10"),
        ]))
        .expect("valid overrides");
        assert_eq!(config.data_path, PathBuf::from("data/scms.csv"));
        assert_eq!(config.infra_target, 0.75);
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.preview_rows, 10);
    }

    #[test]
    fn rejects_non_positive_target() {
        let err = AppConfig::from_lookup(lookup_from(&[("SCMS_INFRA_TARGET", "0")]))
            .expect_err("zero target is rejected");
        assert!(matches!(err, ConfigError::InvalidTarget(_)));

        let err = AppConfig::from_lookup(lookup_from(&[("SCMS_INFRA_TARGET", "high")]))
            .expect_err("text target is rejected");
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }
}

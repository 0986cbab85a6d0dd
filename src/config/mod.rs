//! Application configuration.
//!
//! Aggregates telemetry and runtime configuration into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod runtime;
mod telemetry;

pub use runtime::RuntimeConfig;
pub use telemetry::TelemetryConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "opmeter.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "OPMETER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "OPMETER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "OPMETER_LOG";
/// Environment variable that force-disables the metrics runtime.
pub const SDK_DISABLED_ENV_VAR: &str = "OTEL_SDK_DISABLED";

use serde::Deserialize;

use crate::error::Result;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metric groups and operation instrumentation.
    pub telemetry: TelemetryConfig,
    /// Metrics runtime and exposition endpoint.
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `opmeter.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    ///
    /// The kill switch in `SDK_DISABLED_ENV_VAR` is applied last and cannot be
    /// overridden by any file.
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;
        config.telemetry.sdk_disabled = sdk_disabled_from_env();
        Ok(config)
    }

    /// Create config for testing: everything enabled, ephemeral port.
    pub fn for_test() -> Self {
        Self {
            telemetry: TelemetryConfig::all_enabled(),
            runtime: RuntimeConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Whether the environment kill switch is present (set and non-empty).
pub fn sdk_disabled_from_env() -> bool {
    std::env::var_os(SDK_DISABLED_ENV_VAR).is_some_and(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(!config.telemetry.enabled);
        assert_eq!(config.runtime.port, 8081);
    }

    #[test]
    fn test_config_for_test() {
        let config = Config::for_test();
        assert!(config.telemetry.instrumentation_enabled());
        assert_eq!(config.runtime.port, 0);
    }

    #[test]
    #[serial]
    fn test_load_yaml_with_camel_case_keys() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "telemetry:\n  enabled: true\n  apiMetrics: true\n  repoMetrics: true\nruntime:\n  port: 9464\n  service_name: gallery"
        )
        .unwrap();

        let config = Config::load(file.path().to_str()).unwrap();
        assert!(config.telemetry.enabled);
        assert!(config.telemetry.api_metrics);
        assert!(!config.telemetry.host_metrics);
        assert!(config.telemetry.repo_metrics);
        assert_eq!(config.runtime.port, 9464);
        assert_eq!(config.runtime.service_name, "gallery");
    }

    #[test]
    #[serial]
    fn test_load_missing_required_file_fails() {
        let result = Config::load(Some("/nonexistent/opmeter.yaml"));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        std::env::set_var("OPMETER__TELEMETRY__JOB_METRICS", "true");
        std::env::set_var(SDK_DISABLED_ENV_VAR, "1");

        let config = Config::load(None).unwrap();

        std::env::remove_var("OPMETER__TELEMETRY__JOB_METRICS");
        std::env::remove_var(SDK_DISABLED_ENV_VAR);

        assert!(config.telemetry.job_metrics);
        assert!(config.telemetry.sdk_disabled);
    }

    #[test]
    #[serial]
    fn test_empty_kill_switch_is_ignored() {
        std::env::set_var(SDK_DISABLED_ENV_VAR, "");
        let disabled = sdk_disabled_from_env();
        std::env::remove_var(SDK_DISABLED_ENV_VAR);

        assert!(!disabled);
    }
}

//! Telemetry enablement flags.

use serde::Deserialize;

/// Which metric groups emit, and whether operation timing is applied.
///
/// Keys are accepted in snake_case or camelCase (`repo_metrics` / `repoMetrics`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Global switch for automatic operation instrumentation.
    pub enabled: bool,
    /// API request metrics.
    #[serde(alias = "apiMetrics", alias = "apimetrics")]
    pub api_metrics: bool,
    /// Host/process metrics.
    #[serde(alias = "hostMetrics", alias = "hostmetrics")]
    pub host_metrics: bool,
    /// Background job metrics.
    #[serde(alias = "jobMetrics", alias = "jobmetrics")]
    pub job_metrics: bool,
    /// Repository metrics, including operation timing.
    #[serde(alias = "repoMetrics", alias = "repometrics")]
    pub repo_metrics: bool,
    /// Environment kill switch. Never read from files.
    #[serde(skip)]
    pub sdk_disabled: bool,
}

impl TelemetryConfig {
    /// Every group and instrumentation enabled.
    pub fn all_enabled() -> Self {
        Self {
            enabled: true,
            api_metrics: true,
            host_metrics: true,
            job_metrics: true,
            repo_metrics: true,
            sdk_disabled: false,
        }
    }

    /// Whether operation-sets should be timed.
    pub fn instrumentation_enabled(&self) -> bool {
        self.enabled && self.repo_metrics && !self.sdk_disabled
    }
}

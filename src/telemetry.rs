//! Telemetry facade.
//!
//! Owns one [`MetricGroup`] per subsystem area and the [`Instrumentor`] for
//! operation timing. Built once at boot from [`TelemetryConfig`].

use std::sync::Arc;

use tracing::info;

use crate::advice::{Instrumented, Instrumentor, OperationSet, OperationSetDescriptor};
use crate::backend::MetricBackend;
use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::group::{MetricGroup, MetricGroupOptions};

pub struct Telemetry {
    api: MetricGroup,
    host: MetricGroup,
    jobs: MetricGroup,
    repo: MetricGroup,
    instrumentor: Instrumentor,
}

impl Telemetry {
    pub fn new(config: &TelemetryConfig, backend: Arc<dyn MetricBackend>) -> Self {
        let group = |enabled: bool| {
            MetricGroup::new(Arc::clone(&backend)).configure(MetricGroupOptions { enabled })
        };

        let telemetry = Self {
            api: group(config.api_metrics),
            host: group(config.host_metrics),
            jobs: group(config.job_metrics),
            repo: group(config.repo_metrics),
            instrumentor: Instrumentor::new(Arc::clone(&backend), config),
        };

        info!(
            api = config.api_metrics,
            host = config.host_metrics,
            jobs = config.job_metrics,
            repo = config.repo_metrics,
            instrumentation = telemetry.instrumentor.is_enabled(),
            "Telemetry configured"
        );
        telemetry
    }

    pub fn api(&self) -> &MetricGroup {
        &self.api
    }

    pub fn host(&self) -> &MetricGroup {
        &self.host
    }

    pub fn jobs(&self) -> &MetricGroup {
        &self.jobs
    }

    pub fn repo(&self) -> &MetricGroup {
        &self.repo
    }

    pub fn instrumentor(&self) -> &Instrumentor {
        &self.instrumentor
    }

    /// Register the operation-sets to time. Call once, at boot.
    pub fn setup(&self, operation_sets: &[OperationSetDescriptor]) -> Result<()> {
        self.instrumentor.setup(operation_sets)
    }

    /// Wrap an operation-set implementation with timing advice.
    pub fn wrap<T: OperationSet>(&self, inner: T) -> Instrumented<T> {
        self.instrumentor.wrap(inner)
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("api", &self.api)
            .field("host", &self.host)
            .field("jobs", &self.jobs)
            .field("repo", &self.repo)
            .field("instrumentor", &self.instrumentor)
            .finish()
    }
}

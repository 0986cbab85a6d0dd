//! Gated metric emission for one subsystem area.

use std::sync::Arc;

use crate::backend::{MetricBackend, MetricOptions};
use crate::error::Result;

/// Options applied once when a group is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricGroupOptions {
    pub enabled: bool,
}

/// Counter/gauge/histogram emission behind a single enable flag.
///
/// A disabled group never reaches the backend. An enabled group forwards each
/// call exactly once and returns backend failures to the caller.
///
/// # Example
///
/// ```ignore
/// let jobs = MetricGroup::new(backend).configure(MetricGroupOptions { enabled: true });
/// jobs.add_to_counter("jobs.completed", 1.0, None)?;
/// ```
#[derive(Clone)]
pub struct MetricGroup {
    backend: Arc<dyn MetricBackend>,
    enabled: bool,
}

impl MetricGroup {
    /// New group, disabled until configured.
    pub fn new(backend: Arc<dyn MetricBackend>) -> Self {
        Self {
            backend,
            enabled: false,
        }
    }

    pub fn configure(mut self, options: MetricGroupOptions) -> Self {
        self.enabled = options.enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Increment a monotonic counter.
    pub fn add_to_counter(&self, name: &str, value: f64, options: Option<&MetricOptions>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.backend
            .counter(name, options.unwrap_or(&MetricOptions::default()))?
            .add(value)
    }

    /// Add a delta, positive or negative, to an up/down gauge.
    pub fn add_to_gauge(&self, name: &str, value: f64, options: Option<&MetricOptions>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.backend
            .gauge(name, options.unwrap_or(&MetricOptions::default()))?
            .add(value)
    }

    /// Record an observation in a histogram.
    pub fn add_to_histogram(
        &self,
        name: &str,
        value: f64,
        options: Option<&MetricOptions>,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.backend
            .histogram(name, options.unwrap_or(&MetricOptions::default()))?
            .record(value)
    }
}

impl std::fmt::Debug for MetricGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricGroup")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, Recorded, RecordedKind};

    fn group(enabled: bool) -> (Arc<MockBackend>, MetricGroup) {
        let backend = Arc::new(MockBackend::new());
        let group = MetricGroup::new(backend.clone()).configure(MetricGroupOptions { enabled });
        (backend, group)
    }

    #[test]
    fn test_new_group_is_disabled() {
        let backend = Arc::new(MockBackend::new());
        let group = MetricGroup::new(backend.clone());
        assert!(!group.is_enabled());

        group.add_to_counter("jobs", 1.0, None).unwrap();
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_disabled_group_never_reaches_backend() {
        let (backend, group) = group(false);
        // Even a failing backend is never touched.
        backend.set_fail_on_create(true);

        let options = MetricOptions::new().with_unit("ms");
        for value in [0.0, 1.0, -5.0, f64::MAX] {
            assert!(group.add_to_counter("jobs", value, Some(&options)).is_ok());
            assert!(group.add_to_gauge("queue", value, None).is_ok());
            assert!(group.add_to_histogram("latency", value, Some(&options)).is_ok());
        }

        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_enabled_group_delegates_once_per_call() {
        let (backend, group) = group(true);

        group.add_to_counter("jobs.completed", 2.0, None).unwrap();
        group.add_to_gauge("jobs.active", -1.0, None).unwrap();
        group.add_to_histogram("jobs.duration", 12.5, None).unwrap();

        assert_eq!(
            backend.records(),
            vec![
                Recorded {
                    kind: RecordedKind::Counter,
                    name: "jobs.completed".to_string(),
                    value: 2.0
                },
                Recorded {
                    kind: RecordedKind::Gauge,
                    name: "jobs.active".to_string(),
                    value: -1.0
                },
                Recorded {
                    kind: RecordedKind::Histogram,
                    name: "jobs.duration".to_string(),
                    value: 12.5
                },
            ]
        );
        assert_eq!(backend.lookup_count("jobs.completed"), 1);
        assert_eq!(backend.lookup_count("jobs.active"), 1);
        assert_eq!(backend.lookup_count("jobs.duration"), 1);
    }

    #[test]
    fn test_enabled_group_passes_options() {
        let (backend, group) = group(true);
        let options = MetricOptions::new()
            .with_description("Uploaded bytes")
            .with_unit("By");

        group.add_to_counter("api.upload.bytes", 1024.0, Some(&options)).unwrap();

        assert_eq!(
            backend.options_for(RecordedKind::Counter, "api.upload.bytes"),
            Some(options)
        );
    }

    #[test]
    fn test_enabled_group_propagates_backend_failure() {
        let (backend, group) = group(true);

        backend.set_fail_on_create(true);
        assert!(group.add_to_counter("jobs", 1.0, None).is_err());

        backend.set_fail_on_create(false);
        backend.set_fail_on_record(true);
        assert!(group.add_to_histogram("latency", 1.0, None).is_err());
    }
}

//! Registration of operation-sets for automatic timing.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use super::instrumented::{Instrumented, OperationSet, OperationSetDescriptor, ProbeSet};
use super::probe::OperationProbe;
use crate::backend::MetricBackend;
use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use crate::naming::is_constructor;

/// Builds timing probes for a batch of operation-sets and hands out
/// [`Instrumented`] wrappers bound to them.
///
/// Talks to the backend directly: the gate is the instrumentor's own
/// (`enabled`, `repo_metrics` and the environment kill switch), not a metric
/// group's.
pub struct Instrumentor {
    backend: Arc<dyn MetricBackend>,
    enabled: bool,
    registry: OnceLock<HashMap<&'static str, Arc<ProbeSet>>>,
}

impl Instrumentor {
    pub fn new(backend: Arc<dyn MetricBackend>, config: &TelemetryConfig) -> Self {
        Self {
            backend,
            enabled: config.instrumentation_enabled(),
            registry: OnceLock::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_set_up(&self) -> bool {
        self.registry.get().is_some()
    }

    /// Register every operation-set to be timed.
    ///
    /// Runs once per instrumentor; a second call fails with
    /// [`TelemetryError::AlreadySetUp`] and leaves the first registration in
    /// place. When instrumentation is disabled the call still counts as the
    /// setup but registers nothing, so every later wrap is a passthrough.
    pub fn setup(&self, operation_sets: &[OperationSetDescriptor]) -> Result<()> {
        let registry = if self.enabled {
            self.build_registry(operation_sets)
        } else {
            debug!("Operation instrumentation disabled; skipping setup");
            HashMap::new()
        };

        let operations: usize = registry.values().map(|probes| probes.len()).sum();
        let sets = registry.len();

        self.registry
            .set(registry)
            .map_err(|_| TelemetryError::AlreadySetUp)?;

        if self.enabled {
            info!(sets, operations, "Operation instrumentation set up");
        }
        Ok(())
    }

    /// Wrap an operation-set implementation.
    ///
    /// Sets that were not registered, or any set when instrumentation is
    /// disabled, come back as passthrough wrappers.
    pub fn wrap<T: OperationSet>(&self, inner: T) -> Instrumented<T> {
        let probes = self
            .registry
            .get()
            .and_then(|registry| registry.get(T::NAME))
            .cloned();

        if probes.is_none() && self.enabled {
            debug!(set = T::NAME, "Operation-set not registered; wrapping without timing");
        }
        Instrumented::new(inner, probes)
    }

    /// Probe registered for an operation, if any.
    pub fn probe(&self, set_name: &str, operation: &str) -> Option<Arc<OperationProbe>> {
        self.registry.get()?.get(set_name)?.get(operation).cloned()
    }

    fn build_registry(
        &self,
        operation_sets: &[OperationSetDescriptor],
    ) -> HashMap<&'static str, Arc<ProbeSet>> {
        let mut registry = HashMap::new();

        for set in operation_sets {
            if registry.contains_key(set.name) {
                warn!(set = set.name, "Operation-set registered twice; keeping the first");
                continue;
            }

            let probes: ProbeSet = set
                .operations
                .iter()
                .copied()
                .filter(|operation| !is_constructor(operation))
                .map(|operation| {
                    let probe = OperationProbe::new(set.name, operation, Arc::clone(&self.backend));
                    debug!(set = set.name, operation, metric = %probe.identity(), "Timing operation");
                    (operation, Arc::new(probe))
                })
                .collect();

            registry.insert(set.name, Arc::new(probes));
        }

        registry
    }
}

impl std::fmt::Debug for Instrumentor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentor")
            .field("enabled", &self.enabled)
            .field("set_up", &self.is_set_up())
            .finish_non_exhaustive()
    }
}

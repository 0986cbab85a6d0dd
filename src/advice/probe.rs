//! Per-operation timing state and the measurement continuation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::backend::{HistogramInstrument, MetricBackend, MetricOptions};
use crate::error::Result;
use crate::naming::{metric_description, metric_identity, DURATION_UNIT};

/// Timing probe for one operation of one operation-set.
///
/// The histogram is created on the first successful completion and reused for
/// every later one. Concurrent first completions may both ask the backend for
/// it; the backend's create-or-get contract hands back the same instrument, and
/// only the first handle is kept.
pub struct OperationProbe {
    identity: String,
    description: String,
    backend: Arc<dyn MetricBackend>,
    histogram: OnceLock<Arc<dyn HistogramInstrument>>,
}

impl OperationProbe {
    pub fn new(set_name: &str, operation: &str, backend: Arc<dyn MetricBackend>) -> Self {
        Self {
            identity: metric_identity(set_name, operation),
            description: metric_description(set_name, operation),
            backend,
            histogram: OnceLock::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the histogram has been created yet.
    pub fn is_bound(&self) -> bool {
        self.histogram.get().is_some()
    }

    /// Record one elapsed duration, in milliseconds.
    pub fn record(&self, elapsed: Duration) -> Result<()> {
        let histogram = match self.histogram.get() {
            Some(histogram) => histogram,
            None => {
                let options = MetricOptions::new()
                    .with_description(self.description.clone())
                    .with_unit(DURATION_UNIT);
                let created = self.backend.histogram(&self.identity, &options)?;
                self.histogram.get_or_init(|| created)
            }
        };
        histogram.record(elapsed.as_secs_f64() * 1000.0)
    }
}

impl std::fmt::Debug for OperationProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationProbe")
            .field("identity", &self.identity)
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}

type Measurement = (Arc<OperationProbe>, Duration);

/// Channel to the recorder thread used when no Tokio runtime is around.
static RECORDER: OnceLock<Option<mpsc::Sender<Measurement>>> = OnceLock::new();

fn recorder() -> Option<&'static mpsc::Sender<Measurement>> {
    RECORDER
        .get_or_init(|| {
            let (tx, rx) = mpsc::channel::<Measurement>();
            let spawned = thread::Builder::new()
                .name("opmeter-recorder".to_string())
                .spawn(move || {
                    for (probe, elapsed) in rx {
                        record_quietly(&probe, elapsed);
                    }
                });
            match spawned {
                Ok(_) => Some(tx),
                Err(e) => {
                    trace!(error = %e, "Recorder thread unavailable, measurements will be dropped");
                    None
                }
            }
        })
        .as_ref()
}

/// Record a completed call without holding up the caller.
///
/// Inside a Tokio runtime the measurement runs as its own task, after the
/// caller already has the result. Outside one it is handed to a dedicated
/// recorder thread. The caller's stack never touches the backend, and every
/// failure ends in [`discard`].
pub fn schedule(probe: Arc<OperationProbe>, elapsed: Duration) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                record_quietly(&probe, elapsed);
            });
        }
        Err(_) => match recorder() {
            Some(tx) => {
                if let Err(mpsc::SendError((probe, _))) = tx.send((probe, elapsed)) {
                    trace!(metric = %probe.identity(), "Recorder gone, measurement dropped");
                }
            }
            None => trace!(metric = %probe.identity(), "No recorder, measurement dropped"),
        },
    }
}

/// Record one measurement, swallowing errors and panics from the backend.
fn record_quietly(probe: &OperationProbe, elapsed: Duration) {
    match catch_unwind(AssertUnwindSafe(|| probe.record(elapsed))) {
        Ok(result) => {
            discard(probe.identity(), result);
        }
        Err(_) => {
            trace!(metric = %probe.identity(), "Discarded panic while recording duration");
        }
    }
}

/// Drop a measurement failure. Returns true if there was one.
pub fn discard(identity: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => false,
        Err(e) => {
            trace!(metric = %identity, error = %e, "Discarded measurement failure");
            true
        }
    }
}

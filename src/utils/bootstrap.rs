//! Bootstrap utilities.
//!
//! Shared initialization for processes that emit operation telemetry.

#[cfg(feature = "otel")]
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the OPMETER_LOG environment variable.
///
/// Defaults to "info" level if OPMETER_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the boot sequence.
///
/// 1. Start the metrics runtime on the configured port
/// 2. Build the telemetry facade over the runtime's backend
/// 3. Register every operation-set to be timed
///
/// When the kill switch is set the runtime exports nothing and the facade is
/// built over the global (no-op) meter, so callers need no special casing.
#[cfg(feature = "otel")]
pub async fn boot(
    config: &crate::config::Config,
    operation_sets: &[crate::advice::OperationSetDescriptor],
) -> crate::error::Result<(crate::lifecycle::MetricsRuntime, crate::telemetry::Telemetry)> {
    use crate::backend::{MetricBackend, OtelBackend};
    use crate::lifecycle::MetricsRuntime;
    use crate::telemetry::Telemetry;

    let mut runtime = MetricsRuntime::from_config(config);
    runtime.start(config.runtime.port).await?;

    let backend: Arc<dyn MetricBackend> = match runtime.backend() {
        Some(backend) => backend,
        None => Arc::new(OtelBackend::global()),
    };

    let telemetry = Telemetry::new(&config.telemetry, backend);
    if let Err(e) = telemetry.setup(operation_sets) {
        runtime.shutdown().await?;
        return Err(e);
    }

    Ok((runtime, telemetry))
}

//! Metrics runtime lifecycle.
//!
//! Starts the OpenTelemetry meter provider with a Prometheus reader and serves
//! the registry over HTTP. The runtime is an owned value with an explicit
//! state; whoever boots the process holds it and drives the transitions:
//!
//! ```text
//! Uninitialized --start--> Started --shutdown--> Shutdown --start--> Started
//! ```
//!
//! `start` while `Started` fails; `shutdown` outside `Started` is a no-op.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{
    new_view, Aggregation, Instrument, InstrumentKind, SdkMeterProvider, Stream,
};
use opentelemetry_sdk::Resource;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::otel::{OtelBackend, METER_NAME};
use crate::config::{Config, RuntimeConfig};
use crate::error::{Result, TelemetryError};
use crate::naming::DURATION_UNIT;

/// Path the Prometheus text exposition is served on.
pub const METRICS_PATH: &str = "/metrics";

/// Bucket boundaries, in milliseconds, for every duration histogram.
pub const DURATION_BUCKETS: [f64; 21] = [
    0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0,
    1000.0, 2500.0, 5000.0, 7500.0, 10000.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Started,
    Shutdown,
}

struct Exporter {
    provider: SdkMeterProvider,
    backend: Arc<OtelBackend>,
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

/// Meter provider plus exposition endpoint.
pub struct MetricsRuntime {
    config: RuntimeConfig,
    sdk_disabled: bool,
    state: LifecycleState,
    exporter: Option<Exporter>,
}

impl MetricsRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            sdk_disabled: false,
            state: LifecycleState::Uninitialized,
            exporter: None,
        }
    }

    /// Runtime for the given application config, honoring the kill switch.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.runtime.clone()).with_sdk_disabled(config.telemetry.sdk_disabled)
    }

    /// When set, `start` only records the transition: no provider, no port.
    pub fn with_sdk_disabled(mut self, disabled: bool) -> Self {
        self.sdk_disabled = disabled;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Address the endpoint is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.exporter.as_ref().map(|exporter| exporter.addr)
    }

    /// Backend bound to the running provider's meter.
    pub fn backend(&self) -> Option<Arc<OtelBackend>> {
        self.exporter
            .as_ref()
            .map(|exporter| Arc::clone(&exporter.backend))
    }

    /// Start the provider and serve metrics on `port` (0 picks a free port).
    ///
    /// Returns the bound address, or `None` when the kill switch is set.
    pub async fn start(&mut self, port: u16) -> Result<Option<SocketAddr>> {
        if self.state == LifecycleState::Started {
            return Err(TelemetryError::AlreadyStarted);
        }

        if self.sdk_disabled {
            info!("Metrics runtime disabled by environment; not exporting");
            self.state = LifecycleState::Started;
            return Ok(None);
        }

        let listener = TcpListener::bind((self.config.host.as_str(), port)).await?;
        let addr = listener.local_addr()?;

        let registry = Registry::new();
        let provider = build_provider(&self.config, &registry)?;
        global::set_meter_provider(provider.clone());
        let backend = Arc::new(OtelBackend::new(provider.meter(METER_NAME)));

        let app = Router::new()
            .route(METRICS_PATH, get(serve_metrics))
            .with_state(registry);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "Metrics endpoint failed");
            }
        });

        info!(
            address = %addr,
            service = %self.config.service_name,
            "Metrics runtime started"
        );

        self.exporter = Some(Exporter {
            provider,
            backend,
            addr,
            shutdown_tx,
            server,
        });
        self.state = LifecycleState::Started;
        Ok(Some(addr))
    }

    /// Stop the endpoint and shut down the provider.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state != LifecycleState::Started {
            return Ok(());
        }
        self.state = LifecycleState::Shutdown;

        let Some(exporter) = self.exporter.take() else {
            return Ok(());
        };

        let _ = exporter.shutdown_tx.send(());
        if let Err(e) = exporter.server.await {
            warn!(error = %e, "Metrics endpoint did not stop cleanly");
        }

        exporter
            .provider
            .shutdown()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        info!("Metrics runtime shut down");
        Ok(())
    }
}

impl std::fmt::Debug for MetricsRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRuntime")
            .field("state", &self.state)
            .field("sdk_disabled", &self.sdk_disabled)
            .field("addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

fn build_provider(config: &RuntimeConfig, registry: &Registry) -> Result<SdkMeterProvider> {
    let reader = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    let mut criteria = Instrument::new().name("*").unit(DURATION_UNIT);
    criteria.kind = Some(InstrumentKind::Histogram);
    let durations = new_view(
        criteria,
        Stream::new().aggregation(Aggregation::ExplicitBucketHistogram {
            boundaries: DURATION_BUCKETS.to_vec(),
            record_min_max: true,
        }),
    )
    .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    let resource = Resource::new([
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
    ]);

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .with_view(durations)
        .build())
}

async fn serve_metrics(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&registry.gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

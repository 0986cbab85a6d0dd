//! opmeter - operation latency telemetry
//!
//! Gated counter/gauge/histogram emission per subsystem area, plus automatic
//! duration timing for the operations of registered service and repository
//! components, exported in Prometheus text format.

pub mod advice;
pub mod backend;
pub mod config;
pub mod error;
pub mod group;
#[cfg(feature = "otel")]
pub mod lifecycle;
pub mod naming;
pub mod telemetry;
pub mod utils;

pub use advice::{Instrumented, Instrumentor, OperationSet, OperationSetDescriptor};
pub use error::{Result, TelemetryError};
pub use group::{MetricGroup, MetricGroupOptions};
#[cfg(feature = "otel")]
pub use lifecycle::{LifecycleState, MetricsRuntime};
pub use telemetry::Telemetry;

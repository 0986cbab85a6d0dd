//! Metric backend capability contract.
//!
//! Everything in this crate reaches the underlying metrics system through
//! [`MetricBackend`]: create-or-get a named instrument, then add or record a
//! value against it. Implementations must return the same instrument for the
//! same name, so callers are free to ask for it more than once.

use std::sync::Arc;

use crate::error::{Result, TelemetryError};

pub mod mock;
#[cfg(feature = "otel")]
pub mod otel;

pub use mock::{MockBackend, Recorded, RecordedKind};
#[cfg(feature = "otel")]
pub use otel::OtelBackend;

/// Instrument metadata supplied on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricOptions {
    pub description: Option<String>,
    pub unit: Option<String>,
}

impl MetricOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Monotonic counter.
pub trait CounterInstrument: Send + Sync {
    fn add(&self, value: f64) -> Result<()>;
}

/// Up/down counter, used for gauges. Accepts negative deltas.
pub trait GaugeInstrument: Send + Sync {
    fn add(&self, value: f64) -> Result<()>;
}

/// Distribution of observed values.
pub trait HistogramInstrument: Send + Sync {
    fn record(&self, value: f64) -> Result<()>;
}

/// Create-or-get access to named instruments.
pub trait MetricBackend: Send + Sync {
    fn counter(&self, name: &str, options: &MetricOptions) -> Result<Arc<dyn CounterInstrument>>;

    fn gauge(&self, name: &str, options: &MetricOptions) -> Result<Arc<dyn GaugeInstrument>>;

    fn histogram(
        &self,
        name: &str,
        options: &MetricOptions,
    ) -> Result<Arc<dyn HistogramInstrument>>;
}

/// Validate an instrument name against the OpenTelemetry naming rules.
///
/// Names start with an ASCII letter, are at most 255 characters, and contain
/// only ASCII alphanumerics and `_`, `.`, `-`, `/`.
pub fn validate_instrument_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            name.len() <= 255
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'))
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(TelemetryError::InvalidInstrumentName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_instrument_names() {
        assert!(validate_instrument_name("user.find_one.duration").is_ok());
        assert!(validate_instrument_name("api/requests-total").is_ok());
        assert!(validate_instrument_name("a").is_ok());
    }

    #[test]
    fn test_invalid_instrument_names() {
        assert!(validate_instrument_name("").is_err());
        assert!(validate_instrument_name("1st.metric").is_err());
        assert!(validate_instrument_name(".leading").is_err());
        assert!(validate_instrument_name("has space").is_err());
        assert!(validate_instrument_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_metric_options_builder() {
        let options = MetricOptions::new()
            .with_description("Jobs processed")
            .with_unit("ms");
        assert_eq!(options.description.as_deref(), Some("Jobs processed"));
        assert_eq!(options.unit.as_deref(), Some("ms"));
    }
}

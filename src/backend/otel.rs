//! OpenTelemetry metric backend.
//!
//! Instruments are built from a [`Meter`] with `f64` values and cached by
//! name, so repeated lookups hand back the same instrument. Naming follows
//! OTel conventions (dot-separated); the Prometheus exporter converts dots to
//! underscores and appends the unit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

use super::{
    validate_instrument_name, CounterInstrument, GaugeInstrument, HistogramInstrument,
    MetricBackend, MetricOptions,
};
use crate::error::{Result, TelemetryError};

/// Instrumentation scope name for every instrument this crate creates.
pub const METER_NAME: &str = "opmeter";

/// Backend over an OpenTelemetry meter.
pub struct OtelBackend {
    meter: Meter,
    counters: Mutex<HashMap<String, Arc<OtelCounter>>>,
    gauges: Mutex<HashMap<String, Arc<OtelGauge>>>,
    histograms: Mutex<HashMap<String, Arc<OtelHistogram>>>,
}

impl OtelBackend {
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            counters: Mutex::default(),
            gauges: Mutex::default(),
            histograms: Mutex::default(),
        }
    }

    /// Backend over the globally installed meter provider.
    pub fn global() -> Self {
        Self::new(global::meter(METER_NAME))
    }
}

impl MetricBackend for OtelBackend {
    fn counter(&self, name: &str, options: &MetricOptions) -> Result<Arc<dyn CounterInstrument>> {
        validate_instrument_name(name)?;
        let counter = get_or_create(&self.counters, name, || {
            let mut builder = self.meter.f64_counter(name.to_string());
            if let Some(description) = &options.description {
                builder = builder.with_description(description.clone());
            }
            if let Some(unit) = &options.unit {
                builder = builder.with_unit(unit.clone());
            }
            OtelCounter(builder.build())
        });
        Ok(counter)
    }

    fn gauge(&self, name: &str, options: &MetricOptions) -> Result<Arc<dyn GaugeInstrument>> {
        validate_instrument_name(name)?;
        let gauge = get_or_create(&self.gauges, name, || {
            let mut builder = self.meter.f64_up_down_counter(name.to_string());
            if let Some(description) = &options.description {
                builder = builder.with_description(description.clone());
            }
            if let Some(unit) = &options.unit {
                builder = builder.with_unit(unit.clone());
            }
            OtelGauge(builder.build())
        });
        Ok(gauge)
    }

    fn histogram(
        &self,
        name: &str,
        options: &MetricOptions,
    ) -> Result<Arc<dyn HistogramInstrument>> {
        validate_instrument_name(name)?;
        let histogram = get_or_create(&self.histograms, name, || {
            let mut builder = self.meter.f64_histogram(name.to_string());
            if let Some(description) = &options.description {
                builder = builder.with_description(description.clone());
            }
            if let Some(unit) = &options.unit {
                builder = builder.with_unit(unit.clone());
            }
            OtelHistogram(builder.build())
        });
        Ok(histogram)
    }
}

fn get_or_create<T>(
    cache: &Mutex<HashMap<String, Arc<T>>>,
    name: &str,
    create: impl FnOnce() -> T,
) -> Arc<T> {
    let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(
        cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(create())),
    )
}

struct OtelCounter(Counter<f64>);

impl CounterInstrument for OtelCounter {
    fn add(&self, value: f64) -> Result<()> {
        if value.is_nan() || value < 0.0 {
            return Err(TelemetryError::Backend(format!(
                "counter increment must be non-negative, got {value}"
            )));
        }
        self.0.add(value, &[]);
        Ok(())
    }
}

struct OtelGauge(UpDownCounter<f64>);

impl GaugeInstrument for OtelGauge {
    fn add(&self, value: f64) -> Result<()> {
        self.0.add(value, &[]);
        Ok(())
    }
}

struct OtelHistogram(Histogram<f64>);

impl HistogramInstrument for OtelHistogram {
    fn record(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(TelemetryError::Backend(format!(
                "histogram value must be finite, got {value}"
            )));
        }
        self.0.record(value, &[]);
        Ok(())
    }
}

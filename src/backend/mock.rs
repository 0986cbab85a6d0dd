//! In-memory metric backend for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{CounterInstrument, GaugeInstrument, HistogramInstrument, MetricBackend, MetricOptions};
use crate::error::{Result, TelemetryError};

/// Instrument kind of a recorded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordedKind {
    Counter,
    Gauge,
    Histogram,
}

/// A single value added to or recorded against an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub kind: RecordedKind,
    pub name: String,
    pub value: f64,
}

#[derive(Default)]
struct MockState {
    instruments: HashMap<(RecordedKind, String), MetricOptions>,
    lookups: Vec<(RecordedKind, String)>,
    records: Vec<Recorded>,
}

/// Mock backend that keeps every instrument lookup and value in memory.
#[derive(Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    fail_on_create: AtomicBool,
    fail_on_record: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_record(&self, fail: bool) {
        self.fail_on_record.store(fail, Ordering::SeqCst);
    }

    /// All recorded values, in order.
    pub fn records(&self) -> Vec<Recorded> {
        lock(&self.state).records.clone()
    }

    /// Recorded values for a single instrument name.
    pub fn records_for(&self, name: &str) -> Vec<Recorded> {
        lock(&self.state)
            .records
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// Number of create-or-get calls made for `name`, across all kinds.
    pub fn lookup_count(&self, name: &str) -> usize {
        lock(&self.state)
            .lookups
            .iter()
            .filter(|(_, n)| n == name)
            .count()
    }

    /// Options the instrument was first created with.
    pub fn options_for(&self, kind: RecordedKind, name: &str) -> Option<MetricOptions> {
        lock(&self.state)
            .instruments
            .get(&(kind, name.to_string()))
            .cloned()
    }

    /// Total number of calls that reached the backend (lookups and values).
    pub fn call_count(&self) -> usize {
        let state = lock(&self.state);
        state.lookups.len() + state.records.len()
    }

    /// Wait until `count` values have been recorded for `name`.
    ///
    /// Measurements from wrapped operations land on a separate task, so tests
    /// poll here instead of asserting immediately. Returns whatever was
    /// recorded once the count is reached or after one second.
    pub async fn wait_for_records(&self, name: &str, count: usize) -> Vec<Recorded> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            let records = self.records_for(name);
            if records.len() >= count || tokio::time::Instant::now() >= deadline {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn lookup(&self, kind: RecordedKind, name: &str, options: &MetricOptions) -> Result<MockInstrument> {
        let mut state = lock(&self.state);
        state.lookups.push((kind, name.to_string()));

        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(TelemetryError::Backend(format!(
                "mock refused to create {name}"
            )));
        }

        state
            .instruments
            .entry((kind, name.to_string()))
            .or_insert_with(|| options.clone());

        Ok(MockInstrument {
            kind,
            name: name.to_string(),
            state: Arc::clone(&self.state),
            fail_on_record: Arc::clone(&self.fail_on_record),
        })
    }
}

impl MetricBackend for MockBackend {
    fn counter(&self, name: &str, options: &MetricOptions) -> Result<Arc<dyn CounterInstrument>> {
        Ok(Arc::new(self.lookup(RecordedKind::Counter, name, options)?))
    }

    fn gauge(&self, name: &str, options: &MetricOptions) -> Result<Arc<dyn GaugeInstrument>> {
        Ok(Arc::new(self.lookup(RecordedKind::Gauge, name, options)?))
    }

    fn histogram(
        &self,
        name: &str,
        options: &MetricOptions,
    ) -> Result<Arc<dyn HistogramInstrument>> {
        Ok(Arc::new(self.lookup(RecordedKind::Histogram, name, options)?))
    }
}

struct MockInstrument {
    kind: RecordedKind,
    name: String,
    state: Arc<Mutex<MockState>>,
    fail_on_record: Arc<AtomicBool>,
}

impl MockInstrument {
    fn push(&self, value: f64) -> Result<()> {
        if self.fail_on_record.load(Ordering::SeqCst) {
            return Err(TelemetryError::Backend(format!(
                "mock refused to record {}",
                self.name
            )));
        }
        lock(&self.state).records.push(Recorded {
            kind: self.kind,
            name: self.name.clone(),
            value,
        });
        Ok(())
    }
}

impl CounterInstrument for MockInstrument {
    fn add(&self, value: f64) -> Result<()> {
        self.push(value)
    }
}

impl GaugeInstrument for MockInstrument {
    fn add(&self, value: f64) -> Result<()> {
        self.push(value)
    }
}

impl HistogramInstrument for MockInstrument {
    fn record(&self, value: f64) -> Result<()> {
        self.push(value)
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

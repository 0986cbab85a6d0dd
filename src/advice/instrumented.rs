//! Duration instrumentation advice.
//!
//! Wraps an operation-set implementation so each declared operation reports
//! its elapsed time, without modifying the implementation itself.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use super::probe::{schedule, OperationProbe};

/// Identity of an operation-set: its declared name and timed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSetDescriptor {
    pub name: &'static str,
    pub operations: &'static [&'static str],
}

/// A component whose operations can be timed.
///
/// Operations are registered explicitly by name; nothing is discovered.
///
/// ```ignore
/// impl OperationSet for PgUserRepository {
///     const NAME: &'static str = "UserRepository";
///     const OPERATIONS: &'static [&'static str] = &["findOne", "create"];
/// }
/// ```
pub trait OperationSet {
    const NAME: &'static str;
    const OPERATIONS: &'static [&'static str];

    fn descriptor() -> OperationSetDescriptor
    where
        Self: Sized,
    {
        OperationSetDescriptor {
            name: Self::NAME,
            operations: Self::OPERATIONS,
        }
    }
}

/// Probes for one operation-set, keyed by operation name.
pub(crate) type ProbeSet = HashMap<&'static str, Arc<OperationProbe>>;

/// Wrapper that times the operations of any operation-set implementation.
///
/// Trait impls for `Instrumented<T>` route each call through [`measure`] or
/// [`measure_async`]:
///
/// ```ignore
/// #[async_trait]
/// impl UserRepository for Instrumented<PgUserRepository> {
///     async fn find_one(&self, id: Uuid) -> Result<User> {
///         self.measure_async("findOne", |repo| repo.find_one(id)).await
///     }
/// }
/// ```
///
/// `Instrumented<T>` is not itself an [`OperationSet`], so a wrapped value
/// cannot be wrapped a second time.
///
/// [`measure`]: Instrumented::measure
/// [`measure_async`]: Instrumented::measure_async
pub struct Instrumented<T> {
    inner: T,
    probes: Option<Arc<ProbeSet>>,
}

impl<T: OperationSet> Instrumented<T> {
    pub(crate) fn new(inner: T, probes: Option<Arc<ProbeSet>>) -> Self {
        Self { inner, probes }
    }

    /// Wrap without timing anything.
    pub fn passthrough(inner: T) -> Self {
        Self::new(inner, None)
    }

    /// Get a reference to the inner implementation.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Consume the wrapper and return the inner implementation.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Descriptor of the wrapped operation-set.
    pub fn descriptor(&self) -> OperationSetDescriptor {
        T::descriptor()
    }

    /// Whether any operation of this wrapper is timed.
    pub fn is_timed(&self) -> bool {
        self.probes.as_ref().is_some_and(|probes| !probes.is_empty())
    }

    /// Probe for a declared operation, if it is timed.
    pub fn probe(&self, operation: &str) -> Option<Arc<OperationProbe>> {
        let probe = self.probes.as_ref()?.get(operation).cloned();
        if probe.is_none() {
            trace!(set = T::NAME, operation, "Operation not timed");
        }
        probe
    }

    /// Time a synchronous operation.
    ///
    /// The result is returned unchanged. An `Err` or a panic from `call`
    /// reaches the caller with nothing recorded.
    pub fn measure<R, E>(&self, operation: &str, call: impl FnOnce(&T) -> Result<R, E>) -> Result<R, E> {
        self.timed(operation, call, Result::is_ok)
    }

    /// Time a synchronous operation that cannot fail.
    ///
    /// Every return is a success; only a panic skips the measurement.
    pub fn measure_value<R>(&self, operation: &str, call: impl FnOnce(&T) -> R) -> R {
        self.timed(operation, call, |_| true)
    }

    /// Time an asynchronous operation.
    ///
    /// The clock starts when this is called, not when the returned future is
    /// first polled. The measurement is scheduled only once the operation
    /// resolves to `Ok`; an `Err`, a dropped future or one that never resolves
    /// records nothing.
    pub fn measure_async<'a, F, R, E>(
        &'a self,
        operation: &str,
        call: impl FnOnce(&'a T) -> F,
    ) -> impl Future<Output = Result<R, E>> + 'a
    where
        F: Future<Output = Result<R, E>> + 'a,
        R: 'a,
        E: 'a,
    {
        self.timed_async(operation, call, Result::is_ok)
    }

    /// Time an asynchronous operation that cannot fail.
    ///
    /// Recorded once the future resolves; a dropped future records nothing.
    pub fn measure_value_async<'a, F, R>(
        &'a self,
        operation: &str,
        call: impl FnOnce(&'a T) -> F,
    ) -> impl Future<Output = R> + 'a
    where
        F: Future<Output = R> + 'a,
        R: 'a,
    {
        self.timed_async(operation, call, |_| true)
    }

    fn timed<O>(&self, operation: &str, call: impl FnOnce(&T) -> O, succeeded: fn(&O) -> bool) -> O {
        let probe = self.probe(operation);
        let start = Instant::now();

        let outcome = call(&self.inner);

        if let Some(probe) = probe {
            if succeeded(&outcome) {
                schedule(probe, start.elapsed());
            }
        }
        outcome
    }

    fn timed_async<'a, F, O>(
        &'a self,
        operation: &str,
        call: impl FnOnce(&'a T) -> F,
        succeeded: fn(&O) -> bool,
    ) -> impl Future<Output = O> + 'a
    where
        F: Future<Output = O> + 'a,
        O: 'a,
    {
        let probe = self.probe(operation);
        let start = Instant::now();
        let pending = call(&self.inner);

        async move {
            let outcome = pending.await;
            if let Some(probe) = probe {
                if succeeded(&outcome) {
                    schedule(probe, start.elapsed());
                }
            }
            outcome
        }
    }
}

impl<T: Clone> Clone for Instrumented<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            probes: self.probes.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Instrumented<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumented")
            .field("inner", &self.inner)
            .field("timed", &self.probes.as_ref().map(|p| p.len()).unwrap_or(0))
            .finish()
    }
}

//! Aspect-oriented advice for operation timing.
//!
//! Timing is applied at service composition time, not in implementations:
//!
//! ```ignore
//! // Core implementation - pure business logic
//! let users = PgUserRepository::new(pool);
//!
//! // Register operation-sets once, then apply advice
//! telemetry.setup(&[PgUserRepository::descriptor()])?;
//! let users = telemetry.wrap(users);
//!
//! // Use as normal - timing is transparent
//! users.find_one(id).await?;
//! ```
//!
//! # Pieces
//!
//! - [`OperationSet`] - explicit list of operations a component wants timed
//! - [`Instrumentor`] - registers operation-sets and hands out wrappers
//! - [`Instrumented`] - the wrapper; routes calls through `measure`/`measure_async`
//! - [`OperationProbe`] - per-operation identity and lazily created histogram

mod instrumented;
mod instrumentor;
mod probe;

pub use instrumented::{Instrumented, OperationSet, OperationSetDescriptor};
pub use instrumentor::Instrumentor;
pub use probe::{discard, schedule, OperationProbe};

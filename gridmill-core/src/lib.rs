//! # Gridmill Core
//!
//! The job model of the gridmill cluster.
//!
//! A [`Job`] is a user submission: input data plus processor, splitter and
//! combiner callables. The master splits it into content-addressed
//! [`TaskUnit`]s, hands each to the [`MinMakespan`] scheduler to pick the
//! least-loaded worker, and feeds completed results back through the
//! [`Combiner`]. Task-unit execution and the retry state machine live on
//! [`TaskUnit::run`], which a worker calls on its private copy.

pub mod error;
pub mod heap;
pub mod id;
pub mod job;
pub mod schedule;
pub mod taskunit;

pub use error::CoreError;
pub use heap::Heap;
pub use id::{JobId, UnitId};
pub use job::{Combiner, Job, Splitter};
pub use schedule::MinMakespan;
pub use taskunit::{TaskUnit, UnitState, DEFAULT_UNIT_SIZE};

//! # Gridmill Lang
//!
//! The small expression language that gridmill jobs carry over the wire.
//!
//! A job names its processor, splitter and combiner as source text in this
//! language; a worker that has never seen the job compiles and runs them.
//! The language is deliberately tiny: literals, arithmetic, one bound
//! argument, and a fixed set of builtins (`int`, `float`, `str`, `len`,
//! `lines`, `chunks`, `sum`, `min`, `max`, `abs`). Evaluation is over JSON
//! values so unit data and results stay in the envelope data model.
//!
//! The single bound argument is addressable as `x`, `input` or `results`,
//! whichever reads best for the callable's role:
//!
//! - processor: `int(x) * int(x)`
//! - splitter: `lines(input)`
//! - combiner: `sum(results)`
//!
//! Runtime failures (`int("banana")`, division by zero) are ordinary
//! errors; on a worker they become task-unit state transitions, never
//! panics.

pub mod ast;
pub mod cache;
pub mod error;
pub mod eval;
pub mod parser;

pub use ast::{BinOp, Expr};
pub use cache::{source_digest, ProgramCache};
pub use error::LangError;
pub use eval::Program;

/// Source of the default splitter: one unit per line of the input.
pub const DEFAULT_SPLIT_SOURCE: &str = "lines(input)";
/// Source of the default combiner: numeric sum over the unit results.
pub const DEFAULT_COMBINE_SOURCE: &str = "sum(results)";

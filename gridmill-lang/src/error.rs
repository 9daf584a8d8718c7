use thiserror::Error;

/// Errors from compiling or evaluating transported source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LangError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown name '{0}'")]
    UnknownName(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{func}() expects {expected} argument(s), got {got}")]
    Arity {
        func: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("cannot cast {0} to a number")]
    Cast(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
}

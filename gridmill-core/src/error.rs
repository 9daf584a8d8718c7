use gridmill_lang::LangError;
use gridmill_proto::ProtoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("pop from an empty heap")]
    EmptyHeap,
    #[error("no workers registered with the scheduler")]
    NoWorkers,
    #[error("splitter must produce an array, got {0}")]
    SplitShape(String),
    #[error("task unit has no job id stamped")]
    UnstampedUnit,
    #[error("unknown task unit state '{0}'")]
    UnknownState(String),
    #[error("malformed content id '{0}'")]
    BadId(String),
    #[error(transparent)]
    Lang(#[from] LangError),
    #[error(transparent)]
    Proto(#[from] ProtoError),
}

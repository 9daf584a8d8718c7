use gridmill_core::CoreError;
use gridmill_proto::ProtoError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("unknown destination '{0}', register it first")]
    UnknownDestination(String),
    #[error("messenger I/O tasks are gone")]
    ChannelClosed,
    #[error("receive timed out")]
    RecvTimeout,
}

pub type NetResult<T> = Result<T, NetError>;

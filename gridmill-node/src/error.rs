use gridmill_core::CoreError;
use gridmill_net::NetError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("failed to load worker config {path}: {detail}")]
    Config { path: PathBuf, detail: String },
    #[error("cannot resolve master '{0}'")]
    Resolve(String),
}

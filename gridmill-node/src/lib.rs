//! # Gridmill Node
//!
//! The two node roles of a gridmill cluster.
//!
//! A [`Master`] ingests jobs, splits them into task units, schedules the
//! units over associated workers and combines returned results. A
//! [`Worker`] announces itself to its configured masters, executes the
//! units it receives and returns them. Both are single-threaded consumers
//! of one [`gridmill_net::Messenger`]; all I/O concurrency lives inside
//! the messenger.

pub mod config;
pub mod error;
pub mod master;
pub mod worker;

pub use config::{default_config_path, load_worker_config, MasterTarget, WorkerConfig};
pub use error::NodeError;
pub use master::{Master, WorkerEntry, UNIT_SEND_ATTRS};
pub use worker::{MasterEntry, Worker};

//! # Gridmill Net
//!
//! The reliable datagram messenger that gridmill nodes talk through.
//!
//! A [`Messenger`] owns one bound UDP socket and two I/O threads. The
//! sender thread drains an outbound queue of packed fragments; the receiver
//! thread reads datagrams, reassembles logical messages, acknowledges them
//! and hands them to the consumer through [`Messenger::recv`].
//!
//! ## Guarantees
//!
//! - **At-least-once**: every completed non-ACK message is acknowledged
//!   with its content-addressed id; senders that need delivery re-invoke
//!   the send helper until their [`Tracker`] reports `Acked`.
//! - **Duplicate suppression**: because ids are content hashes, a
//!   retransmission reproduces the same id and the receiver delivers the
//!   message once, re-ACKing the extras.
//! - **No ordering**: distinct logical messages to one destination may
//!   arrive in any order; fragments of one message may interleave with
//!   fragments of another.

pub mod error;
mod io;
pub mod messenger;
pub mod tracker;

pub use error::NetError;
pub use messenger::{Destination, Messenger, Payload};
pub use tracker::{Tracker, TrackerState, TrackerTable};

//! # Gridmill Protocol
//!
//! The wire protocol for the gridmill job-execution cluster.
//!
//! Everything that crosses the network lives here: the fixed-layout datagram
//! frame, content-addressed message ids, payload fragmentation and
//! reassembly, and the JSON envelopes that carry jobs, task units and
//! results between nodes.
//!
//! ## Architecture
//!
//! - **Framing**: a 21-byte header (`msg_id[16]`, fragment index, two
//!   reserved bytes, kind, flags) followed by up to 4096 payload bytes.
//! - **Identity**: `msg_id` is the MD5 of the message kind, the destination
//!   address and the payload, so a retransmission of the same logical
//!   message is byte-identical and the receiver deduplicates naturally.
//! - **Reassembly**: fragments arrive in any order and may be duplicated;
//!   the [`Reassembler`] glues them back together exactly once.
//!
//! This crate is pure protocol state. It performs no I/O; `gridmill-net`
//! drives it against a socket.

pub mod constants;
pub mod envelope;
pub mod error;
pub mod fragment;
pub mod frame;

pub use constants::{DEFAULT_PORT, FRAME_MAX, HEADER_SIZE, MAX_FRAGMENTS, PAYLOAD_MAX};
pub use envelope::{
    Envelope, JobEnvelope, NodeState, ResultEnvelope, StatusEnvelope, TaskUnitEnvelope,
    normalize_source,
};
pub use error::ProtoError;
pub use fragment::{Accepted, LogicalMessage, Reassembler, fragment};
pub use frame::{Frame, FrameKind, MsgId};

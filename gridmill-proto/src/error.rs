use crate::constants::{FRAME_MAX, MAX_FRAGMENTS};
use thiserror::Error;

/// Errors raised while framing, fragmenting or reassembling messages.
///
/// Framing errors are reported locally and the offending datagram is
/// discarded; none of them may take down an I/O task.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("frame of {0} bytes exceeds the {FRAME_MAX}-byte cap")]
    OversizedFrame(usize),
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    #[error("unknown frame kind {0:#04x}")]
    UnknownKind(u8),
    #[error("payload of {0} bytes needs more than {MAX_FRAGMENTS} fragments")]
    PayloadTooLarge(usize),
    #[error("fragment {0} missing from assembled message")]
    MissingFragment(u8),
    #[error("last-fragment flag on non-terminal fragment {0}")]
    NonTerminalLastFragment(u8),
    #[error("envelope error: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("envelope class mismatch: expected {expected}, got {actual}")]
    ClassMismatch {
        expected: &'static str,
        actual: String,
    },
    #[error("envelope attribute '{0}' missing or ill-typed")]
    BadAttr(&'static str),
    #[error("status payload is not a known node state")]
    InvalidStatus,
}

use crate::constants::{FLAG_LAST_FRAGMENT, FRAME_MAX, HEADER_SIZE, META_RESERVED, PAYLOAD_MAX};
use crate::error::ProtoError;
use md5::{Digest, Md5};
use std::fmt;
use std::net::SocketAddr;

/// Content-addressed identifier of a logical message.
///
/// Every fragment of one logical message carries the same id. Because the id
/// is a hash of `(kind, destination, payload)`, resending the same payload
/// to the same destination reproduces the identical id, which the receiver
/// uses for idempotent deduplication and the sender for ACK correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MsgId(pub [u8; 16]);

impl MsgId {
    pub const LEN: usize = 16;

    /// Computes the id for a logical message addressed to `dest`.
    ///
    /// The destination tuple is hashed in so identical payloads sent to two
    /// distinct destinations remain distinguishable.
    pub fn compute(kind: FrameKind, dest: SocketAddr, payload: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update((kind as u8).to_string().as_bytes());
        hasher.update(dest.ip().to_string().as_bytes());
        hasher.update(dest.port().to_string().as_bytes());
        hasher.update(payload);
        MsgId(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(MsgId(arr))
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The kind of a logical message, carried in every fragment's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    Status = 0,
    Ack = 1,
    TaskUnit = 2,
    TaskUnitResult = 3,
    Job = 4,
}

impl TryFrom<u8> for FrameKind {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, ProtoError> {
        match value {
            0 => Ok(FrameKind::Status),
            1 => Ok(FrameKind::Ack),
            2 => Ok(FrameKind::TaskUnit),
            3 => Ok(FrameKind::TaskUnitResult),
            4 => Ok(FrameKind::Job),
            other => Err(ProtoError::UnknownKind(other)),
        }
    }
}

/// One on-wire datagram: a fixed header plus at most [`PAYLOAD_MAX`] payload
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_id: MsgId,
    pub frag_index: u8,
    pub meta2: u8,
    pub meta3: u8,
    pub kind: FrameKind,
    pub flags: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(msg_id: MsgId, kind: FrameKind, frag_index: u8, last: bool, payload: Vec<u8>) -> Self {
        Frame {
            msg_id,
            frag_index,
            meta2: META_RESERVED,
            meta3: META_RESERVED,
            kind,
            flags: if last { FLAG_LAST_FRAGMENT } else { 0 },
            payload,
        }
    }

    /// Builds the single-fragment ACK for a received logical message. The
    /// payload is the 16 raw bytes of the acknowledged id.
    pub fn ack(acked: MsgId, dest: SocketAddr) -> Self {
        let payload = acked.0.to_vec();
        let msg_id = MsgId::compute(FrameKind::Ack, dest, &payload);
        Frame::new(msg_id, FrameKind::Ack, 0, true, payload)
    }

    pub fn is_last(&self) -> bool {
        self.flags & FLAG_LAST_FRAGMENT != 0
    }

    /// Packs the frame into its on-wire byte layout.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.msg_id.0);
        buf.push(self.frag_index);
        buf.push(self.meta2);
        buf.push(self.meta3);
        buf.push(self.kind as u8);
        buf.push(self.flags);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Unpacks one datagram.
    ///
    /// Buffers larger than [`FRAME_MAX`] are rejected as oversized, buffers
    /// shorter than the header as malformed, and an unrecognized kind byte
    /// is a protocol error the caller should log and drop.
    pub fn unpack(buf: &[u8]) -> Result<Frame, ProtoError> {
        if buf.len() > FRAME_MAX {
            return Err(ProtoError::OversizedFrame(buf.len()));
        }
        if buf.len() < HEADER_SIZE {
            return Err(ProtoError::MalformedFrame("shorter than the frame header"));
        }
        let msg_id = MsgId::from_slice(&buf[..MsgId::LEN])
            .ok_or(ProtoError::MalformedFrame("truncated message id"))?;
        let frag_index = buf[16];
        let meta2 = buf[17];
        let meta3 = buf[18];
        let kind = FrameKind::try_from(buf[19])?;
        let flags = buf[20];
        let payload = buf[HEADER_SIZE..].to_vec();
        debug_assert!(payload.len() <= PAYLOAD_MAX);
        Ok(Frame {
            msg_id,
            frag_index,
            meta2,
            meta3,
            kind,
            flags,
            payload,
        })
    }
}

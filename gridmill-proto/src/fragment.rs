use crate::constants::{MAX_FRAGMENTS, PAYLOAD_MAX, RECENT_COMPLETIONS, REASSEMBLY_TIMEOUT_SECS};
use crate::error::ProtoError;
use crate::frame::{Frame, FrameKind, MsgId};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::debug;

/// A fully reassembled logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalMessage {
    pub msg_id: MsgId,
    pub kind: FrameKind,
    pub payload: Vec<u8>,
}

/// Splits `payload` into at most [`MAX_FRAGMENTS`] frames of at most
/// [`PAYLOAD_MAX`] bytes each, in order, flagging the final fragment.
///
/// An empty payload still produces one (empty, flagged) fragment so that the
/// message exists on the wire.
pub fn fragment(
    kind: FrameKind,
    dest: SocketAddr,
    payload: &[u8],
) -> Result<(MsgId, SmallVec<[Frame; 4]>), ProtoError> {
    let nchunks = payload.len().div_ceil(PAYLOAD_MAX).max(1);
    if nchunks > MAX_FRAGMENTS {
        return Err(ProtoError::PayloadTooLarge(payload.len()));
    }

    let msg_id = MsgId::compute(kind, dest, payload);
    let mut frames = SmallVec::new();
    if payload.is_empty() {
        frames.push(Frame::new(msg_id, kind, 0, true, Vec::new()));
        return Ok((msg_id, frames));
    }
    for (index, chunk) in payload.chunks(PAYLOAD_MAX).enumerate() {
        let last = index == nchunks - 1;
        frames.push(Frame::new(msg_id, kind, index as u8, last, chunk.to_vec()));
    }
    Ok((msg_id, frames))
}

/// Outcome of feeding one fragment to the [`Reassembler`].
#[derive(Debug, PartialEq, Eq)]
pub enum Accepted {
    /// The fragment completed its logical message.
    Complete(LogicalMessage),
    /// The fragment was stored; the message is still incomplete. Duplicate
    /// fragments of an incomplete message land here too.
    Pending,
    /// The message was already delivered; the sender should be re-ACKed but
    /// nothing is delivered again.
    Duplicate(MsgId),
}

/// A partially received logical message.
#[derive(Debug)]
struct Partial {
    kind: FrameKind,
    /// Sparse fragment slots, grown on arrival.
    slots: Vec<Option<Vec<u8>>>,
    received: usize,
    /// Total fragment count, known once the flagged fragment arrives.
    expected: Option<usize>,
    last_activity: Instant,
}

impl Partial {
    fn is_complete(&self) -> bool {
        match self.expected {
            Some(expected) => self.received == expected,
            None => false,
        }
    }

    /// Concatenates the fragments in index order. Only valid once
    /// [`Partial::is_complete`] holds; a remaining hole is a
    /// `MissingFragment` error.
    fn assemble(self, msg_id: MsgId) -> Result<LogicalMessage, ProtoError> {
        let mut payload = Vec::with_capacity(self.slots.iter().flatten().map(Vec::len).sum());
        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(chunk) => payload.extend_from_slice(&chunk),
                None => return Err(ProtoError::MissingFragment(index as u8)),
            }
        }
        Ok(LogicalMessage {
            msg_id,
            kind: self.kind,
            payload,
        })
    }
}

/// Reassembles interleaved, reordered and duplicated fragments into logical
/// messages, delivering each message exactly once.
///
/// Incomplete entries are aged out by [`Reassembler::sweep`]; ids of
/// recently completed messages are remembered in a bounded ring so a late
/// duplicate is re-acknowledged without being redelivered.
#[derive(Debug)]
pub struct Reassembler {
    partial: HashMap<MsgId, Partial>,
    recent: VecDeque<MsgId>,
    recent_set: HashSet<MsgId>,
    timeout: Duration,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler {
            partial: HashMap::new(),
            recent: VecDeque::with_capacity(RECENT_COMPLETIONS),
            recent_set: HashSet::with_capacity(RECENT_COMPLETIONS),
            timeout: Duration::from_secs(REASSEMBLY_TIMEOUT_SECS),
        }
    }

    /// Feeds one fragment in.
    ///
    /// Ill-formed fragments (a non-terminal fragment flagged as last, an
    /// index colliding with an already-known message shape) are rejected
    /// without disturbing the partial entry they targeted.
    pub fn accept(&mut self, frame: Frame, now: Instant) -> Result<Accepted, ProtoError> {
        if self.recent_set.contains(&frame.msg_id) {
            return Ok(Accepted::Duplicate(frame.msg_id));
        }

        let msg_id = frame.msg_id;
        let index = frame.frag_index as usize;
        let entry = self.partial.entry(msg_id).or_insert_with(|| Partial {
            kind: frame.kind,
            slots: Vec::new(),
            received: 0,
            expected: None,
            last_activity: now,
        });
        entry.last_activity = now;

        if frame.is_last() {
            // The flagged fragment fixes the fragment count. A fragment
            // beyond it, or a second flagged fragment at a different index,
            // contradicts the dense-[0, N) invariant.
            if entry.slots.len() > index + 1 {
                return Err(ProtoError::NonTerminalLastFragment(frame.frag_index));
            }
            if entry.expected.is_some() && entry.expected != Some(index + 1) {
                return Err(ProtoError::NonTerminalLastFragment(frame.frag_index));
            }
            entry.expected = Some(index + 1);
        } else if let Some(expected) = entry.expected {
            if index >= expected {
                return Err(ProtoError::NonTerminalLastFragment((expected - 1) as u8));
            }
        }

        if entry.slots.len() <= index {
            entry.slots.resize(index + 1, None);
        }
        if entry.slots[index].is_some() {
            // Duplicate fragment of an incomplete message.
            return Ok(Accepted::Pending);
        }
        entry.slots[index] = Some(frame.payload);
        entry.received += 1;

        if entry.is_complete() {
            let partial = self
                .partial
                .remove(&msg_id)
                .ok_or(ProtoError::MalformedFrame("reassembly entry vanished"))?;
            let message = partial.assemble(msg_id)?;
            self.remember(msg_id);
            return Ok(Accepted::Complete(message));
        }
        Ok(Accepted::Pending)
    }

    /// Drops incomplete entries that have seen no fragment for the
    /// reassembly timeout. Returns how many were discarded.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.partial.len();
        self.partial.retain(|msg_id, entry| {
            let keep = now.saturating_duration_since(entry.last_activity) < timeout;
            if !keep {
                debug!(
                    "dropping stale reassembly entry {} ({}/{} fragments)",
                    msg_id,
                    entry.received,
                    entry
                        .expected
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "?".into())
                );
            }
            keep
        });
        before - self.partial.len()
    }

    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }

    /// Overrides the aging window (used by tests to exercise the sweep).
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn remember(&mut self, msg_id: MsgId) {
        if self.recent.len() == RECENT_COMPLETIONS {
            if let Some(evicted) = self.recent.pop_front() {
                self.recent_set.remove(&evicted);
            }
        }
        self.recent.push_back(msg_id);
        self.recent_set.insert(msg_id);
    }
}

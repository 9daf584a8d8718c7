use gridmill_proto::MsgId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Send-side state of one logical message.
///
/// `Queued` from enqueue until the last fragment leaves the socket, `Sent`
/// until the matching ACK arrives, then `Acked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Queued,
    Sent,
    Acked,
}

#[derive(Debug)]
struct Entry {
    state: TrackerState,
    in_use: bool,
}

/// The shared table of per-message trackers.
///
/// Written by senders on enqueue, promoted by the sender thread on
/// last-fragment transmit and by the receiver thread on ACK; a single lock
/// serializes the three.
#[derive(Debug, Clone, Default)]
pub struct TrackerTable {
    inner: Arc<Mutex<HashMap<MsgId, Entry>>>,
}

impl TrackerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the tracker for a freshly queued message, or reuses the
    /// existing one when the identical message was queued before — a
    /// content-addressed resend is a retransmission, not a new message.
    pub fn enqueue(&self, msg_id: MsgId, in_use: bool) {
        let mut inner = self.inner.lock();
        let entry = inner.entry(msg_id).or_insert(Entry {
            state: TrackerState::Queued,
            in_use: false,
        });
        entry.in_use |= in_use;
    }

    /// Promotes Queued to Sent. A tracker already Acked (fast peer, slow
    /// sender thread) keeps its terminal state.
    pub fn mark_sent(&self, msg_id: MsgId) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.get_mut(&msg_id) {
            if entry.state == TrackerState::Queued {
                entry.state = TrackerState::Sent;
            }
        }
    }

    /// Records an ACK. The tracker is dropped unless a caller holds it.
    /// Returns false for an ACK nobody was waiting on.
    pub fn mark_acked(&self, msg_id: MsgId) -> bool {
        let mut inner = self.inner.lock();
        let in_use = match inner.get(&msg_id) {
            Some(entry) => entry.in_use,
            None => return false,
        };
        if in_use {
            if let Some(entry) = inner.get_mut(&msg_id) {
                entry.state = TrackerState::Acked;
            }
        } else {
            inner.remove(&msg_id);
        }
        true
    }

    pub fn state_of(&self, msg_id: MsgId) -> Option<TrackerState> {
        self.inner.lock().get(&msg_id).map(|entry| entry.state)
    }

    pub fn release(&self, msg_id: MsgId) {
        self.inner.lock().remove(&msg_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// A caller-held handle on one tracked message.
#[derive(Debug)]
pub struct Tracker {
    msg_id: MsgId,
    table: TrackerTable,
}

impl Tracker {
    pub(crate) fn new(msg_id: MsgId, table: TrackerTable) -> Self {
        Tracker { msg_id, table }
    }

    pub fn msg_id(&self) -> MsgId {
        self.msg_id
    }

    /// A tracker whose entry is gone was acknowledged and cleaned up.
    pub fn state(&self) -> TrackerState {
        self.table
            .state_of(self.msg_id)
            .unwrap_or(TrackerState::Acked)
    }

    pub fn is_acked(&self) -> bool {
        self.state() == TrackerState::Acked
    }

    /// Drops the table entry; the caller is done with this message.
    pub fn release(self) {
        self.table.release(self.msg_id);
    }
}

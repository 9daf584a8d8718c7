use crate::error::{NetError, NetResult};
use crate::io::{self, OutboundFrame, IO_TIMEOUT};
use crate::tracker::{Tracker, TrackerTable};
use gridmill_core::{Job, TaskUnit};
use gridmill_proto::envelope::TASKUNIT_CLASS;
use gridmill_proto::{
    fragment, Envelope, Frame, FrameKind, JobEnvelope, LogicalMessage, MsgId, NodeState,
    ResultEnvelope, StatusEnvelope, TaskUnitEnvelope,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A typed, fully reassembled inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Status(NodeState),
    Job(JobEnvelope),
    TaskUnit(TaskUnitEnvelope),
    TaskUnitResult(ResultEnvelope),
}

/// Where a send goes: a raw address, or a name registered through
/// [`Messenger::register_destination`].
#[derive(Debug, Clone)]
pub enum Destination {
    Addr(SocketAddr),
    Name(String),
}

impl From<SocketAddr> for Destination {
    fn from(addr: SocketAddr) -> Self {
        Destination::Addr(addr)
    }
}

impl From<&str> for Destination {
    fn from(name: &str) -> Self {
        Destination::Name(name.to_string())
    }
}

impl From<String> for Destination {
    fn from(name: String) -> Self {
        Destination::Name(name)
    }
}

/// The node's connection to the rest of the cluster.
///
/// Owns the socket, the outbound and inbound queues, the tracker table and
/// the symbolic destination registry. Two I/O threads run for the life of
/// the messenger; dropping it winds them down.
pub struct Messenger {
    local_addr: SocketAddr,
    outbound_tx: mpsc::Sender<OutboundFrame>,
    inbound_rx: mpsc::Receiver<(SocketAddr, LogicalMessage)>,
    trackers: TrackerTable,
    destinations: Arc<Mutex<HashMap<String, SocketAddr>>>,
    shutdown: Arc<AtomicBool>,
}

impl Messenger {
    /// Binds `0.0.0.0:port` and starts the sender and receiver threads.
    /// Port 0 requests an ephemeral port (the submitter's mode).
    pub fn bind(port: u16) -> NetResult<Messenger> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        let local_addr = socket.local_addr()?;
        let send_socket = socket.try_clone()?;
        let recv_socket = socket;
        send_socket.set_write_timeout(Some(IO_TIMEOUT))?;
        recv_socket.set_read_timeout(Some(IO_TIMEOUT))?;

        let (outbound_tx, outbound_rx) = mpsc::channel();
        let (inbound_tx, inbound_rx) = mpsc::channel();
        let trackers = TrackerTable::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        io::spawn_sender(send_socket, outbound_rx, trackers.clone(), shutdown.clone())?;
        io::spawn_receiver(
            recv_socket,
            inbound_tx,
            outbound_tx.clone(),
            trackers.clone(),
            shutdown.clone(),
        )?;

        info!("messenger listening on {}", local_addr);
        Ok(Messenger {
            local_addr,
            outbound_tx,
            inbound_rx,
            trackers,
            destinations: Arc::new(Mutex::new(HashMap::new())),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remembers a human-readable identity for `addr`; subsequent sends may
    /// use the name instead of the raw address.
    pub fn register_destination(&self, name: &str, addr: SocketAddr) {
        debug!("registered destination '{}' at {}", name, addr);
        self.destinations.lock().insert(name.to_string(), addr);
    }

    pub fn lookup_destination(&self, name: &str) -> Option<SocketAddr> {
        self.destinations.lock().get(name).copied()
    }

    fn resolve(&self, dest: Destination) -> NetResult<SocketAddr> {
        match dest {
            Destination::Addr(addr) => Ok(addr),
            Destination::Name(name) => self
                .lookup_destination(&name)
                .ok_or(NetError::UnknownDestination(name)),
        }
    }

    /// Serializes, fragments and queues one logical message. All fragments
    /// share a tracker created (or reused, for a retransmission) in state
    /// Queued.
    fn enqueue_message(
        &self,
        kind: FrameKind,
        payload: Vec<u8>,
        dest: SocketAddr,
        track: bool,
    ) -> NetResult<Option<Tracker>> {
        let (msg_id, frames) = fragment(kind, dest, &payload)?;
        self.trackers.enqueue(msg_id, track);
        debug!(
            "queueing {:?} message {} to {} ({} fragment(s))",
            kind,
            msg_id,
            dest,
            frames.len()
        );
        for frame in frames {
            let sent_marker = if frame.is_last() { Some(msg_id) } else { None };
            self.outbound_tx
                .send(OutboundFrame {
                    dest,
                    bytes: frame.pack(),
                    sent_marker,
                })
                .map_err(|_| NetError::ChannelClosed)?;
        }
        Ok(if track {
            Some(Tracker::new(msg_id, self.trackers.clone()))
        } else {
            None
        })
    }

    pub fn send_status(
        &self,
        state: NodeState,
        dest: impl Into<Destination>,
        track: bool,
    ) -> NetResult<Option<Tracker>> {
        let addr = self.resolve(dest.into())?;
        self.enqueue_message(
            FrameKind::Status,
            StatusEnvelope(state).to_bytes(),
            addr,
            track,
        )
    }

    pub fn send_job(
        &self,
        job: &Job,
        dest: impl Into<Destination>,
        track: bool,
    ) -> NetResult<Option<Tracker>> {
        let addr = self.resolve(dest.into())?;
        let payload = job.to_envelope().to_bytes()?;
        self.enqueue_message(FrameKind::Job, payload, addr, track)
    }

    /// Sends a task unit, serializing only the allow-listed attributes.
    /// The identity attributes `id` and `job_id` are always included; the
    /// receiving worker needs them to route the result back.
    pub fn send_taskunit(
        &self,
        unit: &TaskUnit,
        dest: impl Into<Destination>,
        attrs: &[&str],
        track: bool,
    ) -> NetResult<Option<Tracker>> {
        let addr = self.resolve(dest.into())?;
        let full = unit.to_envelope()?;
        let mut map = Map::new();
        map.insert("id".into(), Value::String(full.id));
        map.insert("job_id".into(), Value::String(full.job_id));
        if attrs.contains(&"data") {
            map.insert("data".into(), full.data);
        }
        if attrs.contains(&"retries") {
            map.insert("retries".into(), Value::from(full.retries));
        }
        if attrs.contains(&"processor") {
            map.insert("processor".into(), Value::String(full.processor));
        }
        let payload = Envelope {
            class: TASKUNIT_CLASS.to_string(),
            attrs: map,
        }
        .to_bytes()?;
        self.enqueue_message(FrameKind::TaskUnit, payload, addr, track)
    }

    pub fn send_taskunit_result(
        &self,
        unit: &TaskUnit,
        dest: impl Into<Destination>,
        track: bool,
    ) -> NetResult<Option<Tracker>> {
        let addr = self.resolve(dest.into())?;
        let payload = unit.result_envelope()?.to_bytes()?;
        self.enqueue_message(FrameKind::TaskUnitResult, payload, addr, track)
    }

    /// Acknowledges a received logical message. ACKs are never themselves
    /// tracked or acknowledged.
    pub fn send_ack(&self, acked: MsgId, dest: impl Into<Destination>) -> NetResult<()> {
        let addr = self.resolve(dest.into())?;
        let ack = Frame::ack(acked, addr);
        self.outbound_tx
            .send(OutboundFrame {
                dest: addr,
                bytes: ack.pack(),
                sent_marker: None,
            })
            .map_err(|_| NetError::ChannelClosed)
    }

    /// Blocks until a fully reassembled non-ACK message is ready and yields
    /// its typed payload. Messages that fail to decode are logged and
    /// skipped.
    pub fn recv(&self) -> NetResult<(SocketAddr, Payload)> {
        loop {
            let (addr, message) = self
                .inbound_rx
                .recv()
                .map_err(|_| NetError::ChannelClosed)?;
            match decode_payload(message) {
                Ok(payload) => return Ok((addr, payload)),
                Err(err) => warn!("dropping undecodable message from {}: {}", addr, err),
            }
        }
    }

    /// Like [`Messenger::recv`] with an overall deadline.
    pub fn recv_timeout(&self, timeout: Duration) -> NetResult<(SocketAddr, Payload)> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(NetError::RecvTimeout)?;
            let (addr, message) = self.inbound_rx.recv_timeout(remaining).map_err(|err| {
                match err {
                    mpsc::RecvTimeoutError::Timeout => NetError::RecvTimeout,
                    mpsc::RecvTimeoutError::Disconnected => NetError::ChannelClosed,
                }
            })?;
            match decode_payload(message) {
                Ok(payload) => return Ok((addr, payload)),
                Err(err) => warn!("dropping undecodable message from {}: {}", addr, err),
            }
        }
    }

    pub fn trackers(&self) -> &TrackerTable {
        &self.trackers
    }
}

impl Drop for Messenger {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn decode_payload(message: LogicalMessage) -> NetResult<Payload> {
    match message.kind {
        FrameKind::Status => Ok(Payload::Status(
            StatusEnvelope::from_bytes(&message.payload)?.0,
        )),
        FrameKind::Job => Ok(Payload::Job(JobEnvelope::from_bytes(&message.payload)?)),
        FrameKind::TaskUnit => Ok(Payload::TaskUnit(TaskUnitEnvelope::from_bytes(
            &message.payload,
        )?)),
        FrameKind::TaskUnitResult => Ok(Payload::TaskUnitResult(ResultEnvelope::from_bytes(
            &message.payload,
        )?)),
        // The receiver thread consumes ACKs; one here is a logic error.
        FrameKind::Ack => Err(NetError::Proto(gridmill_proto::ProtoError::UnknownKind(
            FrameKind::Ack as u8,
        ))),
    }
}

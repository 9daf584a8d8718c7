//! The messenger's two I/O threads.
//!
//! Both loops are bounded waits: the sender blocks on the outbound channel
//! and retries a timed-out socket write, the receiver blocks on a timed
//! `recv_from` whose timeout doubles as the reassembly-GC tick. Framing and
//! protocol errors are logged and never terminate a thread.

use crate::tracker::TrackerTable;
use gridmill_proto::{Accepted, Frame, FrameKind, LogicalMessage, MsgId, Reassembler, FRAME_MAX};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Socket read/write timeout; bounds every blocking I/O wait.
pub(crate) const IO_TIMEOUT: Duration = Duration::from_secs(1);

/// One packed fragment on its way out.
pub(crate) struct OutboundFrame {
    pub dest: SocketAddr,
    pub bytes: Vec<u8>,
    /// Set on the last fragment of a logical message: promote this tracker
    /// to Sent once the write succeeds.
    pub sent_marker: Option<MsgId>,
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

pub(crate) fn spawn_sender(
    socket: UdpSocket,
    outbound_rx: mpsc::Receiver<OutboundFrame>,
    trackers: TrackerTable,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("gridmill-sender".into())
        .spawn(move || sender_loop(socket, outbound_rx, trackers, shutdown))
}

fn sender_loop(
    socket: UdpSocket,
    outbound_rx: mpsc::Receiver<OutboundFrame>,
    trackers: TrackerTable,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        let frame = match outbound_rx.recv_timeout(IO_TIMEOUT) {
            Ok(frame) => frame,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                continue;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            match socket.send_to(&frame.bytes, frame.dest) {
                Ok(_) => break,
                Err(err) if is_timeout(err.kind()) => {
                    trace!("send to {} not yet writable, retrying", frame.dest);
                }
                Err(err) => {
                    // Dropped on the floor; at-least-once delivery is the
                    // caller's resend plus the receiver's dedup.
                    warn!("dropping fragment for {}: {}", frame.dest, err);
                    break;
                }
            }
        }
        if let Some(msg_id) = frame.sent_marker {
            trackers.mark_sent(msg_id);
        }
    }
    debug!("sender thread exiting");
}

pub(crate) fn spawn_receiver(
    socket: UdpSocket,
    inbound_tx: mpsc::Sender<(SocketAddr, LogicalMessage)>,
    outbound_tx: mpsc::Sender<OutboundFrame>,
    trackers: TrackerTable,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("gridmill-receiver".into())
        .spawn(move || receiver_loop(socket, inbound_tx, outbound_tx, trackers, shutdown))
}

fn receiver_loop(
    socket: UdpSocket,
    inbound_tx: mpsc::Sender<(SocketAddr, LogicalMessage)>,
    outbound_tx: mpsc::Sender<OutboundFrame>,
    trackers: TrackerTable,
    shutdown: Arc<AtomicBool>,
) {
    let mut reassembler = Reassembler::new();
    let mut buf = [0u8; FRAME_MAX];
    let mut last_sweep = Instant::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        match socket.recv_from(&mut buf) {
            Ok((len, addr)) => match Frame::unpack(&buf[..len]) {
                Ok(frame) => {
                    if !handle_frame(
                        frame,
                        addr,
                        &mut reassembler,
                        &inbound_tx,
                        &outbound_tx,
                        &trackers,
                    ) {
                        break;
                    }
                }
                Err(err) => warn!("discarding datagram from {}: {}", addr, err),
            },
            Err(err) if is_timeout(err.kind()) => {}
            Err(err) => {
                error!("receive error: {}", err);
                thread::sleep(Duration::from_millis(50));
            }
        }
        if last_sweep.elapsed() >= IO_TIMEOUT {
            let now = Instant::now();
            let dropped = reassembler.sweep(now);
            if dropped > 0 {
                debug!("reassembly sweep dropped {} stale entries", dropped);
            }
            last_sweep = now;
        }
    }
    debug!("receiver thread exiting");
}

/// Processes one unpacked frame. Returns false when the consumer side is
/// gone and the thread should exit.
fn handle_frame(
    frame: Frame,
    addr: SocketAddr,
    reassembler: &mut Reassembler,
    inbound_tx: &mpsc::Sender<(SocketAddr, LogicalMessage)>,
    outbound_tx: &mpsc::Sender<OutboundFrame>,
    trackers: &TrackerTable,
) -> bool {
    // ACKs are always single-fragment: resolve the tracker directly.
    if frame.kind == FrameKind::Ack {
        match MsgId::from_slice(&frame.payload) {
            Some(acked) => {
                if trackers.mark_acked(acked) {
                    trace!("message {} acknowledged by {}", acked, addr);
                } else {
                    debug!("stray ACK for {} from {}", acked, addr);
                }
            }
            None => warn!("malformed ACK payload from {}", addr),
        }
        return true;
    }

    match reassembler.accept(frame, Instant::now()) {
        Ok(Accepted::Complete(message)) => {
            let msg_id = message.msg_id;
            if inbound_tx.send((addr, message)).is_err() {
                return false;
            }
            send_ack(outbound_tx, msg_id, addr)
        }
        Ok(Accepted::Duplicate(msg_id)) => {
            // Already delivered; the sender evidently missed our ACK.
            debug!("re-acknowledging duplicate message {} from {}", msg_id, addr);
            send_ack(outbound_tx, msg_id, addr)
        }
        Ok(Accepted::Pending) => true,
        Err(err) => {
            warn!("discarding fragment from {}: {}", addr, err);
            true
        }
    }
}

fn send_ack(
    outbound_tx: &mpsc::Sender<OutboundFrame>,
    acked: MsgId,
    dest: SocketAddr,
) -> bool {
    let ack = Frame::ack(acked, dest);
    outbound_tx
        .send(OutboundFrame {
            dest,
            bytes: ack.pack(),
            sent_marker: None,
        })
        .is_ok()
}

use gridmill_proto::{fragment, Accepted, FrameKind, ProtoError, Reassembler, PAYLOAD_MAX};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

fn dest() -> SocketAddr {
    "192.168.1.20:33310".parse().unwrap()
}

fn payload_of(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_single_fragment_roundtrip() {
    let now = Instant::now();
    let payload = b"one small message".to_vec();
    let (msg_id, frames) = fragment(FrameKind::Status, dest(), &payload).unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_last());

    let mut reassembler = Reassembler::new();
    match reassembler.accept(frames[0].clone(), now).unwrap() {
        Accepted::Complete(msg) => {
            assert_eq!(msg.msg_id, msg_id);
            assert_eq!(msg.kind, FrameKind::Status);
            assert_eq!(msg.payload, payload);
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

#[test]
fn test_fragment_sizes_and_flags() {
    let payload = payload_of(PAYLOAD_MAX * 2 + 100);
    let (_, frames) = fragment(FrameKind::Job, dest(), &payload).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].payload.len(), PAYLOAD_MAX);
    assert_eq!(frames[1].payload.len(), PAYLOAD_MAX);
    assert_eq!(frames[2].payload.len(), 100);
    assert!(!frames[0].is_last());
    assert!(!frames[1].is_last());
    assert!(frames[2].is_last());
    assert_eq!(frames[0].frag_index, 0);
    assert_eq!(frames[2].frag_index, 2);
}

#[test]
fn test_empty_payload_still_produces_a_fragment() {
    let (_, frames) = fragment(FrameKind::Status, dest(), &[]).unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_last());
    assert!(frames[0].payload.is_empty());
}

#[test]
fn test_payload_too_large() {
    let payload = vec![0u8; PAYLOAD_MAX * 257];
    assert!(matches!(
        fragment(FrameKind::Job, dest(), &payload),
        Err(ProtoError::PayloadTooLarge(_))
    ));
}

#[test]
fn test_out_of_order_reassembly() {
    let now = Instant::now();
    let payload = payload_of(PAYLOAD_MAX * 3);
    let (_, frames) = fragment(FrameKind::Job, dest(), &payload).unwrap();

    let mut reassembler = Reassembler::new();
    // Deliver last first, then the middle, then the head.
    assert_eq!(
        reassembler.accept(frames[2].clone(), now).unwrap(),
        Accepted::Pending
    );
    assert_eq!(
        reassembler.accept(frames[1].clone(), now).unwrap(),
        Accepted::Pending
    );
    match reassembler.accept(frames[0].clone(), now).unwrap() {
        Accepted::Complete(msg) => assert_eq!(msg.payload, payload),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[test]
fn test_interleaved_messages() {
    let now = Instant::now();
    let payload_a = payload_of(PAYLOAD_MAX + 1);
    let payload_b = payload_of(PAYLOAD_MAX * 2 + 7);
    let (id_a, frames_a) = fragment(FrameKind::Job, dest(), &payload_a).unwrap();
    let (id_b, frames_b) =
        fragment(FrameKind::Job, "192.168.1.21:33310".parse().unwrap(), &payload_b).unwrap();
    assert_ne!(id_a, id_b);

    let mut reassembler = Reassembler::new();
    let mut completed = Vec::new();
    let interleaved = [
        frames_b[0].clone(),
        frames_a[0].clone(),
        frames_b[2].clone(),
        frames_a[1].clone(),
        frames_b[1].clone(),
    ];
    for frame in interleaved {
        if let Accepted::Complete(msg) = reassembler.accept(frame, now).unwrap() {
            completed.push(msg);
        }
    }
    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0].payload, payload_a);
    assert_eq!(completed[1].payload, payload_b);
}

#[test]
fn test_duplicate_fragment_is_ignored() {
    let now = Instant::now();
    let payload = payload_of(PAYLOAD_MAX + 50);
    let (_, frames) = fragment(FrameKind::TaskUnit, dest(), &payload).unwrap();

    let mut reassembler = Reassembler::new();
    assert_eq!(
        reassembler.accept(frames[0].clone(), now).unwrap(),
        Accepted::Pending
    );
    assert_eq!(
        reassembler.accept(frames[0].clone(), now).unwrap(),
        Accepted::Pending
    );
    match reassembler.accept(frames[1].clone(), now).unwrap() {
        Accepted::Complete(msg) => assert_eq!(msg.payload, payload),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[test]
fn test_duplicate_message_reported_once() {
    let now = Instant::now();
    let payload = payload_of(PAYLOAD_MAX + 50);
    let (msg_id, frames) = fragment(FrameKind::TaskUnitResult, dest(), &payload).unwrap();

    let mut reassembler = Reassembler::new();
    let mut completions = 0;
    for frame in frames.iter().cloned() {
        if let Accepted::Complete(_) = reassembler.accept(frame, now).unwrap() {
            completions += 1;
        }
    }
    assert_eq!(completions, 1);

    // Every fragment delivered a second time: no re-delivery, only
    // duplicate notices so the caller can re-ACK.
    for frame in frames.iter().cloned() {
        assert_eq!(
            reassembler.accept(frame, now).unwrap(),
            Accepted::Duplicate(msg_id)
        );
    }
}

#[test]
fn test_last_flag_on_non_terminal_fragment() {
    let now = Instant::now();
    let payload = payload_of(PAYLOAD_MAX * 3);
    let (_, frames) = fragment(FrameKind::Job, dest(), &payload).unwrap();

    let mut reassembler = Reassembler::new();
    reassembler.accept(frames[2].clone(), now).unwrap();

    // A second flagged fragment claiming a smaller count contradicts the
    // already-known shape.
    let mut rogue = frames[1].clone();
    rogue.flags |= 0x01;
    assert!(matches!(
        reassembler.accept(rogue, now),
        Err(ProtoError::NonTerminalLastFragment(_))
    ));

    // The entry survives the rogue datagram.
    reassembler.accept(frames[0].clone(), now).unwrap();
    match reassembler.accept(frames[1].clone(), now).unwrap() {
        Accepted::Complete(msg) => assert_eq!(msg.payload, payload),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[test]
fn test_sweep_drops_stale_entries() {
    let now = Instant::now();
    let payload = payload_of(PAYLOAD_MAX * 2);
    let (_, frames) = fragment(FrameKind::Job, dest(), &payload).unwrap();

    let mut reassembler = Reassembler::new();
    reassembler.set_timeout(Duration::from_millis(10));
    reassembler.accept(frames[0].clone(), now).unwrap();
    assert_eq!(reassembler.pending_len(), 1);

    assert_eq!(reassembler.sweep(now), 0);
    assert_eq!(reassembler.sweep(now + Duration::from_millis(20)), 1);
    assert_eq!(reassembler.pending_len(), 0);
}

use gridmill_proto::{
    normalize_source, JobEnvelope, NodeState, ProtoError, ResultEnvelope, StatusEnvelope,
    TaskUnitEnvelope,
};
use serde_json::json;

#[test]
fn test_job_envelope_roundtrip() {
    let env = JobEnvelope {
        job_id: "d41d8cd98f00b204e9800998ecf8427e".into(),
        input_data: json!("1\n2\n3"),
        processor: "int(x) * int(x)".into(),
        splitter: "lines(input)".into(),
        combiner: "sum(results)".into(),
        retries: 1,
    };
    let bytes = env.to_bytes().unwrap();
    let decoded = JobEnvelope::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, env);
}

#[test]
fn test_job_envelope_wire_shape() {
    let env = JobEnvelope {
        job_id: "aa".repeat(16),
        input_data: json!("2\n"),
        processor: "int(x)".into(),
        splitter: "lines(input)".into(),
        combiner: "sum(results)".into(),
        retries: 0,
    };
    let value: serde_json::Value = serde_json::from_slice(&env.to_bytes().unwrap()).unwrap();
    assert_eq!(value["class"], "gridmill.Job");
    assert_eq!(value["attrs"]["processor"], "int(x)");
    assert_eq!(value["attrs"]["input_data"], "2\n");
}

#[test]
fn test_taskunit_envelope_roundtrip() {
    let env = TaskUnitEnvelope {
        id: "b".repeat(32),
        job_id: "c".repeat(32),
        data: json!("42"),
        retries: 2,
        processor: "int(x)".into(),
    };
    let bytes = env.to_bytes().unwrap();
    assert_eq!(TaskUnitEnvelope::from_bytes(&bytes).unwrap(), env);
}

#[test]
fn test_result_envelope_roundtrip() {
    let env = ResultEnvelope {
        id: "b".repeat(32),
        job_id: "c".repeat(32),
        state: "COMPLETED".into(),
        result: Some(json!(4)),
    };
    let bytes = env.to_bytes().unwrap();
    assert_eq!(ResultEnvelope::from_bytes(&bytes).unwrap(), env);
}

#[test]
fn test_result_envelope_null_result() {
    let env = ResultEnvelope {
        id: "b".repeat(32),
        job_id: "c".repeat(32),
        state: "BAILED".into(),
        result: None,
    };
    let bytes = env.to_bytes().unwrap();
    let decoded = ResultEnvelope::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.result, None);
    assert_eq!(decoded.state, "BAILED");
}

#[test]
fn test_class_mismatch_rejected() {
    let bytes = br#"{"class": "gridmill.Imposter", "attrs": {}}"#;
    assert!(matches!(
        JobEnvelope::from_bytes(bytes),
        Err(ProtoError::ClassMismatch { .. })
    ));
}

#[test]
fn test_missing_attr_rejected() {
    let bytes = br#"{"class": "gridmill.Job", "attrs": {"job_id": "aa"}}"#;
    assert!(matches!(
        JobEnvelope::from_bytes(bytes),
        Err(ProtoError::BadAttr(_))
    ));
}

#[test]
fn test_status_roundtrip() {
    for state in [
        NodeState::Up,
        NodeState::Ready,
        NodeState::Working,
        NodeState::Dormant,
        NodeState::Dead,
    ] {
        let bytes = StatusEnvelope(state).to_bytes();
        assert_eq!(StatusEnvelope::from_bytes(&bytes).unwrap().0, state);
    }
    assert_eq!(StatusEnvelope(NodeState::Up).to_bytes(), b"0".to_vec());
}

#[test]
fn test_status_rejects_out_of_range() {
    assert!(StatusEnvelope::from_bytes(b"9").is_err());
    assert!(StatusEnvelope::from_bytes(b"banana").is_err());
    assert!(StatusEnvelope::from_bytes(&[0xFF, 0xFE]).is_err());
}

#[test]
fn test_normalize_source_strips_common_indent() {
    let source = "    int(x)\n      + len(x)";
    assert_eq!(normalize_source(source), "int(x)\n  + len(x)");
}

#[test]
fn test_normalize_source_trims_surrounding_whitespace() {
    assert_eq!(normalize_source("\n\n   sum(results)   \n"), "sum(results)");
    assert_eq!(normalize_source("int(x)"), "int(x)");
}

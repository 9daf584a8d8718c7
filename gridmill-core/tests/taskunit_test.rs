use gridmill_core::{JobId, TaskUnit, UnitId, UnitState};
use gridmill_lang::ProgramCache;
use serde_json::json;

#[test]
fn test_unit_id_is_deterministic() {
    let a = UnitId::compute(&json!("2"), "int(x) * int(x)");
    let b = UnitId::compute(&json!("2"), "int(x) * int(x)");
    assert_eq!(a, b);

    let c = UnitId::compute(&json!("3"), "int(x) * int(x)");
    let d = UnitId::compute(&json!("2"), "int(x)");
    assert_ne!(a, c);
    assert_ne!(a, d);
}

#[test]
fn test_unit_id_hex_roundtrip() {
    let id = UnitId::compute(&json!("payload"), "int(x)");
    let text = id.to_string();
    assert_eq!(text.len(), 32);
    assert_eq!(UnitId::parse(&text).unwrap(), id);
    assert!(UnitId::parse("zz").is_err());
}

#[test]
fn test_run_success() {
    let mut cache = ProgramCache::new();
    let mut unit = TaskUnit::new(json!("2"), "int(x) * int(x)");
    unit.run(&mut cache);
    assert_eq!(unit.state, UnitState::Completed);
    assert_eq!(unit.result, Some(json!(4)));
}

#[test]
fn test_run_failure_consumes_a_retry() {
    let mut cache = ProgramCache::new();
    let mut unit = TaskUnit::new(json!("banana"), "int(x)");
    unit.retries = 1;
    unit.run(&mut cache);
    assert_eq!(unit.state, UnitState::Failed);
    assert_eq!(unit.retries, 0);
    assert_eq!(unit.result, None);
}

#[test]
fn test_run_bails_when_retries_exhausted() {
    let mut cache = ProgramCache::new();
    let mut unit = TaskUnit::new(json!("banana"), "int(x)");
    unit.run(&mut cache);
    assert_eq!(unit.state, UnitState::Bailed);
    assert_eq!(unit.retries, 0);
}

#[test]
fn test_run_survives_uncompilable_processor() {
    let mut cache = ProgramCache::new();
    let mut unit = TaskUnit::new(json!("2"), "((((");
    unit.run(&mut cache);
    assert_eq!(unit.state, UnitState::Bailed);
}

#[test]
fn test_envelope_roundtrip() {
    let mut unit = TaskUnit::new(json!("7"), "int(x)");
    unit.job_id = Some(JobId::compute(&json!("7"), "int(x)", "s", "c"));
    unit.retries = 2;

    let envelope = unit.to_envelope().unwrap();
    let back = TaskUnit::from_envelope(envelope).unwrap();
    assert_eq!(back.id, unit.id);
    assert_eq!(back.job_id, unit.job_id);
    assert_eq!(back.data, unit.data);
    assert_eq!(back.processor, unit.processor);
    assert_eq!(back.retries, 2);
    assert_eq!(back.state, UnitState::Pending);
}

#[test]
fn test_unstamped_unit_has_no_envelope() {
    let unit = TaskUnit::new(json!("7"), "int(x)");
    assert!(unit.to_envelope().is_err());
    assert!(unit.result_envelope().is_err());
}

#[test]
fn test_result_envelope_carries_terminal_state() {
    let mut cache = ProgramCache::new();
    let mut unit = TaskUnit::new(json!("3"), "int(x)");
    unit.job_id = Some(JobId::compute(&json!("3"), "int(x)", "s", "c"));
    unit.run(&mut cache);

    let envelope = unit.result_envelope().unwrap();
    assert_eq!(envelope.state, "COMPLETED");
    assert_eq!(envelope.result, Some(json!(3)));
}

#[test]
fn test_state_parse_roundtrip() {
    for state in [
        UnitState::Defined,
        UnitState::Pending,
        UnitState::Running,
        UnitState::Failed,
        UnitState::Bailed,
        UnitState::Refused,
        UnitState::Completed,
    ] {
        assert_eq!(UnitState::parse(state.as_str()).unwrap(), state);
    }
    assert!(UnitState::parse("HALTED").is_err());
    assert!(UnitState::Completed.is_terminal());
    assert!(UnitState::Bailed.is_terminal());
    assert!(!UnitState::Failed.is_terminal());
}

#[test]
fn test_processor_source_is_normalized() {
    let unit = TaskUnit::new(json!("2"), "    int(x) * int(x)  ");
    assert_eq!(unit.processor, "int(x) * int(x)");
    // Normalization happens before hashing, so differently indented copies
    // of the same processor share an id.
    let other = TaskUnit::new(json!("2"), "int(x) * int(x)");
    assert_eq!(unit.id, other.id);
}

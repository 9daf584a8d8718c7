use gridmill_core::{Combiner, Job, Splitter, UnitState};
use gridmill_lang::ProgramCache;
use serde_json::json;

#[test]
fn test_default_split_one_unit_per_line() {
    let mut cache = ProgramCache::new();
    let job = Job::new(json!("1\n2\n3"), "int(x)", None, None, 0);
    let units = job.split(&mut cache).unwrap();
    assert_eq!(units.len(), 3);
    assert_eq!(units[0].data, json!("1"));
    assert_eq!(units[2].data, json!("3"));
    for unit in &units {
        assert_eq!(unit.job_id, Some(job.id));
        assert_eq!(unit.processor, "int(x)");
        assert_eq!(unit.size, 1);
        assert_eq!(unit.state, UnitState::Defined);
    }
}

#[test]
fn test_trailing_newline_does_not_add_a_unit() {
    let mut cache = ProgramCache::new();
    let job = Job::new(json!("2\n"), "int(x) * int(x)", None, None, 0);
    let units = job.split(&mut cache).unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].data, json!("2"));
}

#[test]
fn test_unit_ids_unique_within_job() {
    let mut cache = ProgramCache::new();
    let job = Job::new(json!("1\n2\n3\n4"), "int(x)", None, None, 0);
    let units = job.split(&mut cache).unwrap();
    let mut ids: Vec<_> = units.iter().map(|u| u.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), units.len());
}

#[test]
fn test_custom_chunk_splitter() {
    let mut cache = ProgramCache::new();
    let input: String = "a".repeat(10_000);
    let job = Job::new(
        json!(input),
        "len(x)",
        Some(Splitter::custom("chunks(input, 4096)")),
        None,
        0,
    );
    let units = job.split(&mut cache).unwrap();
    assert_eq!(units.len(), 3);
    assert_eq!(units[0].data, json!("a".repeat(4096)));
    assert_eq!(units[2].data, json!("a".repeat(10_000 - 2 * 4096)));
}

#[test]
fn test_split_rejects_non_array_result() {
    let mut cache = ProgramCache::new();
    let job = Job::new(
        json!("whatever"),
        "int(x)",
        Some(Splitter::custom("len(input)")),
        None,
        0,
    );
    assert!(job.split(&mut cache).is_err());
}

#[test]
fn test_retries_stamped_on_units() {
    let mut cache = ProgramCache::new();
    let job = Job::new(json!("1\n2"), "int(x)", None, None, 3);
    let units = job.split(&mut cache).unwrap();
    assert!(units.iter().all(|u| u.retries == 3));
}

#[test]
fn test_job_id_covers_all_content() {
    let base = Job::new(json!("in"), "int(x)", None, None, 0);
    let other_input = Job::new(json!("out"), "int(x)", None, None, 0);
    let other_proc = Job::new(json!("in"), "len(x)", None, None, 0);
    let other_split = Job::new(
        json!("in"),
        "int(x)",
        Some(Splitter::custom("chunks(input, 2)")),
        None,
        0,
    );
    let other_comb = Job::new(
        json!("in"),
        "int(x)",
        None,
        Some(Combiner::custom("max(results)")),
        0,
    );
    assert_ne!(base.id, other_input.id);
    assert_ne!(base.id, other_proc.id);
    assert_ne!(base.id, other_split.id);
    assert_ne!(base.id, other_comb.id);
}

#[test]
fn test_envelope_roundtrip_preserves_identity() {
    let job = Job::new(json!("1\n2\n3"), "int(x) * int(x)", None, None, 1);
    let envelope = job.to_envelope();
    let back = Job::from_envelope(envelope).unwrap();
    assert_eq!(back.id, job.id);
    assert_eq!(back.input_data, job.input_data);
    assert_eq!(back.processor, job.processor);
    assert_eq!(back.splitter.source, job.splitter.source);
    assert_eq!(back.combiner.source, job.combiner.source);
    assert_eq!(back.retries, 1);
}

#[test]
fn test_default_combiner_sums_completed_results() {
    let mut cache = ProgramCache::new();
    let job = Job::new(json!("1\n2\n3"), "int(x)", None, None, 0);
    let mut combiner = job.combiner.clone();
    let mut units = job.split(&mut cache).unwrap();
    for unit in &mut units {
        unit.run(&mut cache);
    }
    combiner.add_taskunits(units);
    assert_eq!(combiner.combine(&mut cache).unwrap(), json!(6));
}

#[test]
fn test_combiner_skips_units_without_results() {
    let mut cache = ProgramCache::new();
    let job = Job::new(json!("1\nbad\n3"), "int(x)", None, None, 0);
    let mut combiner = job.combiner.clone();
    let mut units = job.split(&mut cache).unwrap();
    for unit in &mut units {
        unit.run(&mut cache);
    }
    // The "bad" unit bailed with no result; the sum covers the survivors.
    assert_eq!(
        units.iter().filter(|u| u.state == UnitState::Bailed).count(),
        1
    );
    combiner.add_taskunits(units);
    assert_eq!(combiner.combine(&mut cache).unwrap(), json!(4));
}

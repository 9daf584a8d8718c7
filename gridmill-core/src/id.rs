//! Content-addressed identifiers for jobs and task units.

use crate::error::CoreError;
use md5::{Digest, Md5};
use serde_json::Value;
use std::fmt;

/// Canonical byte rendering of a data value for hashing: strings hash as
/// their raw utf-8, everything else as its compact JSON encoding.
fn value_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

fn parse_hex_id(text: &str) -> Result<[u8; 16], CoreError> {
    let bytes = hex::decode(text).map_err(|_| CoreError::BadId(text.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| CoreError::BadId(text.to_string()))
}

/// Identifier of a task unit: MD5 over its data and its processor source.
///
/// Deterministic, so a re-split of the same job reproduces the same unit
/// ids and a worker that has already seen a unit can recognize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub [u8; 16]);

impl UnitId {
    pub fn compute(data: &Value, processor_source: &str) -> Self {
        let mut hasher = Md5::new();
        hasher.update(value_bytes(data));
        hasher.update(processor_source.as_bytes());
        UnitId(hasher.finalize().into())
    }

    pub fn parse(text: &str) -> Result<Self, CoreError> {
        parse_hex_id(text).map(UnitId)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Identifier of a job: MD5 over its input data and the source of its
/// processor, splitter and combiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub [u8; 16]);

impl JobId {
    pub fn compute(
        input_data: &Value,
        processor_source: &str,
        splitter_source: &str,
        combiner_source: &str,
    ) -> Self {
        let mut hasher = Md5::new();
        hasher.update(value_bytes(input_data));
        hasher.update(processor_source.as_bytes());
        hasher.update(splitter_source.as_bytes());
        hasher.update(combiner_source.as_bytes());
        JobId(hasher.finalize().into())
    }

    pub fn parse(text: &str) -> Result<Self, CoreError> {
        parse_hex_id(text).map(JobId)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

//! Self-describing JSON envelopes.
//!
//! Every code-bearing entity crosses the wire as
//! `{ "class": <name>, "attrs": { ... } }`. Attribute values are JSON
//! scalars, arrays, objects, or source text for a callable in the gridmill
//! expression language. The receiver reconstructs the typed object from the
//! attrs it knows about; unknown attrs are preserved by the generic
//! [`Envelope`] and ignored by the typed decoders.

use crate::error::ProtoError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope class for jobs.
pub const JOB_CLASS: &str = "gridmill.Job";
/// Envelope class for task units in both directions.
pub const TASKUNIT_CLASS: &str = "gridmill.TaskUnit";

/// The generic wire form of any serialized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub class: String,
    pub attrs: Map<String, Value>,
}

impl Envelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn expect_class(self, expected: &'static str) -> Result<Map<String, Value>, ProtoError> {
        if self.class != expected {
            return Err(ProtoError::ClassMismatch {
                expected,
                actual: self.class,
            });
        }
        Ok(self.attrs)
    }
}

fn take_str(attrs: &mut Map<String, Value>, name: &'static str) -> Result<String, ProtoError> {
    match attrs.remove(name) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(ProtoError::BadAttr(name)),
    }
}

fn take_value(attrs: &mut Map<String, Value>, name: &'static str) -> Result<Value, ProtoError> {
    attrs.remove(name).ok_or(ProtoError::BadAttr(name))
}

/// A job as submitted to a master.
///
/// The callables travel as normalized source text; `job_id` is the hex
/// content hash over the four content fields, recomputed and validated by
/// the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEnvelope {
    pub job_id: String,
    pub input_data: Value,
    pub processor: String,
    pub splitter: String,
    pub combiner: String,
    /// Retry budget stamped onto every unit the job splits into.
    pub retries: u32,
}

impl JobEnvelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        let mut attrs = Map::new();
        attrs.insert("job_id".into(), Value::String(self.job_id.clone()));
        attrs.insert("input_data".into(), self.input_data.clone());
        attrs.insert("processor".into(), Value::String(self.processor.clone()));
        attrs.insert("splitter".into(), Value::String(self.splitter.clone()));
        attrs.insert("combiner".into(), Value::String(self.combiner.clone()));
        if self.retries > 0 {
            attrs.insert("retries".into(), Value::from(self.retries));
        }
        Envelope {
            class: JOB_CLASS.into(),
            attrs,
        }
        .to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut attrs = Envelope::from_bytes(bytes)?.expect_class(JOB_CLASS)?;
        Ok(JobEnvelope {
            job_id: take_str(&mut attrs, "job_id")?,
            input_data: take_value(&mut attrs, "input_data")?,
            processor: take_str(&mut attrs, "processor")?,
            splitter: take_str(&mut attrs, "splitter")?,
            combiner: take_str(&mut attrs, "combiner")?,
            retries: attrs
                .remove("retries")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        })
    }
}

/// A task unit on its way from master to worker. Only the allow-listed
/// attributes are present; the worker needs nothing else to execute it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUnitEnvelope {
    pub id: String,
    pub job_id: String,
    pub data: Value,
    pub retries: u32,
    pub processor: String,
}

impl TaskUnitEnvelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        let mut attrs = Map::new();
        attrs.insert("id".into(), Value::String(self.id.clone()));
        attrs.insert("job_id".into(), Value::String(self.job_id.clone()));
        attrs.insert("data".into(), self.data.clone());
        attrs.insert("retries".into(), Value::from(self.retries));
        attrs.insert("processor".into(), Value::String(self.processor.clone()));
        Envelope {
            class: TASKUNIT_CLASS.into(),
            attrs,
        }
        .to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut attrs = Envelope::from_bytes(bytes)?.expect_class(TASKUNIT_CLASS)?;
        Ok(TaskUnitEnvelope {
            id: take_str(&mut attrs, "id")?,
            job_id: take_str(&mut attrs, "job_id")?,
            data: take_value(&mut attrs, "data")?,
            retries: attrs
                .remove("retries")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            processor: take_str(&mut attrs, "processor")?,
        })
    }
}

/// A terminal task unit on its way back from worker to master.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope {
    pub id: String,
    pub job_id: String,
    pub state: String,
    pub result: Option<Value>,
}

impl ResultEnvelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        let mut attrs = Map::new();
        attrs.insert("id".into(), Value::String(self.id.clone()));
        attrs.insert("job_id".into(), Value::String(self.job_id.clone()));
        attrs.insert("state".into(), Value::String(self.state.clone()));
        attrs.insert(
            "result".into(),
            self.result.clone().unwrap_or(Value::Null),
        );
        Envelope {
            class: TASKUNIT_CLASS.into(),
            attrs,
        }
        .to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut attrs = Envelope::from_bytes(bytes)?.expect_class(TASKUNIT_CLASS)?;
        let result = match attrs.remove("result") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        };
        Ok(ResultEnvelope {
            id: take_str(&mut attrs, "id")?,
            job_id: take_str(&mut attrs, "job_id")?,
            state: take_str(&mut attrs, "state")?,
            result,
        })
    }
}

/// The lifecycle state a node announces in a Status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeState {
    Up = 0,
    Ready = 1,
    Working = 2,
    Dormant = 3,
    Dead = 4,
}

impl TryFrom<u8> for NodeState {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, ProtoError> {
        match value {
            0 => Ok(NodeState::Up),
            1 => Ok(NodeState::Ready),
            2 => Ok(NodeState::Working),
            3 => Ok(NodeState::Dormant),
            4 => Ok(NodeState::Dead),
            _ => Err(ProtoError::InvalidStatus),
        }
    }
}

/// Status payloads are the utf-8 decimal rendering of the state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEnvelope(pub NodeState);

impl StatusEnvelope {
    pub fn to_bytes(&self) -> Vec<u8> {
        (self.0 as u8).to_string().into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtoError::InvalidStatus)?;
        let value: u8 = text.trim().parse().map_err(|_| ProtoError::InvalidStatus)?;
        Ok(StatusEnvelope(NodeState::try_from(value)?))
    }
}

/// Normalizes callable source text before hashing or emission: strips the
/// common leading indentation so the defining line begins at column 1, then
/// trims surrounding whitespace.
pub fn normalize_source(source: &str) -> String {
    let indent = source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let stripped: Vec<&str> = source
        .lines()
        .map(|line| {
            if line.len() >= indent {
                &line[indent..]
            } else {
                line.trim_start()
            }
        })
        .collect();
    stripped.join("\n").trim().to_string()
}

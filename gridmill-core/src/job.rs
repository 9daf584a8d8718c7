use crate::error::CoreError;
use crate::id::{JobId, UnitId};
use crate::taskunit::TaskUnit;
use gridmill_lang::{ProgramCache, DEFAULT_COMBINE_SOURCE, DEFAULT_SPLIT_SOURCE};
use gridmill_proto::envelope::JOB_CLASS;
use gridmill_proto::{normalize_source, JobEnvelope};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Splits a job's input into task-unit data values.
///
/// The split callable evaluates the job input to an array; each element
/// becomes one unit. The default splits textual input on newline
/// boundaries, one unit per line.
#[derive(Debug, Clone, PartialEq)]
pub struct Splitter {
    pub source: String,
}

impl Default for Splitter {
    fn default() -> Self {
        Splitter {
            source: DEFAULT_SPLIT_SOURCE.to_string(),
        }
    }
}

impl Splitter {
    pub fn custom(source: &str) -> Self {
        Splitter {
            source: normalize_source(source),
        }
    }

    pub fn split(
        &self,
        input_data: &Value,
        processor: &str,
        retries: u32,
        cache: &mut ProgramCache,
    ) -> Result<Vec<TaskUnit>, CoreError> {
        let program = cache.get_or_compile(JOB_CLASS, "splitter", &self.source)?;
        let pieces = match program.eval(input_data)? {
            Value::Array(items) => items,
            other => return Err(CoreError::SplitShape(other.to_string())),
        };
        Ok(pieces
            .into_iter()
            .map(|data| {
                let mut unit = TaskUnit::new(data, processor);
                unit.retries = retries;
                unit
            })
            .collect())
    }
}

/// Reduces completed unit results into the final artifact.
///
/// The default sums numeric results; the combine callable must be
/// order-insensitive because results return in arbitrary order.
#[derive(Debug, Clone, PartialEq)]
pub struct Combiner {
    pub source: String,
    taskunits: Vec<TaskUnit>,
}

impl Default for Combiner {
    fn default() -> Self {
        Combiner {
            source: DEFAULT_COMBINE_SOURCE.to_string(),
            taskunits: Vec::new(),
        }
    }
}

impl Combiner {
    pub fn custom(source: &str) -> Self {
        Combiner {
            source: normalize_source(source),
            taskunits: Vec::new(),
        }
    }

    pub fn add_taskunit(&mut self, unit: TaskUnit) {
        self.taskunits.push(unit);
    }

    pub fn add_taskunits<I: IntoIterator<Item = TaskUnit>>(&mut self, units: I) {
        self.taskunits.extend(units);
    }

    pub fn taskunits(&self) -> &[TaskUnit] {
        &self.taskunits
    }

    /// Runs the combine callable over the collected unit results.
    pub fn combine(&self, cache: &mut ProgramCache) -> Result<Value, CoreError> {
        let results: Vec<Value> = self
            .taskunits
            .iter()
            .filter_map(|unit| unit.result.clone())
            .collect();
        let program = cache.get_or_compile(JOB_CLASS, "combiner", &self.source)?;
        Ok(program.eval(&Value::Array(results))?)
    }
}

/// A user submission: input data plus the three callables, and — once
/// ingested by a master — the authoritative table of its task units.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub input_data: Value,
    /// Normalized processor source, stamped onto every unit.
    pub processor: String,
    pub splitter: Splitter,
    pub combiner: Combiner,
    /// Retry budget stamped onto every unit.
    pub retries: u32,
    pub taskunits: HashMap<UnitId, TaskUnit>,
    /// Units not yet in a terminal state.
    pub pending_count: usize,
}

impl Job {
    pub fn new(
        input_data: Value,
        processor_source: &str,
        splitter: Option<Splitter>,
        combiner: Option<Combiner>,
        retries: u32,
    ) -> Self {
        let processor = normalize_source(processor_source);
        let splitter = splitter.unwrap_or_default();
        let combiner = combiner.unwrap_or_default();
        let id = JobId::compute(&input_data, &processor, &splitter.source, &combiner.source);
        Job {
            id,
            input_data,
            processor,
            splitter,
            combiner,
            retries,
            taskunits: HashMap::new(),
            pending_count: 0,
        }
    }

    /// Splits the input into units stamped with this job's id and retry
    /// budget. Recording them in `taskunits` is the master's business.
    pub fn split(&self, cache: &mut ProgramCache) -> Result<Vec<TaskUnit>, CoreError> {
        let mut units =
            self.splitter
                .split(&self.input_data, &self.processor, self.retries, cache)?;
        for unit in &mut units {
            unit.job_id = Some(self.id);
        }
        Ok(units)
    }

    pub fn to_envelope(&self) -> JobEnvelope {
        JobEnvelope {
            job_id: self.id.to_string(),
            input_data: self.input_data.clone(),
            processor: self.processor.clone(),
            splitter: self.splitter.source.clone(),
            combiner: self.combiner.source.clone(),
            retries: self.retries,
        }
    }

    /// Reconstructs a job from the wire, recomputing and validating its id.
    /// A mismatched id is logged and the recomputed value wins.
    pub fn from_envelope(envelope: JobEnvelope) -> Result<Self, CoreError> {
        let job = Job::new(
            envelope.input_data,
            &envelope.processor,
            Some(Splitter::custom(&envelope.splitter)),
            Some(Combiner::custom(&envelope.combiner)),
            envelope.retries,
        );
        if !envelope.job_id.is_empty() && envelope.job_id != job.id.to_string() {
            warn!(
                "job id mismatch: sender claimed {}, content hashes to {}",
                envelope.job_id, job.id
            );
        }
        Ok(job)
    }
}

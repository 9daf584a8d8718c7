use crate::error::CoreError;
use crate::id::{JobId, UnitId};
use gridmill_lang::ProgramCache;
use gridmill_proto::envelope::TASKUNIT_CLASS;
use gridmill_proto::{normalize_source, ResultEnvelope, TaskUnitEnvelope};
use serde_json::Value;
use tracing::{debug, warn};

/// Default scheduling weight of a unit.
pub const DEFAULT_UNIT_SIZE: u64 = 1;

/// Lifecycle of a task unit.
///
/// `Defined` on creation at the master, `Pending` once it is on its way to
/// or queued at a worker, `Running` while the processor executes, then one
/// of the terminal-ish outcomes. Only `Completed` and `Bailed` are terminal
/// for the job's pending count; `Failed` means a retry is still possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Defined,
    Pending,
    Running,
    Failed,
    Bailed,
    Refused,
    Completed,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Defined => "DEFINED",
            UnitState::Pending => "PENDING",
            UnitState::Running => "RUNNING",
            UnitState::Failed => "FAILED",
            UnitState::Bailed => "BAILED",
            UnitState::Refused => "REFUSED",
            UnitState::Completed => "COMPLETED",
        }
    }

    pub fn parse(text: &str) -> Result<Self, CoreError> {
        match text {
            "DEFINED" => Ok(UnitState::Defined),
            "PENDING" => Ok(UnitState::Pending),
            "RUNNING" => Ok(UnitState::Running),
            "FAILED" => Ok(UnitState::Failed),
            "BAILED" => Ok(UnitState::Bailed),
            "REFUSED" => Ok(UnitState::Refused),
            "COMPLETED" => Ok(UnitState::Completed),
            other => Err(CoreError::UnknownState(other.to_string())),
        }
    }

    /// Terminal states for the purposes of a job's pending count.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Completed | UnitState::Bailed)
    }
}

/// The smallest independently-executable work item.
///
/// The master owns the authoritative copy inside its [`crate::Job`]; a
/// worker owns a transient copy only for the duration of execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUnit {
    pub id: UnitId,
    pub job_id: Option<JobId>,
    pub data: Value,
    /// Normalized processor source.
    pub processor: String,
    pub state: UnitState,
    pub result: Option<Value>,
    /// Retries still allowed after a failure.
    pub retries: u32,
    /// Scheduling weight.
    pub size: u64,
}

impl TaskUnit {
    pub fn new(data: Value, processor_source: &str) -> Self {
        let processor = normalize_source(processor_source);
        let id = UnitId::compute(&data, &processor);
        TaskUnit {
            id,
            job_id: None,
            data,
            processor,
            state: UnitState::Defined,
            result: None,
            retries: 0,
            size: DEFAULT_UNIT_SIZE,
        }
    }

    /// Executes the processor on this unit's data.
    ///
    /// Success stores the result and completes the unit. Any failure —
    /// compile or runtime — consumes a retry and leaves the unit `Failed`,
    /// or `Bailed` when the retry budget was already spent. Errors never
    /// escape; the caller returns the unit to the master either way.
    pub fn run(&mut self, cache: &mut ProgramCache) {
        self.state = UnitState::Running;
        let outcome = cache
            .get_or_compile(TASKUNIT_CLASS, "processor", &self.processor)
            .and_then(|program| program.eval(&self.data));
        match outcome {
            Ok(result) => {
                debug!("taskunit {} completed", self.id);
                self.result = Some(result);
                self.state = UnitState::Completed;
            }
            Err(err) => {
                warn!("taskunit {} failed: {}", self.id, err);
                if self.retries == 0 {
                    self.state = UnitState::Bailed;
                } else {
                    self.retries -= 1;
                    self.state = UnitState::Failed;
                }
            }
        }
    }

    /// The master→worker wire form.
    pub fn to_envelope(&self) -> Result<TaskUnitEnvelope, CoreError> {
        let job_id = self.job_id.ok_or(CoreError::UnstampedUnit)?;
        Ok(TaskUnitEnvelope {
            id: self.id.to_string(),
            job_id: job_id.to_string(),
            data: self.data.clone(),
            retries: self.retries,
            processor: self.processor.clone(),
        })
    }

    /// Reconstructs a unit from the master→worker wire form.
    pub fn from_envelope(envelope: TaskUnitEnvelope) -> Result<Self, CoreError> {
        Ok(TaskUnit {
            id: UnitId::parse(&envelope.id)?,
            job_id: Some(JobId::parse(&envelope.job_id)?),
            data: envelope.data,
            processor: envelope.processor,
            state: UnitState::Pending,
            result: None,
            retries: envelope.retries,
            size: DEFAULT_UNIT_SIZE,
        })
    }

    /// The worker→master wire form: identity, terminal state and result.
    pub fn result_envelope(&self) -> Result<ResultEnvelope, CoreError> {
        let job_id = self.job_id.ok_or(CoreError::UnstampedUnit)?;
        Ok(ResultEnvelope {
            id: self.id.to_string(),
            job_id: job_id.to_string(),
            state: self.state.as_str().to_string(),
            result: self.result.clone(),
        })
    }
}

use crate::error::NodeError;
use gridmill_core::{Job, JobId, MinMakespan, TaskUnit, UnitId, UnitState};
use gridmill_lang::ProgramCache;
use gridmill_net::{Messenger, NetError, Payload};
use gridmill_proto::{JobEnvelope, NodeState, ResultEnvelope};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attribute allow-list for master→worker task unit sends: everything a
/// worker needs to execute the unit, nothing it does not.
pub const UNIT_SEND_ATTRS: &[&str] = &["id", "data", "retries", "processor"];

const IDLE_TICK: Duration = Duration::from_secs(60);

/// A worker as the master sees it.
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub addr: SocketAddr,
    pub hostname: String,
    /// Accumulated scheduling load.
    pub load: u64,
}

/// The node that ingests jobs, assigns task units and combines results.
///
/// Owns the authoritative [`Job`] table; workers only ever hold transient
/// copies of single units. The master is a plain event loop over its
/// messenger — no internal threads beyond the messenger's I/O pair.
pub struct Master {
    messenger: Messenger,
    jobs: HashMap<JobId, Job>,
    workers: Vec<WorkerEntry>,
    scheduler: MinMakespan,
    /// Jobs that arrived before any worker associated.
    deferred: VecDeque<Job>,
    artifacts: HashMap<JobId, Value>,
    artifact_dir: PathBuf,
    cache: ProgramCache,
}

impl Master {
    pub fn bind(port: u16) -> Result<Master, NodeError> {
        let messenger = Messenger::bind(port)?;
        Ok(Master {
            messenger,
            jobs: HashMap::new(),
            workers: Vec::new(),
            scheduler: MinMakespan::new(),
            deferred: VecDeque::new(),
            artifacts: HashMap::new(),
            artifact_dir: PathBuf::from("."),
            cache: ProgramCache::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.messenger.local_addr()
    }

    /// Directory completed-job artifacts are written to. Defaults to the
    /// working directory.
    pub fn set_artifact_dir(&mut self, dir: impl Into<PathBuf>) {
        self.artifact_dir = dir.into();
    }

    pub fn jobs(&self) -> &HashMap<JobId, Job> {
        &self.jobs
    }

    pub fn workers(&self) -> &[WorkerEntry] {
        &self.workers
    }

    pub fn scheduler(&self) -> &MinMakespan {
        &self.scheduler
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// The combined artifact of a completed job.
    pub fn artifact(&self, job_id: &JobId) -> Option<&Value> {
        self.artifacts.get(job_id)
    }

    /// Serves inbound messages forever.
    pub fn run(&mut self) -> Result<(), NodeError> {
        info!("master up on {}", self.local_addr());
        loop {
            self.step(IDLE_TICK)?;
        }
    }

    /// Processes at most one inbound message; Ok(false) when the wait
    /// timed out with nothing to do.
    pub fn step(&mut self, timeout: Duration) -> Result<bool, NodeError> {
        match self.messenger.recv_timeout(timeout) {
            Ok((from, payload)) => {
                self.handle(from, payload);
                Ok(true)
            }
            Err(NetError::RecvTimeout) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// The per-message state machine. Malformed or unexpected messages are
    /// logged and dropped; they never stop the master.
    pub fn handle(&mut self, from: SocketAddr, payload: Payload) {
        match payload {
            Payload::Status(state) => self.on_status(from, state),
            Payload::Job(envelope) => self.on_job(from, envelope),
            Payload::TaskUnitResult(envelope) => self.on_result(from, envelope),
            Payload::TaskUnit(_) => {
                warn!("master received a task unit from {}; dropping", from);
            }
        }
    }

    fn on_status(&mut self, from: SocketAddr, state: NodeState) {
        if state != NodeState::Up {
            debug!("status {:?} from {}", state, from);
            return;
        }
        if self.workers.iter().any(|w| w.addr == from) {
            debug!("worker {} re-announced", from);
            return;
        }
        let hostname = format!("worker@{}", from);
        self.messenger.register_destination(&hostname, from);
        self.scheduler.add_machine(1);
        self.workers.push(WorkerEntry {
            addr: from,
            hostname,
            load: 0,
        });
        info!("worker {} associated ({} total)", from, self.workers.len());
        self.drain_deferred();
    }

    fn drain_deferred(&mut self) {
        while let Some(job) = self.deferred.pop_front() {
            let id = job.id;
            info!("resuming deferred job {}", id);
            if let Err(err) = self.ingest(job) {
                warn!("deferred job {} failed to ingest: {}", id, err);
            }
        }
    }

    fn on_job(&mut self, from: SocketAddr, envelope: JobEnvelope) {
        let job = match Job::from_envelope(envelope) {
            Ok(job) => job,
            Err(err) => {
                warn!("undecodable job from {}: {}", from, err);
                return;
            }
        };
        if self.jobs.contains_key(&job.id) {
            debug!("job {} resubmitted; ignoring", job.id);
            return;
        }
        info!("ingesting job {} from {}", job.id, from);
        if self.workers.is_empty() {
            info!("no workers associated; deferring job {}", job.id);
            self.deferred.push_back(job);
            return;
        }
        if let Err(err) = self.ingest(job) {
            warn!("job ingestion failed: {}", err);
        }
    }

    /// Splits a job and sends every unit to the least-loaded worker.
    fn ingest(&mut self, mut job: Job) -> Result<(), NodeError> {
        let units = job.split(&mut self.cache)?;
        info!("job {} split into {} task unit(s)", job.id, units.len());
        for mut unit in units {
            unit.state = UnitState::Pending;
            job.pending_count += 1;
            self.assign(&unit)?;
            job.taskunits.insert(unit.id, unit);
        }
        let job_id = job.id;
        let empty = job.pending_count == 0;
        self.jobs.insert(job_id, job);
        if empty {
            // A splitter may legitimately produce nothing; the combiner
            // then runs over an empty collection.
            self.complete_job(job_id);
        }
        Ok(())
    }

    /// Schedules one unit and ships it.
    fn assign(&mut self, unit: &TaskUnit) -> Result<(), NodeError> {
        let machine = self.scheduler.schedule(unit)?;
        let entry = &mut self.workers[machine];
        entry.load += unit.size;
        debug!("unit {} -> {}", unit.id, entry.hostname);
        let addr = entry.addr;
        self.messenger
            .send_taskunit(unit, addr, UNIT_SEND_ATTRS, false)?;
        Ok(())
    }

    fn on_result(&mut self, from: SocketAddr, envelope: ResultEnvelope) {
        let (job_id, unit_id, state) = match (
            JobId::parse(&envelope.job_id),
            UnitId::parse(&envelope.id),
            UnitState::parse(&envelope.state),
        ) {
            (Ok(job_id), Ok(unit_id), Ok(state)) => (job_id, unit_id, state),
            _ => {
                warn!("malformed result from {}; dropping", from);
                return;
            }
        };
        let job = match self.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => {
                warn!("result for unknown job {} from {}", job_id, from);
                return;
            }
        };
        let unit = match job.taskunits.get_mut(&unit_id) {
            Some(unit) => unit,
            None => {
                warn!("result for unknown unit {} of job {}", unit_id, job_id);
                return;
            }
        };
        if unit.state.is_terminal() {
            debug!("duplicate result for finished unit {}; ignoring", unit_id);
            return;
        }

        let mut resend: Option<TaskUnit> = None;
        match state {
            UnitState::Completed => {
                unit.result = envelope.result;
                unit.state = UnitState::Completed;
                job.pending_count -= 1;
                debug!(
                    "unit {} completed on {} ({} still pending)",
                    unit_id, from, job.pending_count
                );
            }
            UnitState::Bailed => {
                unit.result = envelope.result;
                unit.state = UnitState::Bailed;
                job.pending_count -= 1;
                warn!("unit {} bailed on {}", unit_id, from);
            }
            UnitState::Failed => {
                if unit.retries > 0 {
                    // Mirror the worker's decrement, then push the unit
                    // back through the scheduler.
                    unit.retries -= 1;
                    unit.state = UnitState::Pending;
                    info!(
                        "unit {} failed on {}; rescheduling ({} retries left)",
                        unit_id, from, unit.retries
                    );
                    resend = Some(unit.clone());
                } else {
                    warn!("unit {} failed with no retries left; bailing", unit_id);
                    unit.state = UnitState::Bailed;
                    job.pending_count -= 1;
                }
            }
            UnitState::Refused => {
                if envelope.result.is_some() {
                    // A refusing worker that still knows the answer: take it.
                    unit.result = envelope.result;
                    unit.state = UnitState::Completed;
                    job.pending_count -= 1;
                    info!("unit {} refused by {} but carried a result", unit_id, from);
                } else {
                    warn!("unit {} refused by {} with no result; bailing", unit_id, from);
                    unit.state = UnitState::Bailed;
                    job.pending_count -= 1;
                }
            }
            other => {
                warn!(
                    "unexpected result state {:?} for unit {}; dropping",
                    other, unit_id
                );
                return;
            }
        }

        let done = job.pending_count == 0;
        if let Some(unit) = resend {
            if let Err(err) = self.assign(&unit) {
                warn!("failed to reschedule unit {}: {}", unit.id, err);
            }
        }
        if done {
            self.complete_job(job_id);
        }
    }

    /// Runs the combiner over the completed units and writes the artifact.
    fn complete_job(&mut self, job_id: JobId) {
        let job = match self.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => return,
        };
        let completed: Vec<TaskUnit> = job
            .taskunits
            .values()
            .filter(|unit| unit.state == UnitState::Completed)
            .cloned()
            .collect();
        job.combiner.add_taskunits(completed);
        let artifact = match job.combiner.combine(&mut self.cache) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!("combiner for job {} failed: {}", job_id, err);
                return;
            }
        };

        let path = self.artifact_dir.join(format!("result_{}.json", job_id));
        match serde_json::to_string_pretty(&artifact) {
            Ok(rendered) => {
                if let Err(err) = fs::write(&path, rendered) {
                    warn!("cannot write artifact for job {}: {}", job_id, err);
                } else {
                    info!("job {} complete; artifact at {}", job_id, path.display());
                }
            }
            Err(err) => warn!("cannot render artifact for job {}: {}", job_id, err),
        }
        self.artifacts.insert(job_id, artifact);
    }
}

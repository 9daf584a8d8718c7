use crate::config::WorkerConfig;
use crate::error::NodeError;
use gridmill_core::{TaskUnit, UnitId, UnitState};
use gridmill_lang::ProgramCache;
use gridmill_net::{Messenger, NetError, Payload};
use gridmill_proto::{NodeState, TaskUnitEnvelope};
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cadence of association re-announcements.
const ASSOCIATE_INTERVAL: Duration = Duration::from_secs(10);

const IDLE_TICK: Duration = Duration::from_secs(60);

/// A master as the worker sees it.
#[derive(Debug, Clone)]
pub struct MasterEntry {
    pub hostname: String,
    pub addr: SocketAddr,
    pub associated: bool,
}

/// The node that executes task units.
///
/// On startup it resolves its configured masters and associates with each
/// one; afterwards it is a plain execute-and-return loop over its
/// messenger.
pub struct Worker {
    messenger: Messenger,
    masters: Vec<MasterEntry>,
    cache: ProgramCache,
    associate_interval: Duration,
}

impl Worker {
    pub fn bind(port: u16, config: &WorkerConfig) -> Result<Worker, NodeError> {
        let messenger = Messenger::bind(port)?;
        let mut masters = Vec::with_capacity(config.masters.len());
        for target in &config.masters {
            let addr = target.resolve()?;
            messenger.register_destination(&target.hostname, addr);
            masters.push(MasterEntry {
                hostname: target.hostname.clone(),
                addr,
                associated: false,
            });
        }
        Ok(Worker {
            messenger,
            masters,
            cache: ProgramCache::new(),
            associate_interval: ASSOCIATE_INTERVAL,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.messenger.local_addr()
    }

    pub fn masters(&self) -> &[MasterEntry] {
        &self.masters
    }

    /// Shrinks the re-announcement cadence (tests; the wire default is
    /// ten seconds).
    pub fn set_associate_interval(&mut self, interval: Duration) {
        self.associate_interval = interval;
    }

    /// Announces STATUS(UP) to every configured master, re-sending on a
    /// fixed cadence until each announcement is acknowledged.
    ///
    /// The re-send reuses the content-addressed message id, so a master
    /// that already heard us simply re-ACKs.
    pub fn associate(&mut self) -> Result<(), NodeError> {
        for index in 0..self.masters.len() {
            let (hostname, addr) = {
                let entry = &self.masters[index];
                (entry.hostname.clone(), entry.addr)
            };
            info!("associating with master {} at {}", hostname, addr);
            let tracker = match self.messenger.send_status(NodeState::Up, addr, true)? {
                Some(tracker) => tracker,
                None => continue,
            };
            while !tracker.is_acked() {
                thread::sleep(self.associate_interval);
                if tracker.is_acked() {
                    break;
                }
                debug!("master {} has not acknowledged; re-announcing", hostname);
                self.messenger.send_status(NodeState::Up, addr, false)?;
            }
            tracker.release();
            self.masters[index].associated = true;
            info!("associated with master {}", hostname);
        }
        Ok(())
    }

    /// Associates, then serves task units forever.
    pub fn run(&mut self) -> Result<(), NodeError> {
        self.associate()?;
        info!("worker up on {}", self.local_addr());
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

    pub fn handle(&mut self, from: SocketAddr, payload: Payload) {
        match payload {
            Payload::TaskUnit(envelope) => self.on_taskunit(from, envelope),
            Payload::Status(state) => debug!("status {:?} from {}", state, from),
            other => warn!("worker cannot handle {:?} from {}; dropping", other, from),
        }
    }

    /// Reconstructs, executes and returns one task unit. Execution failure
    /// is a state transition, never a crash; the unit goes back to the
    /// sender in every terminal state.
    fn on_taskunit(&mut self, from: SocketAddr, envelope: TaskUnitEnvelope) {
        let mut unit = match TaskUnit::from_envelope(envelope) {
            Ok(unit) => unit,
            Err(err) => {
                warn!("undecodable task unit from {}: {}", from, err);
                return;
            }
        };
        // A unit whose id does not match its content is refused unrun.
        let expected = UnitId::compute(&unit.data, &unit.processor);
        if unit.id != expected {
            warn!(
                "unit {} from {} hashes to {}; refusing",
                unit.id, from, expected
            );
            unit.state = UnitState::Refused;
        } else {
            info!("executing unit {} from {}", unit.id, from);
            unit.run(&mut self.cache);
        }
        if let Err(err) = self.messenger.send_taskunit_result(&unit, from, false) {
            warn!("failed to return unit {} to {}: {}", unit.id, from, err);
        }
    }
}

//! Min-makespan list scheduling.

use crate::error::CoreError;
use crate::heap::Heap;
use crate::id::UnitId;
use crate::taskunit::TaskUnit;

fn load_key(entry: &(usize, u64)) -> u64 {
    entry.1
}

type LoadHeap = Heap<(usize, u64), fn(&(usize, u64)) -> u64>;

/// The 2-approximation list scheduler for Q||C_max: every arriving unit
/// goes to the machine with the smallest current load.
///
/// Tie-break is whichever machine the heap surfaces first — deterministic
/// for a given insertion history, but not otherwise specified.
pub struct MinMakespan {
    speeds: Vec<u64>,
    loads: Vec<u64>,
    assignments: Vec<Vec<UnitId>>,
    loads_heap: LoadHeap,
}

impl Default for MinMakespan {
    fn default() -> Self {
        Self::new()
    }
}

impl MinMakespan {
    pub fn new() -> Self {
        MinMakespan {
            speeds: Vec::new(),
            loads: Vec::new(),
            assignments: Vec::new(),
            loads_heap: Heap::new(load_key as fn(&(usize, u64)) -> u64, false),
        }
    }

    pub fn machines(&self) -> usize {
        self.speeds.len()
    }

    /// Registers a new machine with zero load.
    pub fn add_machine(&mut self, speed: u64) {
        let machine = self.speeds.len();
        self.speeds.push(speed);
        self.loads.push(0);
        self.assignments.push(Vec::new());
        self.loads_heap.push((machine, 0));
    }

    /// Assigns `unit` to the least-loaded machine and credits the machine
    /// with the unit's size. Fails when no machine is registered.
    pub fn schedule(&mut self, unit: &TaskUnit) -> Result<usize, CoreError> {
        let (machine, load) = self.loads_heap.pop().map_err(|_| CoreError::NoWorkers)?;
        let new_load = load + unit.size;
        self.assignments[machine].push(unit.id);
        self.loads[machine] = new_load;
        self.loads_heap.push((machine, new_load));
        Ok(machine)
    }

    pub fn assignments(&self, machine: usize) -> &[UnitId] {
        &self.assignments[machine]
    }

    pub fn loads(&self) -> &[u64] {
        &self.loads
    }
}

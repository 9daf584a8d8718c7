use gridmill_core::{Heap, MinMakespan, TaskUnit};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    /// After any sequence of pushes, draining the heap yields the items in
    /// key order.
    #[test]
    fn prop_heap_drains_sorted(values in prop::collection::vec(any::<i32>(), 0..200)) {
        let mut heap = Heap::new(|v: &i32| *v, false);
        for v in &values {
            heap.push(*v);
        }
        let mut drained = Vec::new();
        while let Ok(v) = heap.pop() {
            drained.push(v);
        }
        let mut expected = values.clone();
        expected.sort();
        prop_assert_eq!(drained, expected);
    }

    /// Interleaved pushes and pops never surface an item that is not the
    /// current minimum of the live contents.
    #[test]
    fn prop_heap_root_is_minimum(
        ops in prop::collection::vec((any::<bool>(), any::<i32>()), 1..200),
    ) {
        let mut heap = Heap::new(|v: &i32| *v, false);
        let mut mirror: Vec<i32> = Vec::new();
        for (is_pop, value) in ops {
            if is_pop && !mirror.is_empty() {
                let popped = heap.pop().unwrap();
                let min = *mirror.iter().min().unwrap();
                prop_assert_eq!(popped, min);
                let at = mirror.iter().position(|v| *v == min).unwrap();
                mirror.remove(at);
            } else {
                heap.push(value);
                mirror.push(value);
            }
        }
    }

    /// List scheduling over equal-speed machines keeps the load spread
    /// within the largest unit size.
    #[test]
    fn prop_min_makespan_balance(
        machines in 1usize..8,
        sizes in prop::collection::vec(1u64..20, 1..100),
    ) {
        let mut scheduler = MinMakespan::new();
        for _ in 0..machines {
            scheduler.add_machine(1);
        }
        let max_size = *sizes.iter().max().unwrap();
        for (tag, size) in sizes.iter().enumerate() {
            let mut unit = TaskUnit::new(json!(tag.to_string()), "int(x)");
            unit.size = *size;
            scheduler.schedule(&unit).unwrap();
        }
        let max_load = *scheduler.loads().iter().max().unwrap();
        let min_load = *scheduler.loads().iter().min().unwrap();
        prop_assert!(max_load - min_load <= max_size);
    }
}

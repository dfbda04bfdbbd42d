//! A mark-and-sweep collector for the entire heap that runs on the mutator's own thread.


use time::precise_time_ns;

use crate::heap::{drop_all, mark_from, sweep_map, CollectOps, CollectOutcome, HeapMap, Object,
                  ObjectMeta, RootMap, TraceStack};


/// This references all known GC-managed objects and handles marking and sweeping; serial
/// version. Everything happens on the calling thread while the mutator waits.
pub struct SerialHeap {
    objects: HeapMap,
}


impl SerialHeap {
    pub fn new() -> SerialHeap {
        SerialHeap { objects: HeapMap::default() }
    }

    fn mark(&self, roots: &RootMap) {
        let objects = &self.objects;
        let mut stack = TraceStack::new();

        for root_ptr in roots.keys() {
            if let Some(meta) = objects.get(root_ptr) {
                mark_from(meta, &mut stack, |ptr| objects.get(&ptr));
            }
        }
    }
}


impl Default for SerialHeap {
    fn default() -> SerialHeap {
        SerialHeap::new()
    }
}


impl CollectOps for SerialHeap {
    fn add_object(&mut self, object: Object, size: usize) {
        self.objects.insert(object.addr(), ObjectMeta::new(object, size));
    }

    fn collect(&mut self, roots: &RootMap) -> CollectOutcome {
        let start = precise_time_ns();

        self.mark(roots);
        let (live_objects, live_bytes, dropped) = sweep_map(&mut self.objects);

        let elapsed = precise_time_ns() - start;

        CollectOutcome {
            live_objects,
            live_bytes,
            dropped,
            wall_ns: elapsed,
            cpu_ns: elapsed,
        }
    }

    fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn shutdown(&mut self) {
        drop_all(&mut self.objects);
    }
}

//! Core heap traits and data types


use std::sync::atomic::{AtomicUsize, Ordering};

use fnv::FnvHashMap;

use crate::constants::{MARK_BIT, MARK_MASK, TRAVERSE_BIT};
use crate::trace::Trace;


pub type ObjectBuf = Vec<Object>;
pub type RootMap = FnvHashMap<usize, RootMeta>;
pub type HeapMap = FnvHashMap<usize, ObjectMeta>;


/// A trait that describes Trace operations on a Heap
pub trait TraceOps {
    /// Buffer the given object for future tracing on the trace stack. This method should be called
    /// by objects that implement the Trace trait, from the Trace::trace() method.
    fn push_to_trace(&mut self, object: &(dyn Trace + 'static));
}


/// A trait that describes collection operations on a Heap
pub trait CollectOps {
    /// Add a newly allocated object to the heap.
    fn add_object(&mut self, object: Object, size: usize);

    /// Run a collection on the heap, marking from every address in `roots` and dropping every
    /// object that was not reached.
    fn collect(&mut self, roots: &RootMap) -> CollectOutcome;

    /// Number of objects currently known to the heap.
    fn object_count(&self) -> usize;

    /// Drop every object regardless of reachability. Called when the collector is detached.
    fn shutdown(&mut self);
}


/// What a single collection did to the heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectOutcome {
    pub live_objects: usize,
    pub live_bytes: usize,
    pub dropped: usize,
    /// wall clock time spent in mark and sweep
    pub wall_ns: u64,
    /// CPU time spent in mark and sweep, summed over all threads that did work
    pub cpu_ns: u64,
}


/// A GC-managed object: a pointer to a boxed `Trace` trait object.
#[derive(Copy, Clone)]
pub struct Object {
    ptr: *mut dyn Trace,
}


/// Root pointer metadata
pub struct RootMeta {
    /// the number of live `GcRoot`s pointing at the object
    refcount: usize,
}


/// A GC-managed pointer's metadata
pub struct ObjectMeta {
    object: Object,
    size: usize,
    /// Using bit 0 as the mark bit (MARK_BIT)
    /// Using bit 1 to indicate traversibility (TRAVERSE_BIT)
    /// Parallel markers may race to set the mark bit, hence atomic.
    flags: AtomicUsize,
}


/// A type that contains a stack of objects to trace into. This type is separated out from the
/// heap types so that different collection strategies can be implemented without affecting
/// the client code. The `Trace` trait depends only this type, then, and not a whole heap type.
pub struct TraceStack {
    stack: ObjectBuf,
}


// Objects are only dereferenced by collector workers while the mutator is stopped.
unsafe impl Send for Object {}
unsafe impl Sync for Object {}


impl Object {
    pub fn new(ptr: *mut dyn Trace) -> Object {
        Object { ptr }
    }

    /// The object's address, used as its key in the root and heap maps.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr as *mut () as usize
    }

    /// Return this object as a Trace trait object reference.
    ///
    /// The caller must guarantee the object has not been dropped.
    #[inline]
    pub unsafe fn as_trace<'a>(&self) -> &'a dyn Trace {
        &*self.ptr
    }

    /// Drop the object and free its memory.
    ///
    /// The object must have been allocated by `Box` and must not be used again.
    pub unsafe fn drop_box(self) {
        drop(Box::from_raw(self.ptr));
    }
}


impl<'a> From<&'a (dyn Trace + 'static)> for Object {
    fn from(object: &'a (dyn Trace + 'static)) -> Object {
        Object {
            ptr: object as *const dyn Trace as *mut dyn Trace,
        }
    }
}


impl RootMeta {
    pub fn new(refcount: usize) -> RootMeta {
        RootMeta { refcount }
    }

    // Initialize with a reference count of 1
    pub fn one() -> RootMeta {
        Self::new(1)
    }

    // Initialize with a reference count of 0
    pub fn zero() -> RootMeta {
        Self::new(0)
    }

    #[inline]
    pub fn inc(&mut self) {
        self.refcount += 1;
    }

    #[inline]
    pub fn dec(&mut self) {
        self.refcount = self.refcount.saturating_sub(1);
    }

    // Return true if this object has a zero reference count
    #[inline]
    pub fn is_unrooted(&self) -> bool {
        self.refcount == 0
    }

    pub fn refcount(&self) -> usize {
        self.refcount
    }
}


impl ObjectMeta {
    pub fn new(object: Object, size: usize) -> ObjectMeta {
        let traversible = unsafe { object.as_trace() }.traversible();
        let flags = if traversible { TRAVERSE_BIT } else { 0 };

        ObjectMeta {
            object,
            size,
            flags: AtomicUsize::new(flags),
        }
    }

    // Mark this object and return true if it needs to be traced into
    #[inline]
    pub fn mark_and_needs_trace(&self) -> bool {
        let flags = self.flags.fetch_or(MARK_BIT, Ordering::Relaxed);
        flags & MARK_BIT == 0 && flags & TRAVERSE_BIT != 0
    }

    // Query the mark bit
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & MARK_BIT != 0
    }

    // Unset the mark bit
    #[inline]
    pub fn unmark(&self) {
        self.flags.fetch_and(MARK_MASK, Ordering::Relaxed);
    }

    #[inline]
    pub fn object(&self) -> Object {
        self.object
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}


impl TraceStack {
    pub fn new() -> TraceStack {
        TraceStack { stack: ObjectBuf::new() }
    }

    pub fn push(&mut self, obj: Object) {
        self.stack.push(obj);
    }

    pub fn pop(&mut self) -> Option<Object> {
        self.stack.pop()
    }
}


impl Default for TraceStack {
    fn default() -> TraceStack {
        TraceStack::new()
    }
}


impl TraceOps for TraceStack {
    fn push_to_trace(&mut self, object: &(dyn Trace + 'static)) {
        self.stack.push(Object::from(object));
    }
}


/// Mark `root` and everything reachable from it. `lookup` maps an address to the heap's metadata
/// for it; addresses it doesn't know are ignored.
pub fn mark_from<'h, F>(root: &'h ObjectMeta, stack: &mut TraceStack, lookup: F)
    where F: Fn(usize) -> Option<&'h ObjectMeta>
{
    if !root.mark_and_needs_trace() {
        return;
    }

    unsafe { root.object().as_trace().trace(stack) };

    // now there may be some child objects on the trace stack: pull them off and mark them too
    while let Some(obj) = stack.pop() {
        if let Some(meta) = lookup(obj.addr()) {
            if meta.mark_and_needs_trace() {
                unsafe { meta.object().as_trace().trace(stack) };
            }
        }
    }
}


/// Sweep one map of objects: drop the unmarked ones and unmark the rest.
/// Returns tuple (live_object_count, live_bytes, dropped_count).
pub fn sweep_map(objects: &mut HeapMap) -> (usize, usize, usize) {
    let mut live_count = 0;
    let mut live_bytes = 0;
    let mut drop_count = 0;

    objects.retain(|_, meta| {
        if meta.is_marked() {
            meta.unmark();
            live_count += 1;
            live_bytes += meta.size();
            true
        } else {
            drop_count += 1;
            unsafe { meta.object().drop_box() };
            false
        }
    });

    (live_count, live_bytes, drop_count)
}


/// Drop every object in the map.
pub fn drop_all(objects: &mut HeapMap) {
    for (_, meta) in objects.drain() {
        unsafe { meta.object().drop_box() };
    }
}


#[cfg(test)]
mod tests {

    use super::{mark_from, sweep_map, HeapMap, Object, ObjectMeta, RootMeta, TraceStack};
    use crate::heap::TraceOps;
    use crate::trace::Trace;


    struct Node {
        next: Option<*mut Node>,
    }


    unsafe impl Trace for Node {
        fn traversible(&self) -> bool {
            true
        }

        unsafe fn trace(&self, stack: &mut TraceStack) {
            if let Some(next) = self.next {
                stack.push_to_trace(&*next);
            }
        }
    }


    fn boxed(next: Option<*mut Node>) -> *mut Node {
        Box::into_raw(Box::new(Node { next }))
    }

    fn insert(map: &mut HeapMap, ptr: *mut Node) -> usize {
        let object = Object::new(ptr as *mut dyn Trace);
        map.insert(object.addr(), ObjectMeta::new(object, std::mem::size_of::<Node>()));
        object.addr()
    }


    #[test]
    fn test_mark_bits() {
        let ptr = Box::into_raw(Box::new(7u64));
        let meta = ObjectMeta::new(Object::new(ptr as *mut dyn Trace), 8);

        // u64 is not traversible: marked, but never needs tracing
        assert!(!meta.is_marked());
        assert!(!meta.mark_and_needs_trace());
        assert!(meta.is_marked());

        meta.unmark();
        assert!(!meta.is_marked());

        unsafe { meta.object().drop_box() };
    }

    #[test]
    fn test_traversible_marks_once() {
        let ptr = boxed(None);
        let meta = ObjectMeta::new(Object::new(ptr as *mut dyn Trace), 8);

        assert!(meta.mark_and_needs_trace());
        assert!(!meta.mark_and_needs_trace());

        unsafe { meta.object().drop_box() };
    }

    #[test]
    fn test_root_refcount() {
        let mut root = RootMeta::zero();
        assert!(root.is_unrooted());

        root.inc();
        root.inc();
        root.dec();
        assert_eq!(root.refcount(), 1);

        root.dec();
        root.dec();
        assert!(root.is_unrooted());
        assert_eq!(RootMeta::one().refcount(), 1);
    }

    #[test]
    fn test_mark_and_sweep_chain() {
        let mut map = HeapMap::default();

        // tail <- middle <- head, plus an unreachable orphan
        let tail = boxed(None);
        let middle = boxed(Some(tail));
        let head = boxed(Some(middle));
        let orphan = boxed(None);

        let head_addr = insert(&mut map, head);
        insert(&mut map, middle);
        insert(&mut map, tail);
        insert(&mut map, orphan);

        {
            let mut stack = TraceStack::new();
            let root = &map[&head_addr];
            mark_from(root, &mut stack, |addr| map.get(&addr));
        }

        let (live, live_bytes, dropped) = sweep_map(&mut map);
        assert_eq!(live, 3);
        assert_eq!(live_bytes, 3 * std::mem::size_of::<Node>());
        assert_eq!(dropped, 1);
        assert!(map.values().all(|meta| !meta.is_marked()));

        // nothing marked this time around
        let (live, _, dropped) = sweep_map(&mut map);
        assert_eq!(live, 0);
        assert_eq!(dropped, 3);
    }
}

//! Types for the mutator to use to build data structures, and the mutator thread's link to its
//! collector.
//!
//! Every thread that allocates has its own journal and its own collector. Allocations and root
//! reference count changes are appended to the journal; the collector reads it only when it
//! runs. A collection can only start at a safepoint, which is `GcRoot::new()`, or when asked for
//! with `AppThread::force_collect()`.


use std::cell::{Cell, RefCell};
use std::mem::size_of;
use std::ops::Deref;
use std::thread;

use log::{debug, error};

use crate::collector::{Collector, CollectorKind};
use crate::constants::{DEC, INC, JOURNAL_BUFFER_SIZE, MIN_COLLECT_THRESHOLD, NEW, NEW_INC};
use crate::error::{Error, Result};
use crate::heap::{Object, TraceOps, TraceStack};
use crate::journal::Journal;
use crate::statistics::GcStats;
use crate::trace::Trace;


thread_local!(
    /// Each thread gets it's own journal
    static GC_JOURNAL: RefCell<Journal<Entry>> = RefCell::new(Journal::new(JOURNAL_BUFFER_SIZE));

    /// Bytes allocated since the last collection
    static ALLOCATED: Cell<usize> = Cell::new(0);

    /// Bytes that may be allocated before the next safepoint collects
    static BUDGET: Cell<usize> = Cell::new(MIN_COLLECT_THRESHOLD);

    static COLLECTOR: RefCell<Option<Collector>> = RefCell::new(None);
);


/// A journal item: an object and what happened to it.
#[derive(Copy, Clone)]
pub struct Entry {
    pub object: Object,
    /// allocation size, for new objects
    pub size: usize,
    /// one of NEW_INC, NEW, INC or DEC
    pub flags: usize,
}


/// GcBox struct and traits: a boxed object that is GC managed
pub struct GcBox<T: Trace> {
    value: T,
}


/// Root smart pointer, sends reference count changes to the journal.
///
/// Whenever a reference to an object on the heap must be retained on the stack, this type must be
/// used. It's use will ensure that the object will be seen as a root.
pub struct GcRoot<T: Trace + 'static> {
    ptr: *mut GcBox<T>,
}


/// Non-rooted pointer type. This type should be used inside data structures to reference other
/// GC-managed objects.
///
/// *Important note:* a `Gc` that is only held on the stack is not a root. It must be stored
/// into an object that is reachable from a `GcRoot` before the next safepoint, or it may be
/// collected. Zero-sized types share an address and must not be allocated.
pub struct Gc<T: Trace + 'static> {
    ptr: *mut GcBox<T>,
}


/// An Application Thread's handle on its collector.
pub struct AppThread;


impl AppThread {
    /// Install a collector of the given kind for the current thread. Fails if the thread already
    /// has one; threads that allocate without attaching get `CollectorKind::from_build()`.
    pub fn attach(kind: CollectorKind) -> Result<()> {
        COLLECTOR.with(|cell| {
            let mut slot = cell.try_borrow_mut().map_err(|_| Error::CollectorBusy)?;

            if let Some(existing) = slot.as_ref() {
                return Err(Error::AlreadyAttached(existing.kind()));
            }

            *slot = Some(Collector::new(kind)?);
            Ok(())
        })
    }

    /// Remove the current thread's collector, dropping every object it manages. Any `GcRoot`
    /// or `Gc` still held by the thread is left dangling.
    pub fn detach() {
        let collector = COLLECTOR
            .try_with(|cell| cell.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
            .ok()
            .flatten();

        // dropped outside of the borrow, object destructors may want the collector
        if let Some(collector) = collector {
            debug!("detaching {} collector with {} roots and {} objects",
                   collector.kind(),
                   collector.root_count(),
                   collector.object_count());
            drop(collector);
        }
    }

    /// As thread::spawn but attaches a collector of the given kind to the new thread first, and
    /// detaches it once `f` returns.
    pub fn spawn<F, T>(kind: CollectorKind, f: F) -> thread::JoinHandle<Result<T>>
        where F: FnOnce() -> T,
              F: Send + 'static,
              T: Send + 'static
    {
        thread::spawn(move || {
            AppThread::attach(kind)?;
            let result = f();
            AppThread::detach();
            Ok(result)
        })
    }

    /// Run a full collection now. Does nothing if called from inside a collection, i.e. from a
    /// destructor of a GC-managed object.
    pub fn force_collect() {
        if with_collector(|collector| collector.collect()).is_none() {
            debug!("forced collection skipped, collector unavailable");
        }
    }

    /// Read the collector's counters.
    pub fn stats() -> GcStats {
        with_collector(|collector| collector.stats()).unwrap_or_default()
    }

    /// The kind of the collector attached to this thread, if any.
    pub fn kind() -> Option<CollectorKind> {
        COLLECTOR
            .try_with(|cell| {
                cell.try_borrow().ok().and_then(|slot| slot.as_ref().map(Collector::kind))
            })
            .ok()
            .flatten()
    }
}


/// Run `f` with this thread's collector, attaching the build's default collector if there is
/// none yet. Returns None if the collector is in use further up the stack.
fn with_collector<F, R>(f: F) -> Option<R>
    where F: FnOnce(&mut Collector) -> R
{
    COLLECTOR
        .try_with(|cell| {
            let mut slot = cell.try_borrow_mut().ok()?;

            if slot.is_none() {
                match Collector::new(CollectorKind::from_build()) {
                    Ok(collector) => *slot = Some(collector),
                    Err(err) => {
                        error!("failed to attach a collector: {}", err);
                        return None;
                    }
                }
            }

            slot.as_mut().map(f)
        })
        .ok()
        .flatten()
}


/// Pass every journaled entry to `f` in the order written. Returns the number of entries read.
pub(crate) fn read_journal<F>(f: F) -> usize
    where F: FnMut(Entry)
{
    GC_JOURNAL
        .try_with(|journal| match journal.try_borrow_mut() {
            Ok(mut journal) => journal.read_until_empty(f),
            Err(_) => 0,
        })
        .unwrap_or(0)
}


/// Start a new allocation budget; called by the collector after each collection.
pub(crate) fn reset_allocation_budget(budget: usize) {
    let _ = ALLOCATED.try_with(|allocated| allocated.set(0));
    let _ = BUDGET.try_with(|limit| limit.set(budget));
}


/// Write an entry to the journal. During thread teardown the journal may already be gone, in
/// which case the entry is lost.
#[inline]
fn write(entry: Entry) {
    let _ = GC_JOURNAL.try_with(|journal| {
        if let Ok(mut journal) = journal.try_borrow_mut() {
            journal.write(entry);
        }
    });
}


/// Move a value to the heap and journal it as a new object.
fn allocate<T: Trace + 'static>(value: T, flags: usize) -> *mut GcBox<T> {
    let ptr = Box::into_raw(Box::new(GcBox::new(value)));
    let size = size_of::<GcBox<T>>();

    write(Entry {
        object: Object::new(ptr as *mut dyn Trace),
        size,
        flags,
    });

    let _ = ALLOCATED.try_with(|allocated| allocated.set(allocated.get() + size));

    ptr
}


/// Collect if the allocation budget has been used up.
fn safepoint() {
    let allocated = ALLOCATED.try_with(|allocated| allocated.get()).unwrap_or(0);
    let budget = BUDGET.try_with(|limit| limit.get()).unwrap_or(usize::MAX);

    if allocated >= budget {
        with_collector(|collector| collector.collect());
    }
}


/// Journal a root reference count change for an existing object.
#[inline]
fn write_refcount<T: Trace + 'static>(ptr: *mut GcBox<T>, flags: usize) {
    write(Entry {
        object: Object::new(ptr as *mut dyn Trace),
        size: 0,
        flags,
    });
}

// GcBox implementation

impl<T: Trace> GcBox<T> {
    fn new(value: T) -> GcBox<T> {
        GcBox { value }
    }
}


unsafe impl<T: Trace> Trace for GcBox<T> {
    #[inline]
    fn traversible(&self) -> bool {
        self.value.traversible()
    }

    #[inline]
    unsafe fn trace(&self, stack: &mut TraceStack) {
        self.value.trace(stack);
    }
}

// GcRoot implementation

impl<T: Trace + 'static> GcRoot<T> {
    /// Put a new object on the heap and hand ownership to the GC, writing a new rooted object
    /// to the journal. This is a safepoint: the call may run a collection.
    pub fn new(value: T) -> GcRoot<T> {
        let root = GcRoot { ptr: allocate(value, NEW_INC) };
        safepoint();
        root
    }

    /// Copy the pointer into an unrooted `Gc`, for storing inside another GC-managed object.
    pub fn as_gc(&self) -> Gc<T> {
        Gc { ptr: self.ptr }
    }

    fn value(&self) -> &T {
        unsafe { &(*self.ptr).value }
    }
}


impl<T: Trace + 'static> Drop for GcRoot<T> {
    fn drop(&mut self) {
        write_refcount(self.ptr, DEC);
    }
}


impl<T: Trace + 'static> Deref for GcRoot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}


impl<T: Trace + 'static> Clone for GcRoot<T> {
    fn clone(&self) -> Self {
        write_refcount(self.ptr, INC);
        GcRoot { ptr: self.ptr }
    }
}

// Gc implementation

impl<T: Trace + 'static> Gc<T> {
    /// Move a value to the heap and create a pointer to it.
    pub fn new(value: T) -> Gc<T> {
        Gc { ptr: allocate(value, NEW) }
    }

    /// Root the object pointed at.
    pub fn root(&self) -> GcRoot<T> {
        write_refcount(self.ptr, INC);
        GcRoot { ptr: self.ptr }
    }

    /// Pointer equality comparison.
    pub fn is(&self, other: Gc<T>) -> bool {
        self.ptr == other.ptr
    }

    fn value(&self) -> &T {
        unsafe { &(*self.ptr).value }
    }
}


impl<T: Trace + 'static> Deref for Gc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}


impl<T: Trace + 'static> Clone for Gc<T> {
    fn clone(&self) -> Self {
        *self
    }
}


impl<T: Trace + 'static> Copy for Gc<T> {}


unsafe impl<T: Trace + 'static> Trace for Gc<T> {
    fn traversible(&self) -> bool {
        true
    }

    unsafe fn trace(&self, stack: &mut TraceStack) {
        stack.push_to_trace(&*self.ptr);
    }
}

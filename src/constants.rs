//! Numerous constants used as parameters to GC and benchmark behavior


// Journal parameters
pub const JOURNAL_BUFFER_SIZE: usize = 32768;
pub const JOURNAL_SPARE_BUFFERS: usize = 8;

// Collection pacing, in bytes of new allocation
pub const MIN_COLLECT_THRESHOLD: usize = 4 << 20;
pub const HEAP_GROWTH_PERCENT: usize = 100;

// Bits and masks in ObjectMeta flags
pub const MARK_BIT: usize = 1;
pub const MARK_MASK: usize = !1;
pub const TRAVERSE_BIT: usize = 2;

// mask for the journal entry flags
pub const FLAGS_MASK: usize = 3;

// bit number that indicates whether a reference count is being incremented
pub const INC_BIT: usize = 1;
// bit number that indicates whether or not an object is newly allocated
pub const NEW_BIT: usize = 2;

// Values found in the 2 bits masked by FLAGS_MASK
// new object, increment refcount value
pub const NEW_INC: usize = 3;
// new object not rooted value
pub const NEW: usize = 2;
// old object, increment refcount value
pub const INC: usize = 1;
// decrement refcount value
pub const DEC: usize = 0;

// Benchmark parameters
pub const MATRIX_SIZE: usize = 50;
pub const ITERATIONS: usize = 1000;
pub const WARMUP_ITERATIONS: usize = 100;
pub const RETAIN_EVERY: usize = 100;
pub const SCALAR: f64 = 2.5;
pub const SETTLE_MS: u64 = 100;

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

//! A journal implemented internally as a sequence of fixed-capacity buffers.
//!
//! The mutator appends to the tail buffer and the collector reads from the head buffer, both on
//! the same thread. A buffer is never grown in place: once it is full a new one is started, so
//! writing never copies previously journaled entries. Drained buffers are kept on a short spare
//! list and reused, which keeps the allocator out of the write path in the steady state.


use std::collections::VecDeque;

use crate::constants::JOURNAL_SPARE_BUFFERS;


/// An append-only log that is read back in write order.
pub struct Journal<T> {
    capacity: usize,

    /// Buffers in write order; the back buffer is the one being written to.
    buffers: VecDeque<Vec<T>>,

    /// Empty buffers ready for reuse
    spare: Vec<Vec<T>>,

    len: usize,
}


impl<T> Journal<T> {
    /// Create an empty journal. The capacity is the requested size of each internal buffer and
    /// will be rounded to the next power of two.
    pub fn new(requested_capacity: usize) -> Journal<T> {
        Journal {
            capacity: requested_capacity.max(1).next_power_of_two(),
            buffers: VecDeque::new(),
            spare: Vec::new(),
            len: 0,
        }
    }

    /// Append an entry.
    pub fn write(&mut self, item: T) {
        let tail_is_full = match self.buffers.back() {
            Some(tail) => tail.len() == self.capacity,
            None => true,
        };

        if tail_is_full {
            let buffer = self.spare.pop().unwrap_or_else(|| Vec::with_capacity(self.capacity));
            self.buffers.push_back(buffer);
        }

        if let Some(tail) = self.buffers.back_mut() {
            tail.push(item);
            self.len += 1;
        }
    }

    /// Read every journaled entry in write order, passing each to `f`, until the journal is
    /// empty. Returns the number of entries read.
    pub fn read_until_empty<F>(&mut self, mut f: F) -> usize
        where F: FnMut(T)
    {
        let mut count = 0;

        while let Some(mut buffer) = self.buffers.pop_front() {
            count += buffer.len();

            for item in buffer.drain(..) {
                f(item);
            }

            if self.spare.len() < JOURNAL_SPARE_BUFFERS {
                self.spare.push(buffer);
            }
        }

        self.len = 0;
        count
    }

    /// Number of entries written but not yet read
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity of each internal buffer
    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }
}

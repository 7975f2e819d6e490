#![allow(clippy::len_without_is_empty)]

/// A fixed-capacity ring buffer that keeps the trailing window of pushed
/// items, overwriting the oldest once full
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    ix: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be nonzero");
        Self {
            buffer: Vec::with_capacity(capacity),
            ix: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert an element, overwriting the oldest if the buffer is full
    pub fn push(&mut self, item: T) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(item);
        } else {
            self.buffer[self.ix] = item;
        }
        self.ix = (self.ix + 1) % self.capacity;
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.ix = 0;
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let pivot = if self.buffer.len() < self.capacity {
            0
        } else {
            self.ix
        };
        self.buffer[pivot..].iter().chain(self.buffer[..pivot].iter())
    }
}

//! Thread-safe identifier allocation over a bounded range.

use std::fmt;

use parking_lot::Mutex;

/// The allocator handed out every id in its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("identifier range {first}..={last} is exhausted")]
pub struct IdsExhausted {
    pub first: u64,
    pub last: u64,
}

/// Hands out increasing ids from `first..=last`, each exactly once.
///
/// Shared by reference between threads; allocation takes a short lock.
/// Ids are never reused, so an id that was released by its owner can not
/// be confused with a newer object that happened to get the same number.
pub struct IdAllocator {
    first: u64,
    last: u64,
    /// Next id to hand out; `None` once the range is used up.
    next: Mutex<Option<u64>>,
}

impl IdAllocator {
    /// Creates an allocator over `first..=last`.
    ///
    /// An inverted range (`first > last`) is born exhausted.
    pub fn new(first: u64, last: u64) -> Self {
        Self {
            first,
            last,
            next: Mutex::new((first <= last).then_some(first)),
        }
    }

    /// Returns the next id.
    pub fn allocate(&self) -> Result<u64, IdsExhausted> {
        let mut next = self.next.lock();
        let id = next.ok_or(IdsExhausted {
            first: self.first,
            last: self.last,
        })?;
        *next = id.checked_add(1).filter(|n| *n <= self.last);
        Ok(id)
    }

    /// How many ids are left.
    pub fn remaining(&self) -> u64 {
        match *self.next.lock() {
            Some(next) => self.last - next + 1,
            None => 0,
        }
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}

impl fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("first", &self.first)
            .field("last", &self.last)
            .field("remaining", &self.remaining())
            .finish()
    }
}

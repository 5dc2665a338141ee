//! Object ids
//!
//! Every world object gets a 16-bit id. Released ids go to the back of a
//! free list and are handed out again oldest-first, so a freshly freed id is
//! not immediately recycled while clients may still hold it.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u16);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-size id space with a FIFO free list
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
    limit: u32,
    free: VecDeque<u16>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::with_limit(u32::from(u16::MAX) + 1)
    }
}

impl IdAllocator {
    /// Allocator handing out ids `0..limit` (at most the full 16-bit space)
    pub fn with_limit(limit: u32) -> Self {
        Self {
            next: 0,
            limit: limit.min(u32::from(u16::MAX) + 1),
            free: VecDeque::new(),
        }
    }

    pub fn allocate(&mut self) -> Result<ObjectId, SimError> {
        if self.next < self.limit {
            let id = self.next as u16;
            self.next += 1;
            return Ok(ObjectId(id));
        }
        self.free
            .pop_front()
            .map(ObjectId)
            .ok_or(SimError::IdsExhausted)
    }

    pub fn release(&mut self, id: ObjectId) {
        debug_assert!(u32::from(id.0) < self.next, "releasing unallocated {id}");
        self.free.push_back(id.0);
    }

    /// Ids currently handed out
    pub fn in_use(&self) -> usize {
        self.next as usize - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_then_reused_fifo() {
        let mut ids = IdAllocator::with_limit(3);
        let a = ids.allocate().unwrap();
        let b = ids.allocate().unwrap();
        let c = ids.allocate().unwrap();
        assert_eq!((a, b, c), (ObjectId(0), ObjectId(1), ObjectId(2)));

        ids.release(b);
        ids.release(a);
        assert_eq!(ids.allocate().unwrap(), b);
        assert_eq!(ids.allocate().unwrap(), a);
        assert_eq!(ids.in_use(), 3);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut ids = IdAllocator::with_limit(1);
        ids.allocate().unwrap();
        assert!(matches!(ids.allocate(), Err(SimError::IdsExhausted)));
    }
}

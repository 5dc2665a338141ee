//! Deferred single-shot timers
//!
//! Timers are keyed to the simulation clock, not wall time. The game drains
//! every due timer once at the start of each tick. A timer's payload is plain
//! data, so cancelling is just forgetting the payload; the heap entry is
//! skipped when it comes due.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::ids::ObjectId;

/// Handle returned by [`TimerQueue::schedule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Deferred work the game schedules for itself
#[derive(Debug, Clone, PartialEq)]
pub enum TimerAction {
    /// A reload or healing action finished
    ActionComplete { player: ObjectId },
    RecoilExpire { player: ObjectId },
    /// Automatic fire while the trigger is held
    GunRefire { player: ObjectId },
    /// Next round of a burst
    BurstShot { player: ObjectId, remaining: u32 },
    /// Melee wind-up elapsed, resolve the hit
    MeleeHit { player: ObjectId },
    /// Next swing of an automatic melee weapon
    MeleeRefire { player: ObjectId },
    RemoveInvulnerability { player: ObjectId },
    GasAdvance,
    GameTeardown,
}

#[derive(Debug)]
pub struct TimerQueue<A> {
    heap: BinaryHeap<Reverse<(u64, u64)>>,
    pending: HashMap<u64, A>,
    next_seq: u64,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` once the clock reaches `due`
    pub fn schedule(&mut self, due: u64, action: A) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((due, seq)));
        self.pending.insert(seq, action);
        TimerHandle(seq)
    }

    /// Cancel a pending timer. Returns whether it was still pending;
    /// cancelling twice or after it fired does nothing.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle.0).is_some()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle.0)
    }

    /// Next due action at `now`, in (due, schedule order) order
    pub fn pop_due(&mut self, now: u64) -> Option<A> {
        while let Some(Reverse((due, seq))) = self.heap.peek().copied() {
            if due > now {
                return None;
            }
            self.heap.pop();
            if let Some(action) = self.pending.remove(&seq) {
                return Some(action);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_order_and_ties() {
        let mut timers = TimerQueue::new();
        timers.schedule(200, "late");
        timers.schedule(100, "first");
        timers.schedule(100, "second");
        assert_eq!(timers.pop_due(99), None);
        assert_eq!(timers.pop_due(150), Some("first"));
        assert_eq!(timers.pop_due(150), Some("second"));
        assert_eq!(timers.pop_due(150), None);
        assert_eq!(timers.pop_due(200), Some("late"));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timers = TimerQueue::new();
        let handle = timers.schedule(10, 1);
        assert!(timers.is_pending(handle));
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert_eq!(timers.pop_due(100), None);

        let fired = timers.schedule(10, 2);
        assert_eq!(timers.pop_due(10), Some(2));
        assert!(!timers.cancel(fired));
    }
}

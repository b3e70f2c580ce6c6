//! # Four-bucket priority queue.
//!
//! One FIFO bucket per [`Priority`]. [`dequeue`](PriorityQueue::dequeue)
//! always takes the oldest entry of the highest non-empty bucket, so a
//! pending `High` event is never overtaken by a `Normal` one.
//!
//! ## Capacity behavior
//! With a capacity set, a full queue applies its [`OverflowPolicy`]:
//! ```text
//! DropOldestLowerPriority:
//!   incoming = High, buckets = [C:0, H:3, N:0, L:2]  → evict oldest Low, accept
//!   incoming = Low,  buckets = [C:0, H:3, N:2, L:0]  → nothing lower → QueueFull
//! RejectNew:
//!   always QueueFull
//! ```
//! `Critical` entries can never be evicted because nothing ranks above them.

use std::collections::VecDeque;

use crate::error::EmitError;
use crate::events::Priority;

/// What a full queue does with a new entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest entry of the lowest bucket ranked strictly below the
    /// incoming one; reject when there is none.
    #[default]
    DropOldestLowerPriority,
    /// Reject the incoming entry.
    RejectNew,
}

/// Bounded (or unbounded) priority queue of `T`.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    buckets: [VecDeque<T>; 4],
    capacity: Option<usize>,
    overflow: OverflowPolicy,
    len: usize,
}

impl<T> PriorityQueue<T> {
    /// Creates a queue; `capacity = None` means unbounded.
    pub fn new(capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        Self {
            buckets: Default::default(),
            capacity: capacity.map(|c| c.max(1)),
            overflow,
            len: 0,
        }
    }

    /// Appends `item` to the bucket of `priority`.
    ///
    /// Returns the evicted entry, if the overflow policy had to make room.
    pub fn enqueue(
        &mut self,
        priority: Priority,
        item: T,
    ) -> Result<Option<(Priority, T)>, EmitError> {
        let evicted = match self.capacity {
            Some(capacity) if self.len >= capacity => {
                let evicted = match self.overflow {
                    OverflowPolicy::RejectNew => None,
                    OverflowPolicy::DropOldestLowerPriority => self.evict_below(priority),
                };
                if evicted.is_none() {
                    return Err(EmitError::QueueFull { capacity });
                }
                evicted
            }
            _ => None,
        };
        self.buckets[priority.bucket()].push_back(item);
        self.len += 1;
        Ok(evicted)
    }

    /// Removes the oldest entry of the highest non-empty bucket.
    pub fn dequeue(&mut self) -> Option<(Priority, T)> {
        for priority in Priority::DRAIN_ORDER {
            if let Some(item) = self.buckets[priority.bucket()].pop_front() {
                self.len -= 1;
                return Some((priority, item));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of pending entries of one priority.
    pub fn len_of(&self, priority: Priority) -> usize {
        self.buckets[priority.bucket()].len()
    }

    /// Removes every pending entry in drain order.
    pub fn drain(&mut self) -> Vec<(Priority, T)> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(entry) = self.dequeue() {
            out.push(entry);
        }
        out
    }

    fn evict_below(&mut self, incoming: Priority) -> Option<(Priority, T)> {
        for priority in Priority::DRAIN_ORDER.iter().rev() {
            if *priority >= incoming {
                break;
            }
            if let Some(item) = self.buckets[priority.bucket()].pop_front() {
                self.len -= 1;
                return Some((*priority, item));
            }
        }
        None
    }
}

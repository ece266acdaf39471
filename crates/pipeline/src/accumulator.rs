//! Fixed-size batch accumulation
//!
//! A single mutex guards the pending buffer. The append and the swap of a
//! full buffer happen in the same critical section, so a full batch is
//! handed to exactly one caller.

use parking_lot::Mutex;
use std::num::NonZeroUsize;

use stockflow_core::{Batch, Event};

// Avoid reserving huge buffers up front for very large batch sizes.
const MAX_PREALLOCATED: usize = 4096;

#[derive(Debug)]
struct Pending {
    events: Vec<Event>,
    next_sequence: u64,
}

/// Collects events until `batch_size` is reached
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: NonZeroUsize,
    pending: Mutex<Pending>,
}

impl BatchAccumulator {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            pending: Mutex::new(Pending {
                events: Self::fresh_buffer(batch_size),
                next_sequence: 0,
            }),
        }
    }

    fn fresh_buffer(batch_size: NonZeroUsize) -> Vec<Event> {
        Vec::with_capacity(batch_size.get().min(MAX_PREALLOCATED))
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Append an event, returning the full batch when this event completes it
    pub fn offer(&self, event: Event) -> Option<Batch> {
        let mut pending = self.pending.lock();
        pending.events.push(event);

        if pending.events.len() < self.batch_size.get() {
            return None;
        }

        let full = std::mem::replace(&mut pending.events, Self::fresh_buffer(self.batch_size));
        Self::seal(&mut pending, full)
    }

    /// Take whatever partial batch exists. `None` when nothing is pending.
    pub fn drain(&self) -> Option<Batch> {
        let mut pending = self.pending.lock();
        if pending.events.is_empty() {
            return None;
        }

        let partial = std::mem::take(&mut pending.events);
        Self::seal(&mut pending, partial)
    }

    fn seal(pending: &mut Pending, events: Vec<Event>) -> Option<Batch> {
        let batch = Batch::new(pending.next_sequence, events)?;
        pending.next_sequence += 1;
        Some(batch)
    }

    /// Number of events waiting for the current batch to fill
    pub fn pending(&self) -> usize {
        self.pending.lock().events.len()
    }

    /// Batches handed out so far, including drained ones
    pub fn batches_emitted(&self) -> u64 {
        self.pending.lock().next_sequence
    }
}

//! Deferred commit queue.
//!
//! `commit_parameters` only enqueues; the device flushes the queue at its
//! synchronization points. A flush commits in ascending priority order so
//! every parent observes the newest committed state of its children.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::object::{Object, ObjectHandle, ObjectRef};

struct Entry {
    priority: u32,
    seq: u64,
    object: ObjectRef,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<Reverse<Entry>>,
    queued: HashSet<ObjectHandle>,
    next_seq: u64,
}

/// Priority-ordered set of objects waiting for `commit()`.
#[derive(Default)]
pub struct CommitBuffer {
    queue: Mutex<Queue>,
}

impl CommitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `object` for the next flush. Returns false if it was already
    /// queued.
    pub fn enqueue(&self, object: &Arc<dyn Object>) -> bool {
        let mut queue = self.queue.lock();
        if !queue.queued.insert(object.core().handle()) {
            return false;
        }
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(Reverse(Entry {
            priority: object.core().commit_priority(),
            seq,
            object: ObjectRef::new(object.clone()),
        }));
        true
    }

    pub fn len(&self) -> usize {
        self.queue.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().heap.is_empty()
    }

    fn pop(&self) -> Option<ObjectRef> {
        let mut queue = self.queue.lock();
        let Reverse(entry) = queue.heap.pop()?;
        queue.queued.remove(&entry.object.handle());
        Some(entry.object)
    }

    /// Commit every queued object, lowest priority first. Observers of a
    /// committed object are marked updated and join the same flush.
    ///
    /// Returns how many objects were committed.
    pub fn flush(&self) -> usize {
        let mut committed = 0;
        // The queue lock is not held while commit() runs
        while let Some(object) = self.pop() {
            let core = object.core();
            if core.public_refs() == 0 && core.internal_refs() == 1 {
                log::debug!("dropping released object {} from the commit queue", core.handle());
                continue;
            }
            if !core.needs_commit() {
                continue;
            }

            object.commit();
            core.mark_committed();
            committed += 1;

            for observer in core.observers() {
                observer.core().mark_updated();
                self.enqueue(&observer);
            }
        }
        committed
    }
}

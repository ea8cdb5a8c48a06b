//! Per-session outbound queue.
//!
//! Any number of producers push objects; the session's writer task waits for
//! a wake-up and drains everything pending in one go. Wake-ups coalesce: many
//! enqueues before the writer runs produce a single drain.
//!
//! Pending objects coalesce per GUID as well. A newer copy replaces the
//! queued one in place, except that a tombstone is never replaced, so a
//! stalled writer holds at most one copy of each object.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use shared::{GameObject, Guid};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Pending {
    objects: Vec<GameObject>,
    slots: HashMap<Guid, usize>,
}

impl Pending {
    /// Returns whether the object was taken
    fn push(&mut self, object: GameObject) -> bool {
        match self.slots.get(&object.guid) {
            Some(&slot) => match self.objects.get_mut(slot) {
                Some(queued) if queued.is_removed() => false,
                Some(queued) => {
                    *queued = object;
                    true
                }
                None => false,
            },
            None => {
                self.slots.insert(object.guid, self.objects.len());
                self.objects.push(object);
                true
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: Mutex<Pending>,
    wake: Notify,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue that already holds `objects` and is signalled.
    pub fn with_pending(objects: Vec<GameObject>) -> Self {
        let queue = Self::new();
        {
            let mut pending = queue.lock();
            for object in objects {
                pending.push(object);
            }
        }
        queue.wake.notify_one();
        queue
    }

    pub fn enqueue(&self, object: GameObject) {
        if self.lock().push(object) {
            self.wake.notify_one();
        }
    }

    pub fn enqueue_many<I>(&self, objects: I)
    where
        I: IntoIterator<Item = GameObject>,
    {
        let added = {
            let mut pending = self.lock();
            objects
                .into_iter()
                .fold(false, |added, object| pending.push(object) || added)
        };
        if added {
            self.wake.notify_one();
        }
    }

    /// Waits until something was enqueued since the last wake-up.
    pub async fn wait(&self) {
        self.wake.notified().await;
    }

    /// Takes every pending object, in order of first enqueue.
    pub fn drain_all(&self) -> Vec<GameObject> {
        std::mem::take(&mut *self.lock()).objects
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // A panicking producer cannot leave the queue half-written
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::types::UpdateMessage;

/// Default capacity of the update channel.
pub const MAX_QUEUE_SIZE: usize = 1000;

/// Fixed-capacity FIFO shared between crew workers and stream consumers.
///
/// `put` never blocks: when the channel is full the oldest queued message is
/// evicted to make room. `get` waits until a message is available and each
/// message is handed to exactly one consumer. All queue access happens under
/// a single mutex, so the length is never observed above capacity.
pub struct BoundedUpdateChannel {
    queue: Mutex<VecDeque<UpdateMessage>>,
    available: Notify,
    capacity: usize,
}

impl BoundedUpdateChannel {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(MAX_QUEUE_SIZE))),
            available: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn put(&self, message: UpdateMessage) {
        {
            let mut queue = self.lock();
            if queue.len() >= self.capacity {
                if let Some(evicted) = queue.pop_front() {
                    log::debug!(
                        "Update channel full ({}), dropping oldest {} message",
                        self.capacity,
                        evicted.kind.as_str()
                    );
                }
            }
            queue.push_back(message);
        }
        self.available.notify_one();
    }

    /// Waits for the next message and removes it from the channel.
    pub async fn get(&self) -> UpdateMessage {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking the queue so a put between the check
            // and the await is not missed.
            notified.as_mut().enable();

            if let Some(message) = self.try_get() {
                return message;
            }

            notified.await;
        }
    }

    pub fn try_get(&self) -> Option<UpdateMessage> {
        let mut queue = self.lock();
        let message = queue.pop_front();
        if message.is_some() && !queue.is_empty() {
            self.available.notify_one();
        }
        message
    }

    /// Drops every queued message and returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let discarded = queue.len();
        queue.clear();
        discarded
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<UpdateMessage>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BoundedUpdateChannel {
    fn default() -> Self {
        Self::new(MAX_QUEUE_SIZE)
    }
}

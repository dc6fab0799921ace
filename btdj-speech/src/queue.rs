//! Bounded latest-wins queue
//!
//! Pushing onto a full queue evicts the oldest entry. Stale commentary
//! about a track that already changed is worse than silence, so only the
//! most recent requests survive overload.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// One utterance waiting to be spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub enqueued_at: Instant,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            enqueued_at: Instant::now(),
        }
    }
}

/// Bounded FIFO that drops its oldest entries on overflow
///
/// `push` never blocks. Consumers wait with [`LatestWinsQueue::notified`].
#[derive(Debug)]
pub struct LatestWinsQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> LatestWinsQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    /// Append an item, evicting from the front as needed
    ///
    /// Returns the number of evicted items.
    pub fn push(&self, item: T) -> usize {
        let evicted = {
            let mut items = self.items.lock();
            let mut evicted = 0;
            while items.len() >= self.capacity {
                items.pop_front();
                evicted += 1;
            }
            items.push_back(item);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    /// Take the oldest item
    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Wait until an item may be available
    ///
    /// A push that happened before this call still wakes it.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Drop every queued item, returning how many there were
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let count = items.len();
        items.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_push_evicts_oldest() {
        let queue = LatestWinsQueue::new(2);
        assert_eq!(queue.push(1), 0);
        assert_eq!(queue.push(2), 0);
        assert_eq!(queue.push(3), 1);
        assert_eq!(queue.push(4), 1);

        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(4));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let queue = LatestWinsQueue::new(0);
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some("b"));
    }

    #[test]
    fn test_clear() {
        let queue = LatestWinsQueue::new(3);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_push_before_wait_is_not_lost() {
        let queue = LatestWinsQueue::new(2);
        queue.push(1);

        tokio::time::timeout(Duration::from_millis(100), queue.notified())
            .await
            .expect("stored permit should wake the waiter");
        assert_eq!(queue.pop(), Some(1));
    }
}

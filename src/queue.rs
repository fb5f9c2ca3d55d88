//! Batching queue with size-cap and debounce flush triggers.
//!
//! Events accumulate until either the queue reaches its capacity (flushed
//! synchronously) or activity pauses for the debounce interval (flushed by
//! a timer). Each enqueue cancels and re-arms the pending timer, so a burst
//! delays the flush until it ends or the cap is hit, whichever first.

use crate::events::QueuedEvent;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Receives the drained contents of a queue on each flush.
pub type FlushSink = Arc<dyn Fn(Vec<QueuedEvent>) + Send + Sync>;

/// A FIFO queue that hands its contents to a sink in batches.
pub struct BatchQueue {
    inner: Arc<QueueInner>,
    capacity: usize,
    flush_after: Duration,
}

struct QueueInner {
    name: &'static str,
    items: Mutex<Vec<QueuedEvent>>,
    /// Pending debounce timer; replaced atomically on each re-arm.
    timer: Mutex<Option<JoinHandle<()>>>,
    sink: FlushSink,
}

impl BatchQueue {
    /// Create a queue flushing into `sink`.
    pub fn new(
        name: &'static str,
        capacity: usize,
        flush_after: Duration,
        sink: FlushSink,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name,
                items: Mutex::new(Vec::new()),
                timer: Mutex::new(None),
                sink,
            }),
            capacity,
            flush_after,
        }
    }

    /// Append an event, flushing synchronously once capacity is reached.
    ///
    /// Below capacity the debounce timer is (re)armed; without an ambient
    /// tokio runtime there is no debounce, but the size cap and explicit
    /// flushes still apply.
    pub fn enqueue(&self, event: QueuedEvent) {
        let at_capacity = {
            let mut items = self.inner.items.lock().unwrap();
            items.push(event);
            items.len() >= self.capacity
        };

        if at_capacity {
            self.inner.flush();
        } else {
            self.arm_timer();
        }
    }

    /// Drain the queue and hand the batch to the sink.
    ///
    /// The item vector is swapped for an empty one before the sink runs,
    /// so reentrant enqueues from inside the sink land in the next batch.
    /// Flushing an empty queue is a no-op.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Drop all queued events without invoking the sink.
    ///
    /// Returns the number of events discarded.
    pub fn discard(&self) -> usize {
        self.inner.discard()
    }

    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        self.inner.items.lock().unwrap().len()
    }

    /// Whether the queue currently holds no events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn arm_timer(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!(queue = self.inner.name, "no runtime, debounce timer not armed");
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let delay = self.flush_after;

        let mut timer = self.inner.timer.lock().unwrap();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush();
        }));
    }
}

impl QueueInner {
    fn flush(&self) {
        self.cancel_timer();

        let drained = std::mem::take(&mut *self.items.lock().unwrap());
        if drained.is_empty() {
            return;
        }

        tracing::debug!(queue = self.name, batch = drained.len(), "flushing queue");
        (self.sink)(drained);
    }

    fn discard(&self) -> usize {
        self.cancel_timer();

        let dropped = std::mem::take(&mut *self.items.lock().unwrap());
        if !dropped.is_empty() {
            tracing::debug!(queue = self.name, count = dropped.len(), "discarding queue");
        }
        dropped.len()
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().unwrap().take() {
            timer.abort();
        }
    }
}

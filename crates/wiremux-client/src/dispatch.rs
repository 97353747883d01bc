//! Deferred callback dispatch.
//!
//! Resolution, routing, and teardown may all decide that an application
//! callback must fire; none of them invoke it in place. Every callback is
//! queued here and drained exactly once per tick, which guarantees that no
//! two callbacks ever run concurrently and that handler code observes
//! single-threaded state. The queue is thread-safe so transports living on
//! other threads could hand work over, and cheap enough not to matter when
//! they don't.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::error;

type Callback = Box<dyn FnOnce() + Send>;

/// Thread-safe FIFO hand-off queue for application-visible callbacks.
#[derive(Clone, Default)]
pub struct Dispatcher {
    queue: Arc<Mutex<VecDeque<Callback>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a callback for the next drain.
    pub fn enqueue(&self, callback: impl FnOnce() + Send + 'static) {
        self.queue.lock().unwrap().push_back(Box::new(callback));
    }

    /// Run every callback queued so far, in order. A panicking callback is
    /// caught and reported; siblings still run and the tick completes.
    /// Callbacks queued during the drain run on the next drain.
    pub fn drain(&self) -> usize {
        let batch: Vec<Callback> = {
            let mut queue = self.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        let count = batch.len();
        for callback in batch {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                error!("application callback panicked");
            }
        }
        count
    }

    /// Drop everything queued without running it.
    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

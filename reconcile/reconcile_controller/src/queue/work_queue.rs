//! Deduplicating work queue with delayed and rate-limited adds.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reconcile_core::{BackoffConfig, QueueError};
use tokio::sync::Notify;
use tracing::trace;

use super::backoff::ExponentialBackoff;

#[derive(Debug)]
struct State<K> {
    /// Keys ready to be handed out, in order
    queue: VecDeque<K>,

    /// Keys waiting to be processed
    dirty: HashSet<K>,

    /// Keys currently held by a worker
    processing: HashSet<K>,

    shutting_down: bool,
}

#[derive(Debug)]
struct Shared<K> {
    state: Mutex<State<K>>,
    ready: Notify,
    backoff: ExponentialBackoff<K>,
}

/// A work queue of keys.
///
/// Cloning the queue yields another handle to the same queue.
#[derive(Debug)]
pub struct WorkQueue<K> {
    shared: Arc<Shared<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
{
    /// Create an empty queue with the given retry backoff.
    pub fn new(backoff: ExponentialBackoff<K>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                ready: Notify::new(),
                backoff,
            }),
        }
    }

    /// Create an empty queue from backoff configuration.
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(ExponentialBackoff::from_config(config))
    }

    /// Queue a key. A key that is already waiting is not queued twice.
    pub fn add(&self, key: K) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock();
        if state.shutting_down {
            return Err(QueueError::ShuttingDown);
        }
        if !state.dirty.insert(key.clone()) {
            return Ok(());
        }
        if state.processing.contains(&key) {
            trace!(?key, "key in flight, deferring");
            return Ok(());
        }
        state.queue.push_back(key);
        drop(state);

        self.shared.ready.notify_one();
        Ok(())
    }

    /// Queue a key once `delay` has passed.
    ///
    /// Must be called from within a tokio runtime when `delay` is non-zero.
    pub fn add_after(&self, key: K, delay: Duration) -> Result<(), QueueError> {
        if self.is_shutting_down() {
            return Err(QueueError::ShuttingDown);
        }
        if delay.is_zero() {
            return self.add(key);
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The queue may have shut down while we slept.
            let _ = queue.add(key);
        });
        Ok(())
    }

    /// Queue a key after its backoff delay, counting one more failure.
    pub fn add_rate_limited(&self, key: K) -> Result<(), QueueError> {
        let delay = self.shared.backoff.when(&key);
        trace!(?key, ?delay, "rate limited requeue");
        self.add_after(key, delay)
    }

    /// Clear the failure history of a key.
    pub fn forget(&self, key: &K) {
        self.shared.backoff.forget(key);
    }

    /// Number of rate-limited requeues of a key since it was last forgotten.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.shared.backoff.num_requeues(key)
    }

    /// Wait for the next key.
    ///
    /// Returns `None` once the queue is shutting down and has been drained.
    /// The caller must call [`WorkQueue::done`] with the key when finished.
    pub async fn get(&self) -> Option<K> {
        loop {
            let mut notified = pin!(self.shared.ready.notified());
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Release a key handed out by [`WorkQueue::get`].
    ///
    /// If the key was added again while it was processed, it goes back on
    /// the queue now.
    pub fn done(&self, key: &K) {
        let mut state = self.shared.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.shared.ready.notify_one();
        }
    }

    /// Stop accepting keys and wake every waiting worker.
    pub fn shut_down(&self) {
        self.shared.state.lock().shutting_down = true;
        self.shared.ready.notify_waiters();
    }

    /// Whether [`WorkQueue::shut_down`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.state.lock().shutting_down
    }

    /// Number of keys ready to be handed out.
    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Whether no key is ready to be handed out.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

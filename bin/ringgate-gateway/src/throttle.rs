//! Throttle (§4.8): bounded concurrent slots plus a FIFO waiting
//! queue. A request that can't get a slot and can't queue either is
//! rejected with `Throttled`. Every transition is reported through
//! the `Observer` trait from §9 so production can wire tracing/metrics
//! while tests just record calls.

use ringgate_common::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

pub trait Observer: Send + Sync {
    fn on_client_close(&self) {}
    fn on_socket_timeout(&self) {}
    fn on_throttle(&self) {}
    fn on_queue_enter(&self) {}
    fn on_queue_leave(&self) {}
}

pub struct NoopObserver;
impl Observer for NoopObserver {}

pub struct Throttle {
    slots: Semaphore,
    queue_depth: AtomicUsize,
    max_queue_depth: usize,
    observer: Arc<dyn Observer>,
}

pub struct Admission<'a> {
    _permit: SemaphorePermit<'a>,
}

impl Throttle {
    #[must_use]
    pub fn new(max_concurrent: usize, max_queue_depth: usize, observer: Arc<dyn Observer>) -> Self {
        Self {
            slots: Semaphore::new(max_concurrent),
            queue_depth: AtomicUsize::new(0),
            max_queue_depth,
            observer,
        }
    }

    #[must_use]
    pub fn with_noop_observer(max_concurrent: usize, max_queue_depth: usize) -> Self {
        Self::new(max_concurrent, max_queue_depth, Arc::new(NoopObserver))
    }

    /// Acquire a slot, queueing if every slot is occupied. Rejects
    /// with `Throttled` if the queue is already at capacity.
    pub async fn admit(&self) -> Result<Admission<'_>, Error> {
        if self.slots.available_permits() == 0 {
            let depth = self.queue_depth.fetch_add(1, Ordering::AcqRel) + 1;
            if depth > self.max_queue_depth {
                self.queue_depth.fetch_sub(1, Ordering::AcqRel);
                self.observer.on_throttle();
                return Err(Error::Throttled { retry_after_secs: 1 });
            }
            self.observer.on_queue_enter();
            let permit = self.slots.acquire().await.expect("semaphore never closed");
            self.queue_depth.fetch_sub(1, Ordering::AcqRel);
            self.observer.on_queue_leave();
            return Ok(Admission { _permit: permit });
        }
        let permit = self.slots.acquire().await.expect("semaphore never closed");
        Ok(Admission { _permit: permit })
    }

    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Observer for RecordingObserver {
        fn on_throttle(&self) {
            self.calls.lock().unwrap().push("throttle");
        }
        fn on_queue_enter(&self) {
            self.calls.lock().unwrap().push("queue_enter");
        }
        fn on_queue_leave(&self) {
            self.calls.lock().unwrap().push("queue_leave");
        }
    }

    #[tokio::test]
    async fn admits_within_slot_budget() {
        let t = Throttle::with_noop_observer(2, 2);
        let a = t.admit().await.unwrap();
        let b = t.admit().await.unwrap();
        assert_eq!(t.available_slots(), 0);
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn rejects_when_queue_is_also_full() {
        let t = Arc::new(Throttle::with_noop_observer(1, 0));
        let _held = t.admit().await.unwrap();
        let err = t.admit().await.unwrap_err();
        assert!(matches!(err, Error::Throttled { .. }));
    }

    #[tokio::test]
    async fn queues_and_reports_observer_transitions() {
        let observer = Arc::new(RecordingObserver::default());
        let t = Arc::new(Throttle::new(1, 4, observer.clone()));
        let held = t.admit().await.unwrap();

        let t2 = t.clone();
        let waiter = tokio::spawn(async move { t2.admit().await });

        tokio::task::yield_now().await;
        assert_eq!(t.queue_depth(), 1);
        drop(held);
        let _second = waiter.await.unwrap().unwrap();

        let calls = observer.calls.lock().unwrap();
        assert!(calls.contains(&"queue_enter"));
        assert!(calls.contains(&"queue_leave"));
    }
}

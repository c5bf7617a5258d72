use crate::context::PushNotifier;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// The external-thread-facing half of a push source's channel. `send` is the
/// crate's only cross-thread entry point (§5): lock, push, flag, notify —
/// in that order, never calling user code under the lock.
#[derive(Clone)]
pub struct PushSender<T> {
    queue: Arc<Mutex<VecDeque<T>>>,
    notifier: PushNotifier,
}

impl<T> PushSender<T> {
    pub fn send(&self, value: T) {
        self.queue.lock().unwrap().push_back(value);
        self.notifier.notify();
    }
}

/// The executor-thread-facing half: dequeues at most one value per `eval`,
/// never blocking.
pub struct SenderReceiver<T> {
    queue: Arc<Mutex<VecDeque<T>>>,
}

impl<T> SenderReceiver<T> {
    pub fn new(notifier: PushNotifier) -> (PushSender<T>, Self) {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        (
            PushSender {
                queue: queue.clone(),
                notifier,
            },
            SenderReceiver { queue },
        )
    }

    /// Dequeues one value, if any, without blocking.
    pub fn try_recv(&self) -> Option<T> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::time::NanoTime;

    #[test]
    fn send_then_recv_preserves_fifo_order() {
        let ctx = ExecutionContext::real_time(NanoTime::now());
        let (tx, rx) = SenderReceiver::new(ctx.push_notifier());
        tx.send(1);
        tx.send(2);
        assert_eq!(rx.try_recv(), Some(1));
        assert_eq!(rx.try_recv(), Some(2));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn send_marks_context_push_pending() {
        let ctx = ExecutionContext::real_time(NanoTime::now());
        let (tx, _rx) = SenderReceiver::<i32>::new(ctx.push_notifier());
        assert!(!ctx.push_has_pending_values());
        tx.send(42);
        assert!(ctx.push_has_pending_values());
    }
}

use crate::error::EngineError;
use crate::time::NanoTime;
use crossbeam::channel::{self, Receiver, Sender, select};
use std::cmp::{max, min};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot, tick-scoped notification queues. Drained exactly once per tick:
/// before-evaluation in FIFO order, after-evaluation in LIFO order, then
/// cleared. Distinct from the persistent [crate::observer::LifecycleObserver]
/// list.
#[derive(Default)]
pub(crate) struct OneShotNotifications {
    before_eval: Vec<Box<dyn FnOnce(&mut ExecutionContext)>>,
    after_eval: Vec<Box<dyn FnOnce(&mut ExecutionContext)>>,
}

impl OneShotNotifications {
    fn drain_before(&mut self) -> Vec<Box<dyn FnOnce(&mut ExecutionContext)>> {
        std::mem::take(&mut self.before_eval)
    }
    fn drain_after(&mut self) -> Vec<Box<dyn FnOnce(&mut ExecutionContext)>> {
        let mut v = std::mem::take(&mut self.after_eval);
        v.reverse();
        v
    }
}

/// Which clock discipline a run uses. Back-test time advances as fast as
/// work permits; real-time time tracks the wall clock and can be woken early
/// by a push source.
enum Mode {
    BackTest,
    RealTime {
        push_tx: Sender<()>,
        push_rx: Receiver<()>,
    },
}

/// Holds current/proposed engine time, the stop flag, and the push-pending
/// signal; narrows its time proposal monotonically within a tick and resets
/// it whenever the current time advances. See the design notes on engine
/// time invariants.
pub struct ExecutionContext {
    current_engine_time: NanoTime,
    proposed_next_engine_time: NanoTime,
    stop_requested: bool,
    push_has_pending_values: Arc<AtomicBool>,
    notifications: OneShotNotifications,
    mode: Mode,
}

impl ExecutionContext {
    pub fn back_test(start_time: NanoTime) -> Self {
        Self {
            current_engine_time: start_time,
            proposed_next_engine_time: NanoTime::MAX_DT,
            stop_requested: false,
            push_has_pending_values: Arc::new(AtomicBool::new(false)),
            notifications: OneShotNotifications::default(),
            mode: Mode::BackTest,
        }
    }

    pub fn real_time(start_time: NanoTime) -> Self {
        let (push_tx, push_rx) = channel::unbounded();
        Self {
            current_engine_time: start_time,
            proposed_next_engine_time: NanoTime::MAX_DT,
            stop_requested: false,
            push_has_pending_values: Arc::new(AtomicBool::new(false)),
            notifications: OneShotNotifications::default(),
            mode: Mode::RealTime { push_tx, push_rx },
        }
    }

    pub fn is_real_time(&self) -> bool {
        matches!(self.mode, Mode::RealTime { .. })
    }

    pub fn current_engine_time(&self) -> NanoTime {
        self.current_engine_time
    }

    pub fn proposed_next_engine_time(&self) -> NanoTime {
        self.proposed_next_engine_time
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Narrows the proposed next time towards `t`, never widening it and
    /// never proposing a time at or before the current time.
    pub fn update_next_proposed_time(&mut self, t: NanoTime) {
        if t == self.current_engine_time {
            return;
        }
        let floor = self.current_engine_time + NanoTime::MIN_TD;
        self.proposed_next_engine_time = max(floor, min(self.proposed_next_engine_time, t));
    }

    /// Sets the current engine time and resets the proposal to "never".
    pub(crate) fn set_current_engine_time(&mut self, t: NanoTime) {
        self.current_engine_time = t;
        self.proposed_next_engine_time = NanoTime::MAX_DT;
    }

    pub fn request_engine_stop(&mut self) {
        self.stop_requested = true;
        if let Mode::RealTime { push_tx, .. } = &self.mode {
            let _ = push_tx.send(());
        }
    }

    /// Handle that can be cloned out to a push-source node to flag pending
    /// values and wake a blocked real-time wait, without holding `&mut self`.
    pub(crate) fn push_pending_flag(&self) -> Arc<AtomicBool> {
        self.push_has_pending_values.clone()
    }

    /// A cross-thread-safe handle a push source can hold onto (and clone out
    /// to an external producer thread) to signal new values without ever
    /// touching `&mut ExecutionContext`.
    pub(crate) fn push_notifier(&self) -> PushNotifier {
        let push_tx = match &self.mode {
            Mode::BackTest => None,
            Mode::RealTime { push_tx, .. } => Some(push_tx.clone()),
        };
        PushNotifier {
            pending: self.push_has_pending_values.clone(),
            push_tx,
        }
    }

    pub fn push_has_pending_values(&self) -> bool {
        self.push_has_pending_values.load(Ordering::SeqCst)
    }

    pub fn reset_push_has_pending_values(&mut self) {
        self.push_has_pending_values.store(false, Ordering::SeqCst);
    }

    /// Marks a push-pending value and wakes a blocked real-time wait. Fails
    /// in back-test mode: push sources are forbidden there.
    pub fn mark_push_has_pending_values(&self) -> Result<(), EngineError> {
        match &self.mode {
            Mode::BackTest => Err(EngineError::PushSourceInBackTest { node_index: 0 }),
            Mode::RealTime { push_tx, .. } => {
                self.push_has_pending_values.store(true, Ordering::SeqCst);
                let _ = push_tx.send(());
                Ok(())
            }
        }
    }

    fn wall_clock_time(&self) -> NanoTime {
        match &self.mode {
            // Back-test never throttles to real wall-clock speed: logical
            // time always advances as fast as work permits.
            Mode::BackTest => NanoTime::MAX_DT,
            Mode::RealTime { .. } => NanoTime::now(),
        }
    }

    /// Blocks (real-time) or jumps immediately (back-test) until either `t`
    /// or a push notification arrives, then sets current time to whichever
    /// came first.
    pub(crate) fn wait_until_proposed_engine_time(&mut self, t: NanoTime) {
        match &self.mode {
            Mode::BackTest => self.set_current_engine_time(t),
            Mode::RealTime { push_rx, .. } => {
                let now = NanoTime::now();
                if now < t {
                    let timeout = Duration::from(t - now);
                    select! {
                        recv(push_rx) -> _ => {}
                        default(timeout) => {}
                    }
                }
                let resolved = min(t, NanoTime::now());
                self.set_current_engine_time(resolved);
            }
        }
    }

    /// The executor's `advance_engine_time` step (§4.4): jump on stop
    /// request, else advance to the narrowed proposal if the wall clock has
    /// caught up or a push is pending, else block.
    pub(crate) fn advance_engine_time(&mut self, end_time: NanoTime) {
        if self.stop_requested {
            self.set_current_engine_time(end_time.next_instant());
            return;
        }
        let proposed = min(self.proposed_next_engine_time, end_time.next_instant());
        let wall = self.wall_clock_time();
        if wall >= proposed {
            self.set_current_engine_time(proposed);
        } else if self.push_has_pending_values() {
            self.set_current_engine_time(wall);
        } else {
            self.wait_until_proposed_engine_time(proposed);
        }
    }

    pub(crate) fn notify_before_evaluation(&mut self, f: impl FnOnce(&mut ExecutionContext) + 'static) {
        self.notifications.before_eval.push(Box::new(f));
    }

    pub(crate) fn notify_after_evaluation(&mut self, f: impl FnOnce(&mut ExecutionContext) + 'static) {
        self.notifications.after_eval.push(Box::new(f));
    }

    pub(crate) fn drain_before_eval(&mut self) {
        for f in self.notifications.drain_before() {
            f(self);
        }
    }

    pub(crate) fn drain_after_eval(&mut self) {
        for f in self.notifications.drain_after() {
            f(self);
        }
    }
}

/// Thread-safe handle a push source hands to its external producer: enqueue
/// proceeds under the receiver's own lock (see [crate::channel]), then this
/// notifier flags the pending value and wakes a blocked real-time wait.
#[derive(Clone)]
pub struct PushNotifier {
    pending: Arc<AtomicBool>,
    push_tx: Option<Sender<()>>,
}

impl PushNotifier {
    pub fn notify(&self) {
        self.pending.store(true, Ordering::SeqCst);
        if let Some(tx) = &self.push_tx {
            let _ = tx.send(());
        }
    }
}

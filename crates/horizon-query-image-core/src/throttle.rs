//! Per-instance trailing debounce.
//!
//! [`ThrottleGate`] coalesces a burst of triggers for one instance into a
//! single deferred action. Every [`schedule`](ThrottleGate::schedule) call
//! cancels the instance's pending action and starts a fresh delay, so the
//! action runs once the triggers have been quiet for the whole delay.
//!
//! The gate does not run on its own. The host event loop calls
//! [`run_expired`](ThrottleGate::run_expired) whenever
//! [`time_until_next`](ThrottleGate::time_until_next) says something is due.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use horizon_query_image_core::{InstanceId, ManualClock, ThrottleGate};
//! use slotmap::KeyData;
//!
//! let clock = Arc::new(ManualClock::new());
//! let gate = ThrottleGate::new(clock.clone(), Duration::from_millis(150));
//! let instance = InstanceId::from(KeyData::from_ffi(1));
//!
//! gate.schedule(instance, || println!("first"));
//! gate.schedule(instance, || println!("second"));
//!
//! clock.advance(Duration::from_millis(150));
//! assert_eq!(gate.run_expired(), 1); // prints "second" only
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use slotmap::new_key_type;

use crate::clock::Clock;
use crate::logging::targets;
use crate::timer::{TimerId, TimerManager};

new_key_type! {
    /// Identifies one widget instance for throttling and bookkeeping.
    pub struct InstanceId;
}

/// The debounce window used when none is configured.
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_millis(150);

type ThrottleAction = Box<dyn FnOnce() + Send + 'static>;

struct Pending {
    timer: TimerId,
    action: ThrottleAction,
}

#[derive(Default)]
struct GateState {
    timers: TimerManager,
    pending: HashMap<InstanceId, Pending>,
    owners: HashMap<TimerId, InstanceId>,
}

impl GateState {
    fn take_pending(&mut self, instance: InstanceId) -> Option<Pending> {
        let pending = self.pending.remove(&instance)?;
        self.owners.remove(&pending.timer);
        // The timer may have expired but not yet been flushed.
        let _ = self.timers.stop(pending.timer);
        Some(pending)
    }
}

/// Coalesces triggers per instance into one trailing action.
pub struct ThrottleGate {
    clock: Arc<dyn Clock>,
    delay: Duration,
    state: Mutex<GateState>,
}

impl ThrottleGate {
    /// Create a gate with the given clock and debounce delay.
    pub fn new(clock: Arc<dyn Clock>, delay: Duration) -> Self {
        Self {
            clock,
            delay,
            state: Mutex::new(GateState::default()),
        }
    }

    /// The debounce delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace the instance's pending action (if any) with `action`, due one
    /// full delay from now.
    pub fn schedule<F>(&self, instance: InstanceId, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if state.take_pending(instance).is_some() {
            tracing::trace!(target: targets::THROTTLE, ?instance, "coalesced pending action");
        }

        let timer = state.timers.start_one_shot(now, self.delay);
        state.owners.insert(timer, instance);
        state.pending.insert(
            instance,
            Pending {
                timer,
                action: Box::new(action),
            },
        );
    }

    /// Drop the instance's pending action. Returns `true` if one was pending.
    pub fn cancel(&self, instance: InstanceId) -> bool {
        let cancelled = self.state.lock().take_pending(instance).is_some();
        if cancelled {
            tracing::trace!(target: targets::THROTTLE, ?instance, "cancelled pending action");
        }
        cancelled
    }

    /// Whether the instance has an action waiting.
    pub fn is_pending(&self, instance: InstanceId) -> bool {
        self.state.lock().pending.contains_key(&instance)
    }

    /// Number of instances with an action waiting.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Time until the earliest pending action is due.
    pub fn time_until_next(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.state.lock().timers.time_until_next(now)
    }

    /// Run every action whose quiet period has elapsed.
    ///
    /// Actions run after the gate's lock is released, so they may schedule
    /// again. Returns the number of actions run.
    #[tracing::instrument(skip(self), target = "horizon_query_image_core::throttle", level = "trace")]
    pub fn run_expired(&self) -> usize {
        let now = self.clock.now();
        let actions: Vec<ThrottleAction> = {
            let mut state = self.state.lock();
            let fired = state.timers.process_expired(now);
            fired
                .into_iter()
                .filter_map(|timer| {
                    let instance = state.owners.remove(&timer)?;
                    state.pending.remove(&instance).map(|pending| pending.action)
                })
                .collect()
        };

        let count = actions.len();
        for action in actions {
            action();
        }
        count
    }
}

static_assertions::assert_impl_all!(ThrottleGate: Send, Sync);

//! Window-resize pool: a single shared listener.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use super::table::{PoolTable, Removal};
use super::{SubscriberId, WindowCallback};
use crate::host::{ListenerId, ObserverHost, ViewportSize, WindowResizeHandler};
use crate::logging::{span_names, targets};

type WindowTable = PoolTable<(), ListenerId, WindowCallback>;

/// Fans window resize notifications out to every subscriber.
///
/// The platform listener is attached on the 0 → 1 subscriber transition and
/// detached on 1 → 0.
pub struct WindowPool {
    host: Arc<dyn ObserverHost>,
    table: Arc<Mutex<WindowTable>>,
    membership: ReentrantMutex<()>,
}

impl WindowPool {
    pub(crate) fn new(host: Arc<dyn ObserverHost>) -> Self {
        Self {
            host,
            table: Arc::new(Mutex::new(PoolTable::default())),
            membership: ReentrantMutex::new(()),
        }
    }

    /// Subscribe `callback` to viewport size changes.
    pub fn subscribe(&self, callback: WindowCallback) -> SubscriberId {
        let _membership = self.membership.lock();
        let joined = self.table.lock().join(&(), callback);
        let callback = match joined {
            Ok(id) => return id,
            Err(callback) => callback,
        };

        let weak = Arc::downgrade(&self.table);
        let handler: WindowResizeHandler =
            Arc::new(move |viewport: ViewportSize| dispatch(&weak, viewport));
        tracing::debug!(target: targets::POOL, "attaching window resize listener");
        let listener = self.host.add_window_resize_listener(handler);
        let (id, unused) = self.table.lock().insert((), listener, callback);
        if let Some(spare) = unused {
            self.detach(spare);
        }
        id
    }

    /// Remove a subscription. Unknown or repeated ids are ignored.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let _membership = self.membership.lock();
        let removal = self.table.lock().unsubscribe(&(), id);
        match removal {
            None => false,
            Some(Removal::Remaining { .. }) => true,
            Some(Removal::Last { resource, .. }) => {
                tracing::debug!(target: targets::POOL, "detaching window resize listener");
                self.detach(resource);
                true
            }
        }
    }

    fn detach(&self, listener: ListenerId) {
        if let Err(err) = self.host.remove_window_resize_listener(listener) {
            tracing::debug!(target: targets::POOL, %err, "ignoring listener teardown error");
        }
    }

    /// Whether the platform listener is attached.
    pub fn is_attached(&self) -> bool {
        self.table.lock().contains_key(&())
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.table.lock().subscriber_count()
    }
}

fn dispatch(table: &Weak<Mutex<WindowTable>>, viewport: ViewportSize) {
    let Some(table) = table.upgrade() else {
        return;
    };
    let _span = tracing::trace_span!(target: targets::POOL, span_names::POOL_DISPATCH, pool = "window").entered();

    let callbacks = table.lock().snapshot(&(), |cb| Some(cb.clone()));
    tracing::trace!(target: targets::POOL, subscribers = callbacks.len(), "window dispatch");
    for callback in callbacks {
        callback(viewport);
    }
}

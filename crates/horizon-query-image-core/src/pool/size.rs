//! Size pool: one size observer per observed node.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use super::table::{PoolTable, Removal};
use super::{teardown_observer, SizeCallback, SubscriberId};
use crate::host::{NodeId, ObserverHost, PlatformObserver, ResizeEntry, ResizeHandler};
use crate::logging::{span_names, targets};

type SizeTable = PoolTable<NodeId, Arc<dyn PlatformObserver>, SizeCallback>;

/// Multiplexes size-change subscribers onto one observer per target node.
///
/// Every subscriber of a target receives every record for that target, even
/// when several subscribers share the target (for example, sibling widgets
/// observing the same container).
pub struct SizePool {
    host: Arc<dyn ObserverHost>,
    table: Arc<Mutex<SizeTable>>,
    membership: ReentrantMutex<()>,
}

impl SizePool {
    pub(crate) fn new(host: Arc<dyn ObserverHost>) -> Self {
        Self {
            host,
            table: Arc::new(Mutex::new(PoolTable::default())),
            membership: ReentrantMutex::new(()),
        }
    }

    /// Subscribe `callback` to size changes of `target`.
    ///
    /// The first subscriber for a target constructs the observer. A report
    /// the host delivers while the target is being observed already reaches
    /// this subscriber.
    pub fn subscribe(&self, target: NodeId, callback: SizeCallback) -> SubscriberId {
        let _membership = self.membership.lock();
        let joined = self.table.lock().join(&target, callback);
        let callback = match joined {
            Ok(id) => return id,
            Err(callback) => callback,
        };

        let weak = Arc::downgrade(&self.table);
        let handler: ResizeHandler = Arc::new(move |entries: &[ResizeEntry]| dispatch(&weak, entries));
        let observer = self.host.create_resize_observer(handler);
        let (id, unused) = self.table.lock().insert(target, observer.clone(), callback);
        match unused {
            Some(spare) => teardown_observer(spare),
            None => {
                tracing::debug!(target: targets::POOL, node = ?target, "created size observer");
                observer.observe(target);
            }
        }
        id
    }

    /// Remove a subscription. Unknown or repeated ids are ignored.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, target: NodeId, id: SubscriberId) -> bool {
        let _membership = self.membership.lock();
        let removal = self.table.lock().unsubscribe(&target, id);
        match removal {
            None => false,
            Some(Removal::Remaining { .. }) => true,
            Some(Removal::Last { resource, .. }) => {
                tracing::debug!(target: targets::POOL, node = ?target, "tearing down size observer");
                teardown_observer(resource);
                true
            }
        }
    }

    /// Whether an observer currently exists for `target`.
    pub fn is_observing(&self, target: NodeId) -> bool {
        self.table.lock().contains_key(&target)
    }

    /// Number of subscribers on `target`.
    pub fn subscriber_count(&self, target: NodeId) -> usize {
        self.table.lock().subscribers_of(&target)
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        let table = self.table.lock();
        (table.entry_count(), table.subscriber_count())
    }
}

fn dispatch(table: &Weak<Mutex<SizeTable>>, entries: &[ResizeEntry]) {
    let Some(table) = table.upgrade() else {
        return;
    };
    let _span = tracing::trace_span!(target: targets::POOL, span_names::POOL_DISPATCH, pool = "size").entered();

    for entry in entries {
        let callbacks = table.lock().snapshot(&entry.target, |cb| Some(cb.clone()));
        tracing::trace!(
            target: targets::POOL,
            node = ?entry.target,
            subscribers = callbacks.len(),
            "size dispatch"
        );
        for callback in callbacks {
            callback(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, SizeCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback: SizeCallback =
            Arc::new(move |entry: &ResizeEntry| seen_clone.lock().push(entry.inline_size));
        (seen, callback)
    }

    #[test]
    fn test_shared_target_single_observer() {
        let host = Arc::new(HeadlessHost::new());
        let pool = SizePool::new(host.clone());
        let container = host.create_node(100.0);

        let (seen_a, cb_a) = recorder();
        let (seen_b, cb_b) = recorder();
        pool.subscribe(container, cb_a);
        pool.subscribe(container, cb_b);
        assert_eq!(host.resize_observer_count(), 1);

        host.resize_node(container, 450.0);
        assert_eq!(*seen_a.lock(), vec![450.0]);
        assert_eq!(*seen_b.lock(), vec![450.0]);
    }

    #[test]
    fn test_identical_callbacks_are_distinct_subscriptions() {
        let host = Arc::new(HeadlessHost::new());
        let pool = SizePool::new(host.clone());
        let container = host.create_node(100.0);

        let (seen, cb) = recorder();
        let first = pool.subscribe(container, cb.clone());
        let second = pool.subscribe(container, cb);
        assert_ne!(first, second);
        assert_eq!(pool.subscriber_count(container), 2);

        host.resize_node(container, 300.0);
        assert_eq!(*seen.lock(), vec![300.0, 300.0]);
    }

    #[test]
    fn test_teardown_on_last_unsubscribe() {
        let host = Arc::new(HeadlessHost::new());
        let pool = SizePool::new(host.clone());
        let container = host.create_node(100.0);

        let (seen, cb) = recorder();
        let a = pool.subscribe(container, cb.clone());
        let b = pool.subscribe(container, cb);

        assert!(pool.unsubscribe(container, a));
        assert_eq!(host.resize_observer_count(), 1);
        host.resize_node(container, 200.0);
        assert_eq!(*seen.lock(), vec![200.0]);

        assert!(pool.unsubscribe(container, b));
        assert_eq!(host.resize_observer_count(), 0);
        assert!(!pool.is_observing(container));

        // Double unsubscribe is a no-op.
        assert!(!pool.unsubscribe(container, b));
    }

    #[test]
    fn test_targets_are_independent() {
        let host = Arc::new(HeadlessHost::new());
        let pool = SizePool::new(host.clone());
        let left = host.create_node(100.0);
        let right = host.create_node(100.0);

        let (seen_left, cb_left) = recorder();
        let (seen_right, cb_right) = recorder();
        let left_id = pool.subscribe(left, cb_left);
        pool.subscribe(right, cb_right);
        assert_eq!(host.resize_observer_count(), 2);

        // An id only unsubscribes under the target it was registered with.
        assert!(!pool.unsubscribe(right, left_id));

        host.resize_node(right, 640.0);
        assert!(seen_left.lock().is_empty());
        assert_eq!(*seen_right.lock(), vec![640.0]);
    }
}

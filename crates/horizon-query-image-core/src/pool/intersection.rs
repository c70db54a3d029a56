//! Intersection pool: one intersection observer per (margin, threshold).

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use super::table::{PoolTable, Removal};
use super::{teardown_observer, IntersectionCallback, SubscriberId};
use crate::host::{
    IntersectionEntry, IntersectionHandler, IntersectionOptions, NodeId, ObserverHost,
    PlatformObserver,
};
use crate::logging::{span_names, targets};

type IntersectionTable =
    PoolTable<String, Arc<dyn PlatformObserver>, (NodeId, IntersectionCallback)>;

/// Shares intersection observers between all targets with equal options.
///
/// Only records that report the target as intersecting reach subscribers;
/// leaving the viewport is not reported. Subscriptions are meant to be
/// one-shot: callers typically unsubscribe from inside their callback.
pub struct IntersectionPool {
    host: Arc<dyn ObserverHost>,
    table: Arc<Mutex<IntersectionTable>>,
    membership: ReentrantMutex<()>,
}

impl IntersectionPool {
    pub(crate) fn new(host: Arc<dyn ObserverHost>) -> Self {
        Self {
            host,
            table: Arc::new(Mutex::new(PoolTable::default())),
            membership: ReentrantMutex::new(()),
        }
    }

    /// Subscribe `callback` to `target` entering view under `options`.
    ///
    /// If the target is already in view, the host's initial report may reach
    /// `callback` before this returns.
    pub fn subscribe(
        &self,
        options: IntersectionOptions,
        target: NodeId,
        callback: IntersectionCallback,
    ) -> SubscriberId {
        let key = options.key();
        let _membership = self.membership.lock();

        let joined = {
            let mut table = self.table.lock();
            let already_observed = references(&table, &key, target);
            table.join(&key, (target, callback)).map(|id| {
                let observer = table.resource(&key).filter(|_| !already_observed).cloned();
                (id, observer)
            })
        };
        let (id, observer) = match joined {
            Ok(joined) => joined,
            Err(subscriber) => self.create(options, key, subscriber),
        };

        if let Some(observer) = observer {
            observer.observe(target);
        }
        id
    }

    /// Build the observer for a new entry. Returns the id and the observer
    /// the target must be observed with.
    fn create(
        &self,
        options: IntersectionOptions,
        key: String,
        subscriber: (NodeId, IntersectionCallback),
    ) -> (SubscriberId, Option<Arc<dyn PlatformObserver>>) {
        let weak = Arc::downgrade(&self.table);
        let handler_key = key.clone();
        let handler: IntersectionHandler =
            Arc::new(move |entries: &[IntersectionEntry]| dispatch(&weak, &handler_key, entries));
        let observer = self.host.create_intersection_observer(options, handler);

        let (id, unused) = {
            let mut table = self.table.lock();
            let (id, unused) = table.insert(key.clone(), observer.clone(), subscriber);
            (id, unused.map(|spare| (spare, table.resource(&key).cloned())))
        };
        match unused {
            Some((spare, existing)) => {
                teardown_observer(spare);
                (id, existing)
            }
            None => {
                tracing::debug!(target: targets::POOL, key = %key, "created intersection observer");
                (id, Some(observer))
            }
        }
    }

    /// Remove a subscription. Unknown or repeated ids are ignored.
    ///
    /// The target stays observed while other subscriptions on the same entry
    /// still reference it. Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, options: IntersectionOptions, target: NodeId, id: SubscriberId) -> bool {
        let key = options.key();
        let _membership = self.membership.lock();

        let removal = {
            let mut table = self.table.lock();
            match table.unsubscribe(&key, id) {
                None => None,
                Some(Removal::Remaining { subscriber: (node, _) }) => {
                    let observer = table
                        .resource(&key)
                        .filter(|_| !references(&table, &key, node))
                        .cloned();
                    Some((node, observer, false))
                }
                Some(Removal::Last { subscriber: (node, _), resource }) => Some((node, Some(resource), true)),
            }
        };

        match removal {
            None => false,
            Some((_, None, _)) => true,
            Some((node, Some(observer), false)) => {
                observer.unobserve(node);
                true
            }
            Some((_, Some(observer), true)) => {
                tracing::debug!(
                    target: targets::POOL,
                    key = %key,
                    node = ?target,
                    "tearing down intersection observer"
                );
                teardown_observer(observer);
                true
            }
        }
    }

    /// Whether an observer exists for `options`.
    pub fn has_observer(&self, options: IntersectionOptions) -> bool {
        self.table.lock().contains_key(&options.key())
    }

    /// Number of subscribers sharing the observer for `options`.
    pub fn subscriber_count(&self, options: IntersectionOptions) -> usize {
        self.table.lock().subscribers_of(&options.key())
    }

    /// Whether `id` is still subscribed.
    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.table.lock().is_subscribed(id)
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        let table = self.table.lock();
        (table.entry_count(), table.subscriber_count())
    }
}

/// Whether any subscription under `key` watches `target`.
fn references(table: &IntersectionTable, key: &String, target: NodeId) -> bool {
    !table
        .snapshot(key, |(node, _)| (*node == target).then_some(()))
        .is_empty()
}

fn dispatch(table: &Weak<Mutex<IntersectionTable>>, key: &String, entries: &[IntersectionEntry]) {
    let Some(table) = table.upgrade() else {
        return;
    };
    let _span = tracing::trace_span!(target: targets::POOL, span_names::POOL_DISPATCH, pool = "intersection").entered();

    for entry in entries.iter().filter(|entry| entry.is_intersecting) {
        let callbacks = table.lock().snapshot(key, |(node, callback)| {
            (*node == entry.target).then(|| callback.clone())
        });
        tracing::trace!(
            target: targets::POOL,
            key = %key,
            node = ?entry.target,
            subscribers = callbacks.len(),
            "intersection dispatch"
        );
        for callback in callbacks {
            callback(entry);
        }
    }
}

//! Shared observer pools.
//!
//! Platform observers are expensive, so widget instances never construct
//! their own. Instead they subscribe to one of three pools, each of which
//! multiplexes many subscribers onto one platform observer per key:
//!
//! | Pool                 | Key                       | Platform primitive          |
//! |----------------------|---------------------------|-----------------------------|
//! | [`SizePool`]         | observed [`NodeId`]       | size observer               |
//! | [`WindowPool`]       | singleton                 | window resize listener      |
//! | [`IntersectionPool`] | `(margin, threshold)`     | intersection observer       |
//!
//! Entries are created lazily with their first subscriber and torn down the
//! moment their last subscriber leaves, so N instances cost one observer per
//! distinct key rather than one per instance.
//!
//! Dispatch snapshots the subscriber list before invoking callbacks, so a
//! callback may unsubscribe itself (or subscribe others) while a fan-out is
//! in progress. Subscribers are invoked in registration order.
//!
//! A pool only holds its table lock while editing the table. Constructing,
//! observing, unobserving and tearing down platform observers all happen
//! after the lock is released, since a host may report a target's initial
//! state from inside `observe`. Membership changes are serialized per pool
//! by a re-entrant lock, so a callback reached from `observe` may subscribe
//! or unsubscribe on the same thread.
//!
//! [`NodeId`]: crate::NodeId

use std::sync::Arc;

use slotmap::new_key_type;

use crate::host::{IntersectionEntry, ObserverHost, PlatformObserver, ResizeEntry, ViewportSize};
use crate::logging::targets;

mod intersection;
mod size;
mod table;
mod window;

pub use intersection::IntersectionPool;
pub use size::SizePool;
pub use window::WindowPool;

new_key_type! {
    /// Identifies one subscription to a pool.
    ///
    /// Every subscribe call returns a fresh id, so two subscriptions are
    /// distinct even when they register the same closure.
    pub struct SubscriberId;
}

/// Callback receiving raw size-change records.
pub type SizeCallback = Arc<dyn Fn(&ResizeEntry) + Send + Sync>;

/// Callback receiving viewport sizes.
pub type WindowCallback = Arc<dyn Fn(ViewportSize) + Send + Sync>;

/// Callback receiving "entered view" records.
pub type IntersectionCallback = Arc<dyn Fn(&IntersectionEntry) + Send + Sync>;

/// Live entry and subscriber counts, per pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Size observers alive.
    pub size_observers: usize,
    /// Subscriptions across all size observers.
    pub size_subscribers: usize,
    /// Whether the window resize listener is attached.
    pub window_listener_attached: bool,
    /// Window resize subscriptions.
    pub window_subscribers: usize,
    /// Intersection observers alive.
    pub intersection_observers: usize,
    /// Subscriptions across all intersection observers.
    pub intersection_subscribers: usize,
}

/// The three shared pools over one host.
///
/// A registry is a process-scoped service: create one per document and
/// hand it to every widget instance.
pub struct ObserverRegistry {
    size: SizePool,
    window: WindowPool,
    intersection: IntersectionPool,
}

impl ObserverRegistry {
    /// Create empty pools backed by `host`.
    pub fn new(host: Arc<dyn ObserverHost>) -> Self {
        Self {
            size: SizePool::new(host.clone()),
            window: WindowPool::new(host.clone()),
            intersection: IntersectionPool::new(host),
        }
    }

    /// The size pool.
    pub fn size(&self) -> &SizePool {
        &self.size
    }

    /// The window resize pool.
    pub fn window(&self) -> &WindowPool {
        &self.window
    }

    /// The intersection pool.
    pub fn intersection(&self) -> &IntersectionPool {
        &self.intersection
    }

    /// Snapshot of live entries and subscribers.
    pub fn stats(&self) -> RegistryStats {
        let (size_observers, size_subscribers) = self.size.counts();
        let (intersection_observers, intersection_subscribers) = self.intersection.counts();
        RegistryStats {
            size_observers,
            size_subscribers,
            window_listener_attached: self.window.is_attached(),
            window_subscribers: self.window.subscriber_count(),
            intersection_observers,
            intersection_subscribers,
        }
    }
}

static_assertions::assert_impl_all!(ObserverRegistry: Send, Sync);

/// Disconnect an observer whose entry has been removed.
///
/// An observer the platform already disconnected is not an error worth
/// surfacing; it is logged and dropped.
fn teardown_observer(observer: Arc<dyn PlatformObserver>) {
    if let Err(err) = observer.disconnect() {
        tracing::debug!(target: targets::POOL, %err, "ignoring observer teardown error");
    }
}

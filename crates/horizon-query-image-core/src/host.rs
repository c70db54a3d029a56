//! The platform boundary.
//!
//! Everything the pools need from the hosting document goes through
//! [`ObserverHost`]: constructing size and intersection observers, attaching
//! the window resize listener, and answering measurement queries. A browser
//! binding implements it over the real observer APIs; [`HeadlessHost`]
//! implements it in memory.
//!
//! [`HeadlessHost`]: crate::HeadlessHost

use std::sync::Arc;

use slotmap::new_key_type;

use crate::error::ObserverError;

new_key_type! {
    /// Identifies a node in the host document.
    ///
    /// Ids are generational: once a node is removed its id never refers to
    /// another node. Pools key on ids, so they never keep a node alive.
    pub struct NodeId;
}

new_key_type! {
    /// Identifies a window resize listener registered with the host.
    pub struct ListenerId;
}

/// One size-change record delivered by a size observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeEntry {
    /// The observed node.
    pub target: NodeId,
    /// Content-box inline size in CSS pixels.
    pub inline_size: f64,
    /// Content-box block size in CSS pixels.
    pub block_size: f64,
}

/// One intersection record delivered by an intersection observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    /// The observed node.
    pub target: NodeId,
    /// Whether the node currently intersects the (margin-expanded) viewport.
    pub is_intersecting: bool,
    /// Fraction of the node that is visible.
    pub intersection_ratio: f64,
}

/// The viewport dimensions reported with window resize notifications.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportSize {
    /// Viewport width in CSS pixels.
    pub width: f64,
    /// Viewport height in CSS pixels.
    pub height: f64,
}

impl ViewportSize {
    /// Create a viewport size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Construction parameters of an intersection observer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntersectionOptions {
    /// Preload margin added around the viewport, in pixels.
    pub margin_px: u32,
    /// Visible fraction in `[0, 1]` required to count as intersecting.
    pub threshold: f64,
}

impl IntersectionOptions {
    /// Create intersection options.
    pub fn new(margin_px: u32, threshold: f64) -> Self {
        Self {
            margin_px,
            threshold,
        }
    }

    /// The stable pool key for these options.
    ///
    /// Two option sets with equal margin and threshold always produce the
    /// same key, so they share one underlying observer.
    pub fn key(&self) -> String {
        format!("{}px/{}", self.margin_px, self.threshold)
    }

    /// The root margin in CSS syntax.
    pub fn root_margin(&self) -> String {
        format!("{}px", self.margin_px)
    }
}

/// Handler invoked by a size observer with a batch of records.
pub type ResizeHandler = Arc<dyn Fn(&[ResizeEntry]) + Send + Sync>;

/// Handler invoked by an intersection observer with a batch of records.
pub type IntersectionHandler = Arc<dyn Fn(&[IntersectionEntry]) + Send + Sync>;

/// Handler invoked by the window resize listener.
pub type WindowResizeHandler = Arc<dyn Fn(ViewportSize) + Send + Sync>;

/// A platform observer owned by a pool entry.
///
/// Like the platform primitives it stands for, an observer reports the
/// current state of a target as soon as it starts observing it. That first
/// report may be delivered synchronously from inside [`observe`], so pools
/// never call into an observer while holding their own locks.
///
/// [`observe`]: PlatformObserver::observe
pub trait PlatformObserver: Send + Sync {
    /// Start observing `target`. Observing an observed target is a no-op.
    fn observe(&self, target: NodeId);

    /// Stop observing `target`.
    fn unobserve(&self, target: NodeId);

    /// Tear the observer down. No further notifications are delivered.
    fn disconnect(&self) -> Result<(), ObserverError>;
}

/// The hosting document.
pub trait ObserverHost: Send + Sync {
    /// Construct a size observer that reports to `handler`.
    fn create_resize_observer(&self, handler: ResizeHandler) -> Arc<dyn PlatformObserver>;

    /// Construct an intersection observer with the given options.
    fn create_intersection_observer(
        &self,
        options: IntersectionOptions,
        handler: IntersectionHandler,
    ) -> Arc<dyn PlatformObserver>;

    /// Attach a window resize listener.
    fn add_window_resize_listener(&self, handler: WindowResizeHandler) -> ListenerId;

    /// Detach a window resize listener.
    fn remove_window_resize_listener(&self, id: ListenerId) -> Result<(), ObserverError>;

    /// Current inline size of `node`, if it exists.
    fn inline_size(&self, node: NodeId) -> Option<f64>;

    /// Parent of `node`, if any.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Current viewport size.
    fn viewport(&self) -> ViewportSize;
}

//! An in-memory host for non-browser environments.
//!
//! [`HeadlessHost`] keeps a tree of nodes with sizes and visibility, and
//! delivers size, intersection, and window notifications synchronously when
//! driven through [`resize_node`](HeadlessHost::resize_node),
//! [`set_visible_ratio`](HeadlessHost::set_visible_ratio), and
//! [`resize_viewport`](HeadlessHost::resize_viewport). Like a browser, an
//! intersection observer also reports a target's current visibility as soon
//! as it starts observing it. Handlers always run with the host's lock
//! released, so they may (un)observe freely.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_query_image_core::{HeadlessHost, ObserverRegistry, ResizeEntry};
//!
//! let host = Arc::new(HeadlessHost::new());
//! let registry = ObserverRegistry::new(host.clone());
//! let container = host.create_node(320.0);
//!
//! registry.size().subscribe(container, Arc::new(|entry: &ResizeEntry| {
//!     println!("container is now {}px wide", entry.inline_size);
//! }));
//! host.resize_node(container, 640.0);
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::error::ObserverError;
use crate::host::{
    IntersectionEntry, IntersectionHandler, IntersectionOptions, ListenerId, NodeId,
    ObserverHost, PlatformObserver, ResizeEntry, ResizeHandler, ViewportSize,
    WindowResizeHandler,
};
use crate::logging::targets;

new_key_type! {
    struct ObserverKey;
}

#[derive(Debug, Clone, Copy, Default)]
struct HeadlessNode {
    parent: Option<NodeId>,
    inline_size: f64,
    block_size: f64,
    visible_ratio: f64,
}

#[derive(Clone)]
enum ObserverKind {
    Resize(ResizeHandler),
    Intersection {
        options: IntersectionOptions,
        handler: IntersectionHandler,
    },
}

struct ObserverSlot {
    kind: ObserverKind,
    targets: Vec<NodeId>,
}

struct HeadlessState {
    nodes: SlotMap<NodeId, HeadlessNode>,
    observers: SlotMap<ObserverKey, ObserverSlot>,
    listeners: SlotMap<ListenerId, WindowResizeHandler>,
    viewport: ViewportSize,
}

impl HeadlessState {
    fn observers_of(&self, node: NodeId) -> impl Iterator<Item = &ObserverKind> {
        self.observers
            .values()
            .filter(move |slot| slot.targets.contains(&node))
            .map(|slot| &slot.kind)
    }
}

/// An [`ObserverHost`] backed by an in-memory node tree.
pub struct HeadlessHost {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessHost {
    /// Create a host with an empty tree and a 1280×720 viewport.
    pub fn new() -> Self {
        Self::with_viewport(ViewportSize::new(1280.0, 720.0))
    }

    /// Create a host with the given viewport.
    pub fn with_viewport(viewport: ViewportSize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState {
                nodes: SlotMap::with_key(),
                observers: SlotMap::with_key(),
                listeners: SlotMap::with_key(),
                viewport,
            })),
        }
    }

    // ========================================================================
    // Tree
    // ========================================================================

    /// Create a root node with the given inline size.
    pub fn create_node(&self, inline_size: f64) -> NodeId {
        self.state.lock().nodes.insert(HeadlessNode {
            inline_size,
            ..Default::default()
        })
    }

    /// Create a child of `parent`.
    pub fn create_child(&self, parent: NodeId, inline_size: f64) -> NodeId {
        self.state.lock().nodes.insert(HeadlessNode {
            parent: Some(parent),
            inline_size,
            ..Default::default()
        })
    }

    /// Remove a node. Observers stop reporting it.
    pub fn remove_node(&self, node: NodeId) -> bool {
        let mut state = self.state.lock();
        for slot in state.observers.values_mut() {
            slot.targets.retain(|target| *target != node);
        }
        state.nodes.remove(node).is_some()
    }

    // ========================================================================
    // Drivers
    // ========================================================================

    /// Change a node's inline size and notify its size observers.
    pub fn resize_node(&self, node: NodeId, inline_size: f64) {
        let (entry, handlers) = {
            let mut state = self.state.lock();
            let Some(data) = state.nodes.get_mut(node) else {
                return;
            };
            data.inline_size = inline_size;
            let entry = ResizeEntry {
                target: node,
                inline_size,
                block_size: data.block_size,
            };
            let handlers: Vec<ResizeHandler> = state
                .observers_of(node)
                .filter_map(|kind| match kind {
                    ObserverKind::Resize(handler) => Some(handler.clone()),
                    ObserverKind::Intersection { .. } => None,
                })
                .collect();
            (entry, handlers)
        };

        tracing::trace!(target: targets::HEADLESS, ?node, inline_size, observers = handlers.len(), "resize");
        for handler in handlers {
            handler(&[entry]);
        }
    }

    /// Change a node's visible fraction and notify its intersection observers.
    ///
    /// A node intersects an observer when the ratio is positive and at least
    /// the observer's threshold. Margins are reported through
    /// [`IntersectionOptions::root_margin`] but not modelled geometrically:
    /// the ratio is taken as already margin-adjusted.
    pub fn set_visible_ratio(&self, node: NodeId, ratio: f64) {
        let deliveries: Vec<(IntersectionHandler, IntersectionEntry)> = {
            let mut state = self.state.lock();
            let Some(data) = state.nodes.get_mut(node) else {
                return;
            };
            data.visible_ratio = ratio;
            state
                .observers_of(node)
                .filter_map(|kind| match kind {
                    ObserverKind::Intersection { options, handler } => Some((
                        handler.clone(),
                        IntersectionEntry {
                            target: node,
                            is_intersecting: intersects(ratio, options),
                            intersection_ratio: ratio,
                        },
                    )),
                    ObserverKind::Resize(_) => None,
                })
                .collect()
        };

        tracing::trace!(target: targets::HEADLESS, ?node, ratio, observers = deliveries.len(), "visibility");
        for (handler, entry) in deliveries {
            handler(&[entry]);
        }
    }

    /// Change the viewport size and notify window resize listeners.
    pub fn resize_viewport(&self, width: f64, height: f64) {
        let viewport = ViewportSize::new(width, height);
        let listeners: Vec<WindowResizeHandler> = {
            let mut state = self.state.lock();
            state.viewport = viewport;
            state.listeners.values().cloned().collect()
        };

        tracing::trace!(target: targets::HEADLESS, width, height, listeners = listeners.len(), "viewport resize");
        for listener in listeners {
            listener(viewport);
        }
    }

    /// Disconnect every observer from the platform side, as a browser does
    /// when a document is torn down.
    pub fn disconnect_all_observers(&self) {
        self.state.lock().observers.clear();
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Number of live size observers.
    pub fn resize_observer_count(&self) -> usize {
        self.state
            .lock()
            .observers
            .values()
            .filter(|slot| matches!(slot.kind, ObserverKind::Resize(_)))
            .count()
    }

    /// Number of live intersection observers.
    pub fn intersection_observer_count(&self) -> usize {
        self.state
            .lock()
            .observers
            .values()
            .filter(|slot| matches!(slot.kind, ObserverKind::Intersection { .. }))
            .count()
    }

    /// Number of attached window resize listeners.
    pub fn window_listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Whether any observer currently watches `node`.
    pub fn is_observed(&self, node: NodeId) -> bool {
        self.state.lock().observers_of(node).next().is_some()
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverHost for HeadlessHost {
    fn create_resize_observer(&self, handler: ResizeHandler) -> Arc<dyn PlatformObserver> {
        let key = self.state.lock().observers.insert(ObserverSlot {
            kind: ObserverKind::Resize(handler),
            targets: Vec::new(),
        });
        Arc::new(HeadlessObserver {
            state: Arc::downgrade(&self.state),
            key,
        })
    }

    fn create_intersection_observer(
        &self,
        options: IntersectionOptions,
        handler: IntersectionHandler,
    ) -> Arc<dyn PlatformObserver> {
        let key = self.state.lock().observers.insert(ObserverSlot {
            kind: ObserverKind::Intersection { options, handler },
            targets: Vec::new(),
        });
        Arc::new(HeadlessObserver {
            state: Arc::downgrade(&self.state),
            key,
        })
    }

    fn add_window_resize_listener(&self, handler: WindowResizeHandler) -> ListenerId {
        self.state.lock().listeners.insert(handler)
    }

    fn remove_window_resize_listener(&self, id: ListenerId) -> Result<(), ObserverError> {
        self.state
            .lock()
            .listeners
            .remove(id)
            .map(|_| ())
            .ok_or(ObserverError::UnknownListener)
    }

    fn inline_size(&self, node: NodeId) -> Option<f64> {
        self.state.lock().nodes.get(node).map(|data| data.inline_size)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().nodes.get(node).and_then(|data| data.parent)
    }

    fn viewport(&self) -> ViewportSize {
        self.state.lock().viewport
    }
}

static_assertions::assert_impl_all!(HeadlessHost: Send, Sync);

/// Handle to an observer slot inside a [`HeadlessHost`].
struct HeadlessObserver {
    state: Weak<Mutex<HeadlessState>>,
    key: ObserverKey,
}

impl PlatformObserver for HeadlessObserver {
    /// Intersection observers report the target's current visibility right
    /// away, intersecting or not. Size observers stay quiet until the next
    /// resize.
    fn observe(&self, target: NodeId) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let initial = {
            let mut state = state.lock();
            let ratio = state.nodes.get(target).map(|data| data.visible_ratio);
            let Some(slot) = state.observers.get_mut(self.key) else {
                return;
            };
            if slot.targets.contains(&target) {
                return;
            }
            slot.targets.push(target);
            match (&slot.kind, ratio) {
                (ObserverKind::Intersection { options, handler }, Some(ratio)) => Some((
                    handler.clone(),
                    IntersectionEntry {
                        target,
                        is_intersecting: intersects(ratio, options),
                        intersection_ratio: ratio,
                    },
                )),
                _ => None,
            }
        };

        if let Some((handler, entry)) = initial {
            tracing::trace!(target: targets::HEADLESS, node = ?target, ratio = entry.intersection_ratio, "initial visibility");
            handler(&[entry]);
        }
    }

    fn unobserve(&self, target: NodeId) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        if let Some(slot) = state.lock().observers.get_mut(self.key) {
            slot.targets.retain(|other| *other != target);
        }
    }

    fn disconnect(&self) -> Result<(), ObserverError> {
        let state = self.state.upgrade().ok_or(ObserverError::AlreadyDisconnected)?;
        let removed = state.lock().observers.remove(self.key);
        removed.map(|_| ()).ok_or(ObserverError::AlreadyDisconnected)
    }
}

fn intersects(ratio: f64, options: &IntersectionOptions) -> bool {
    ratio > 0.0 && ratio >= options.threshold
}

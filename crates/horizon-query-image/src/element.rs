//! The `<query-image>` lifecycle controller.
//!
//! Each [`QueryImage`] moves through a small state machine:
//!
//! ```text
//! Unattached --connect--> Watching --qualifies + src--> Loaded
//!                            |                            |
//!                            +--------disconnect----------+--> Detached --connect--> Watching
//! ```
//!
//! On connect the instance snapshots its condition attributes, joins the
//! pool its mode selects, and checks immediately. Container and media
//! dispatches go through the context's throttle gate before re-checking;
//! a view dispatch loads on the spot and leaves the intersection pool.
//!
//! Loading is monotonic within an attachment: later checks only update the
//! advisory `qualifies` flag. While loaded, `src`, `srcset` and `sizes` are
//! frozen. Changing a condition attribute forgets the load and starts over;
//! changing only the mode does not.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use horizon_query_image_core::logging::{span_names, targets};
use horizon_query_image_core::{
    InstanceId, IntersectionEntry, IntersectionOptions, NodeId, ResizeEntry, Signal,
    SubscriberId, ViewportSize,
};
use parking_lot::Mutex;

use crate::attributes::{self, Attributes};
use crate::config::{plan_transitions, ConfigDiff, InstanceConfig, QueryMode, Transition};
use crate::context::QueryImageContext;
use crate::error::ConfigWarning;
use crate::render::RenderView;
use crate::resolver::{resolve, Environment, Resolution};

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Never connected.
    #[default]
    Unattached,
    /// Connected and waiting to qualify.
    Watching,
    /// Connected and loaded.
    Loaded,
    /// Disconnected after having been connected.
    Detached,
}

impl Lifecycle {
    /// Whether the instance is connected.
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Watching | Self::Loaded)
    }
}

/// Notification that an instance has loaded its image.
///
/// The event bubbles and crosses encapsulation boundaries: it is delivered
/// on the instance's own signal and then on the context's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedEvent {
    /// The node hosting the instance.
    pub target: NodeId,
    /// The source that was loaded.
    pub src: String,
    /// Always `true`.
    pub bubbles: bool,
    /// Always `true`.
    pub composed: bool,
}

impl LoadedEvent {
    fn new(target: NodeId, src: String) -> Self {
        Self {
            target,
            src,
            bubbles: true,
            composed: true,
        }
    }
}

/// The pool subscription an attached instance holds.
#[derive(Debug, Clone, Copy)]
enum Wiring {
    Size {
        target: NodeId,
        subscriber: SubscriberId,
    },
    Window {
        subscriber: SubscriberId,
    },
    View {
        options: IntersectionOptions,
        subscriber: SubscriberId,
    },
}

#[derive(Default)]
struct InstanceState {
    attributes: Attributes,
    config: InstanceConfig,
    lifecycle: Lifecycle,
    loaded: bool,
    // In view mode: whether the element has entered view.
    qualifies: bool,
    wiring: Option<Wiring>,
    last_warning: Option<ConfigWarning>,
}

impl InstanceState {
    fn refresh_config(&mut self) -> ConfigDiff {
        let config = InstanceConfig::from_attributes(&self.attributes);
        let diff = ConfigDiff::between(&self.config, &config);
        self.config = config;
        diff
    }

    fn note_view_range_warning(&mut self) {
        if self.config.mode != QueryMode::View {
            return;
        }
        if let Some(warning) = &self.config.view_range_warning {
            tracing::warn!(target: targets::ELEMENT, kind = warning.kind(), "{warning}");
            self.last_warning = Some(warning.clone());
        }
    }

    fn src(&self) -> Option<&str> {
        self.attributes
            .get(attributes::SRC)
            .filter(|src| !src.trim().is_empty())
    }

    fn render_view(&self) -> RenderView {
        let image = self.loaded.then(|| {
            attributes::PASS_THROUGH
                .iter()
                .filter_map(|name| {
                    self.attributes
                        .get(name)
                        .map(|value| (name.to_string(), value.to_string()))
                })
                .collect()
        });
        RenderView {
            image,
            loaded: self.loaded,
            qualifies: (self.config.mode != QueryMode::View).then_some(self.qualifies),
        }
    }
}

struct Inner {
    ctx: Arc<QueryImageContext>,
    id: InstanceId,
    node: NodeId,
    state: Mutex<InstanceState>,
    loaded: Signal<LoadedEvent>,
    checks: AtomicUsize,
}

impl Inner {
    fn connect(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.lifecycle.is_attached() {
                return;
            }
            state.refresh_config();
            state.lifecycle = Lifecycle::Watching;
            state.loaded = false;
            state.qualifies = false;
            state.last_warning = None;
            state.note_view_range_warning();
            tracing::debug!(
                target: targets::ELEMENT,
                instance = ?self.id,
                node = ?self.node,
                mode = %state.config.mode,
                "attached"
            );
        }
        self.wire();
        self.check();
    }

    fn disconnect(&self) {
        let wiring = {
            let mut state = self.state.lock();
            if !state.lifecycle.is_attached() {
                return;
            }
            state.lifecycle = Lifecycle::Detached;
            state.wiring.take()
        };
        self.ctx.throttle().cancel(self.id);
        if let Some(wiring) = wiring {
            self.unwire(wiring);
        }
        tracing::debug!(target: targets::ELEMENT, instance = ?self.id, "detached");
    }

    /// Join the pool selected by the current mode.
    ///
    /// In view mode the host may report the element as visible while the
    /// subscription is being made; the element then loads before this
    /// returns and the one-shot subscription is dropped at once.
    fn wire(self: &Arc<Self>) {
        let (mode, options) = {
            let mut state = self.state.lock();
            if state.config.mode == QueryMode::View {
                state.qualifies = false;
            }
            (state.config.mode, state.config.view_range.options())
        };
        let registry = self.ctx.registry();
        let weak = Arc::downgrade(self);

        let wiring = match mode {
            QueryMode::Container => {
                let target = self.container();
                let subscriber = registry.size().subscribe(
                    target,
                    Arc::new(move |_: &ResizeEntry| {
                        if let Some(inner) = weak.upgrade() {
                            inner.trigger();
                        }
                    }),
                );
                Wiring::Size { target, subscriber }
            }
            QueryMode::Media => {
                let subscriber = registry.window().subscribe(Arc::new(move |_: ViewportSize| {
                    if let Some(inner) = weak.upgrade() {
                        inner.trigger();
                    }
                }));
                Wiring::Window { subscriber }
            }
            QueryMode::View => {
                let subscriber = registry.intersection().subscribe(
                    options,
                    self.node,
                    Arc::new(move |_: &IntersectionEntry| {
                        if let Some(inner) = weak.upgrade() {
                            inner.enter_view();
                        }
                    }),
                );
                Wiring::View {
                    options,
                    subscriber,
                }
            }
        };

        let (stale, spent) = {
            let mut state = self.state.lock();
            let entered = mode == QueryMode::View && state.qualifies;
            if entered || !state.lifecycle.is_attached() {
                (state.wiring.take(), Some(wiring))
            } else {
                (state.wiring.replace(wiring), None)
            }
        };
        for wiring in stale.into_iter().chain(spent) {
            self.unwire(wiring);
        }
    }

    fn unwire(&self, wiring: Wiring) {
        let registry = self.ctx.registry();
        match wiring {
            Wiring::Size { target, subscriber } => {
                registry.size().unsubscribe(target, subscriber);
            }
            Wiring::Window { subscriber } => {
                registry.window().unsubscribe(subscriber);
            }
            Wiring::View {
                options,
                subscriber,
            } => {
                registry.intersection().unsubscribe(options, self.node, subscriber);
            }
        }
    }

    fn rewire(self: &Arc<Self>) {
        let current = self.state.lock().wiring.take();
        if let Some(current) = current {
            self.unwire(current);
        }
        self.wire();
    }

    /// The node whose size container mode compares against.
    fn container(&self) -> NodeId {
        self.ctx.host().parent(self.node).unwrap_or(self.node)
    }

    /// Size or viewport dispatch: debounce, then check.
    fn trigger(self: &Arc<Self>) {
        if !self.state.lock().lifecycle.is_attached() {
            return;
        }
        let weak = Arc::downgrade(self);
        self.ctx.throttle().schedule(self.id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.check();
            }
        });
        tracing::trace!(target: targets::ELEMENT, instance = ?self.id, "scheduled check");
    }

    /// View dispatch: qualify once and leave the intersection pool.
    fn enter_view(self: &Arc<Self>) {
        let wiring = {
            let mut state = self.state.lock();
            if !state.lifecycle.is_attached() {
                return;
            }
            state.qualifies = true;
            if matches!(state.wiring, Some(Wiring::View { .. })) {
                state.wiring.take()
            } else {
                None
            }
        };
        if let Some(wiring) = wiring {
            self.unwire(wiring);
        }
        self.check();
    }

    fn resolve(&self, config: &InstanceConfig, current_size: f64) -> Resolution {
        let active = self.ctx.breakpoints().active_breakpoint();
        let env = Environment {
            active_breakpoint: active.as_deref(),
            current_size,
        };
        resolve(config, &env)
    }

    fn check(&self) {
        let _span = tracing::trace_span!(
            target: targets::ELEMENT,
            span_names::QUALIFY,
            instance = ?self.id
        )
        .entered();

        let (config, wiring) = {
            let state = self.state.lock();
            if !state.lifecycle.is_attached() {
                return;
            }
            (state.config.clone(), state.wiring)
        };
        self.checks.fetch_add(1, Ordering::SeqCst);

        let resolution = match config.mode {
            QueryMode::View => None,
            QueryMode::Container => {
                let target = match wiring {
                    Some(Wiring::Size { target, .. }) => target,
                    _ => self.container(),
                };
                let size = self.ctx.host().inline_size(target).unwrap_or(0.0);
                Some(self.resolve(&config, size))
            }
            QueryMode::Media => Some(self.resolve(&config, self.ctx.host().viewport().width)),
        };

        let (view, event) = {
            let mut state = self.state.lock();
            if !state.lifecycle.is_attached() {
                return;
            }
            if let Some(resolution) = resolution {
                state.qualifies = resolution.qualifies;
                if resolution.warning.is_some() {
                    state.last_warning = resolution.warning;
                }
            }

            let mut event = None;
            if state.qualifies && !state.loaded {
                match state.src().map(str::to_string) {
                    Some(src) => {
                        state.loaded = true;
                        state.lifecycle = Lifecycle::Loaded;
                        event = Some(LoadedEvent::new(self.node, src));
                    }
                    None => {
                        tracing::trace!(target: targets::ELEMENT, instance = ?self.id, "qualifies without src");
                    }
                }
            }
            (state.render_view(), event)
        };

        self.ctx.renderer().render(self.node, &view);

        if let Some(event) = event {
            tracing::debug!(target: targets::ELEMENT, instance = ?self.id, src = %event.src, "loaded");
            self.loaded.emit(event.clone());
            self.ctx.loaded().emit(event);
        }
    }

    fn render(&self) {
        let view = self.state.lock().render_view();
        self.ctx.renderer().render(self.node, &view);
    }

    fn set_attribute(self: &Arc<Self>, name: &str, value: Option<&str>) {
        let name = name.to_ascii_lowercase();
        if attributes::is_reflected(&name) {
            tracing::debug!(target: targets::ELEMENT, attribute = %name, "ignoring write to reflected state");
            return;
        }

        let plan = {
            let mut state = self.state.lock();
            if state.loaded && attributes::is_image_identity(&name) {
                tracing::debug!(target: targets::ELEMENT, attribute = %name, "image identity is frozen while loaded");
                return;
            }

            let changed = match value {
                Some(value) => state.attributes.set(&name, value).as_deref() != Some(value),
                None => state.attributes.remove(&name).is_some(),
            };
            if !changed || !state.lifecycle.is_attached() {
                return;
            }

            if attributes::is_condition(&name) {
                let diff = state.refresh_config();
                if diff.mode || diff.view_range {
                    state.note_view_range_warning();
                }
                plan_transitions(&diff, state.loaded)
            } else if name == attributes::SRC {
                vec![Transition::Check]
            } else if attributes::is_pass_through(&name) && state.loaded {
                vec![Transition::Rerender]
            } else {
                Vec::new()
            }
        };

        self.apply(plan);
    }

    fn apply(self: &Arc<Self>, plan: Vec<Transition>) {
        let mut checked = false;
        for step in plan {
            match step {
                Transition::Reset => {
                    let mut state = self.state.lock();
                    state.loaded = false;
                    state.qualifies = false;
                    state.lifecycle = Lifecycle::Watching;
                    tracing::debug!(target: targets::ELEMENT, instance = ?self.id, "reset load state");
                }
                Transition::Rewire => self.rewire(),
                Transition::Check => {
                    self.check();
                    checked = true;
                }
                Transition::Rerender if !checked => self.render(),
                Transition::Rerender => {}
            }
        }
    }
}

/// One `<query-image>` instance.
///
/// Dropping the handle disconnects the instance.
pub struct QueryImage {
    inner: Arc<Inner>,
}

impl QueryImage {
    /// Create an unattached instance hosted at `node`.
    pub fn new(ctx: &Arc<QueryImageContext>, node: NodeId) -> Self {
        Self::with_attributes(ctx, node, Attributes::new())
    }

    /// Create an unattached instance with initial attributes.
    pub fn with_attributes(ctx: &Arc<QueryImageContext>, node: NodeId, attributes: Attributes) -> Self {
        let id = ctx.register_instance(node);
        Self {
            inner: Arc::new(Inner {
                ctx: ctx.clone(),
                id,
                node,
                state: Mutex::new(InstanceState {
                    attributes,
                    ..Default::default()
                }),
                loaded: Signal::new(),
                checks: AtomicUsize::new(0),
            }),
        }
    }

    /// The instance id.
    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// The node hosting this instance.
    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// Attach: snapshot configuration, join a pool, and check once.
    ///
    /// Connecting an attached instance does nothing. Reconnecting a
    /// detached one starts a fresh attachment.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Detach: leave the pool and cancel any pending check.
    ///
    /// Safe to call on an instance that was never connected.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Whether the instance is connected.
    pub fn is_connected(&self) -> bool {
        self.lifecycle().is_attached()
    }

    /// Set (`Some`) or remove (`None`) an attribute.
    pub fn set_attribute(&self, name: &str, value: Option<&str>) {
        self.inner.set_attribute(name, value);
    }

    /// Remove an attribute.
    pub fn remove_attribute(&self, name: &str) {
        self.inner.set_attribute(name, None);
    }

    /// Read an attribute, including the reflected `loaded` and `qualifies`.
    ///
    /// Reflected attributes are boolean: present (empty value) or absent.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let state = self.inner.state.lock();
        match name.as_str() {
            attributes::LOADED => state.loaded.then(String::new),
            attributes::QUALIFIES => {
                (state.config.mode != QueryMode::View && state.qualifies).then(String::new)
            }
            _ => state.attributes.get(&name).map(str::to_string),
        }
    }

    /// A copy of the authored attributes.
    pub fn attributes(&self) -> Attributes {
        self.inner.state.lock().attributes.clone()
    }

    /// The mode in the current configuration snapshot.
    pub fn mode(&self) -> QueryMode {
        self.inner.state.lock().config.mode
    }

    /// Whether the image has loaded.
    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().loaded
    }

    /// Whether the condition currently holds. `None` in view mode.
    pub fn qualifies(&self) -> Option<bool> {
        let state = self.inner.state.lock();
        (state.config.mode != QueryMode::View).then_some(state.qualifies)
    }

    /// Lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    /// The current render projection.
    pub fn render_view(&self) -> RenderView {
        self.inner.state.lock().render_view()
    }

    /// The most recent configuration diagnostic in this attachment.
    pub fn last_warning(&self) -> Option<ConfigWarning> {
        self.inner.state.lock().last_warning.clone()
    }

    /// Number of qualification checks run so far.
    pub fn qualification_checks(&self) -> usize {
        self.inner.checks.load(Ordering::SeqCst)
    }

    /// Instance-level "loaded" notifications.
    pub fn loaded(&self) -> &Signal<LoadedEvent> {
        &self.inner.loaded
    }
}

impl Drop for QueryImage {
    fn drop(&mut self) {
        self.inner.disconnect();
        self.inner.ctx.release_instance(self.inner.id);
    }
}

static_assertions::assert_impl_all!(QueryImage: Send, Sync);

//! Process-scoped services shared by every instance.

use std::sync::Arc;
use std::time::Duration;

use horizon_query_image_core::{
    Clock, InstanceId, NodeId, ObserverHost, ObserverRegistry, Signal, SystemClock, ThrottleGate,
};
use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::breakpoint::{BreakpointSignal, StyleVariables};
use crate::element::LoadedEvent;
use crate::render::{MarkupRenderer, Renderer};
use crate::settings::Settings;

/// Everything an instance needs from its environment.
///
/// One context exists per document. It owns the shared observer pools and
/// the throttle gate, so instances never construct platform observers or
/// timers of their own. The host event loop drives deferred work through
/// [`run_pending`](Self::run_pending).
pub struct QueryImageContext {
    host: Arc<dyn ObserverHost>,
    registry: ObserverRegistry,
    throttle: ThrottleGate,
    style: Arc<StyleVariables>,
    breakpoints: Arc<dyn BreakpointSignal>,
    renderer: Arc<dyn Renderer>,
    settings: Settings,
    instances: Mutex<SlotMap<InstanceId, NodeId>>,
    loaded: Signal<LoadedEvent>,
}

impl QueryImageContext {
    /// Start building a context over `host`.
    pub fn builder(host: Arc<dyn ObserverHost>) -> QueryImageContextBuilder {
        QueryImageContextBuilder::new(host)
    }

    /// The platform host.
    pub fn host(&self) -> &Arc<dyn ObserverHost> {
        &self.host
    }

    /// The shared observer pools.
    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    /// The per-instance debounce.
    pub fn throttle(&self) -> &ThrottleGate {
        &self.throttle
    }

    /// The active breakpoint source.
    pub fn breakpoints(&self) -> &Arc<dyn BreakpointSignal> {
        &self.breakpoints
    }

    /// The document's custom property store.
    ///
    /// It reads the active breakpoint from the configured
    /// [`breakpoint_property`](Settings::breakpoint_property), and is the
    /// breakpoint source unless the builder was given another one.
    pub fn style_variables(&self) -> &Arc<StyleVariables> {
        &self.style
    }

    /// The presentation backend.
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// The settings this context was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Document-level "loaded" notifications.
    ///
    /// Every instance's loaded event propagates here after the instance's
    /// own slots have run.
    pub fn loaded(&self) -> &Signal<LoadedEvent> {
        &self.loaded
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Run every debounced check whose quiet period has elapsed.
    ///
    /// Returns the number of checks run.
    pub fn run_pending(&self) -> usize {
        self.throttle.run_expired()
    }

    /// Time until [`run_pending`](Self::run_pending) has work to do.
    pub fn time_until_next(&self) -> Option<Duration> {
        self.throttle.time_until_next()
    }

    pub(crate) fn register_instance(&self, node: NodeId) -> InstanceId {
        self.instances.lock().insert(node)
    }

    pub(crate) fn release_instance(&self, id: InstanceId) {
        self.instances.lock().remove(id);
    }
}

static_assertions::assert_impl_all!(QueryImageContext: Send, Sync);

/// Builder for [`QueryImageContext`].
pub struct QueryImageContextBuilder {
    host: Arc<dyn ObserverHost>,
    clock: Option<Arc<dyn Clock>>,
    breakpoints: Option<Arc<dyn BreakpointSignal>>,
    renderer: Option<Arc<dyn Renderer>>,
    settings: Settings,
}

impl QueryImageContextBuilder {
    fn new(host: Arc<dyn ObserverHost>) -> Self {
        Self {
            host,
            clock: None,
            breakpoints: None,
            renderer: None,
            settings: Settings::default(),
        }
    }

    /// Use `clock` for the debounce. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Read the active breakpoint from `signal` instead of the context's
    /// own [`StyleVariables`] store.
    pub fn breakpoints(mut self, signal: Arc<dyn BreakpointSignal>) -> Self {
        self.breakpoints = Some(signal);
        self
    }

    /// Render through `renderer`. Defaults to a [`MarkupRenderer`].
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Use `settings`.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the context.
    pub fn build(self) -> Arc<QueryImageContext> {
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let style = Arc::new(StyleVariables::with_breakpoint_property(
            &self.settings.breakpoint_property,
        ));
        let breakpoints: Arc<dyn BreakpointSignal> = match self.breakpoints {
            Some(signal) => signal,
            None => style.clone(),
        };
        let renderer: Arc<dyn Renderer> = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(MarkupRenderer::new()),
        };

        tracing::debug!(
            target: horizon_query_image_core::logging::targets::ELEMENT,
            tag = %self.settings.tag_name,
            delay_ms = self.settings.throttle_delay_ms,
            "created query image context"
        );

        Arc::new(QueryImageContext {
            registry: ObserverRegistry::new(self.host.clone()),
            throttle: ThrottleGate::new(clock, self.settings.throttle_delay()),
            host: self.host,
            style,
            breakpoints,
            renderer,
            settings: self.settings,
            instances: Mutex::new(SlotMap::with_key()),
            loaded: Signal::new(),
        })
    }
}

//! End-to-end lifecycle tests over the headless host.

use std::sync::Arc;
use std::time::Duration;

use horizon_query_image::prelude::*;
use horizon_query_image::{IntersectionOptions, RegistryStats, Signal};
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    host: Arc<HeadlessHost>,
    clock: Arc<ManualClock>,
    renderer: Arc<MarkupRenderer>,
    ctx: Arc<QueryImageContext>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_builder(|builder| builder)
    }

    fn with_builder(configure: impl FnOnce(QueryImageContextBuilder) -> QueryImageContextBuilder) -> Self {
        init_tracing();
        let host = Arc::new(HeadlessHost::new());
        let clock = Arc::new(ManualClock::new());
        let renderer = Arc::new(MarkupRenderer::new());
        let builder = QueryImageContext::builder(host.clone())
            .clock(clock.clone())
            .renderer(renderer.clone());
        let ctx = configure(builder).build();
        Self {
            host,
            clock,
            renderer,
            ctx,
        }
    }

    fn image(&self, node: NodeId, pairs: &[(&str, &str)]) -> QueryImage {
        let attrs: Attributes = pairs.iter().copied().collect();
        QueryImage::with_attributes(&self.ctx, node, attrs)
    }

    fn advance(&self, millis: u64) -> usize {
        self.clock.advance(Duration::from_millis(millis));
        self.ctx.run_pending()
    }

    fn settle(&self) -> usize {
        self.advance(150)
    }
}

fn record(signal: &Signal<LoadedEvent>) -> Arc<Mutex<Vec<LoadedEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    signal.connect(move |event: &LoadedEvent| sink.lock().push(event.clone()));
    events
}

fn sources(events: &Mutex<Vec<LoadedEvent>>) -> Vec<String> {
    events.lock().iter().map(|event| event.src.clone()).collect()
}

// ============================================================================
// Debounce
// ============================================================================

#[test]
fn test_burst_of_resizes_produces_one_check() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(300.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    image.connect();
    assert_eq!(image.qualification_checks(), 1);

    for step in 0..5 {
        fx.host.resize_node(parent, 300.0 + f64::from(step) * 10.0);
        assert_eq!(fx.advance(20), 0);
    }
    assert_eq!(image.qualification_checks(), 1);

    assert_eq!(fx.settle(), 1);
    assert_eq!(image.qualification_checks(), 2);
    assert_eq!(fx.settle(), 0);
}

#[test]
fn test_spaced_resizes_each_produce_a_check() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(300.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    image.connect();

    for width in [310.0, 320.0, 330.0] {
        fx.host.resize_node(parent, width);
        assert_eq!(fx.settle(), 1);
    }
    assert_eq!(image.qualification_checks(), 4);
}

#[test]
fn test_configured_throttle_delay() {
    let fx = Fixture::with_builder(|builder| {
        builder.settings(Settings {
            throttle_delay_ms: 50,
            ..Settings::default()
        })
    });
    let parent = fx.host.create_node(300.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    image.connect();

    fx.host.resize_node(parent, 900.0);
    assert_eq!(fx.ctx.time_until_next(), Some(Duration::from_millis(50)));
    assert_eq!(fx.advance(50), 1);
    assert!(image.is_loaded());
}

#[test]
fn test_disconnect_cancels_pending_check() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(300.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    image.connect();

    fx.host.resize_node(parent, 900.0);
    image.disconnect();
    assert_eq!(fx.settle(), 0);
    assert!(!image.is_loaded());
    assert_eq!(image.qualification_checks(), 1);
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_is_monotonic() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(600.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    let events = record(image.loaded());
    image.connect();
    assert!(image.is_loaded());

    fx.host.resize_node(parent, 100.0);
    fx.settle();
    assert!(image.is_loaded());
    assert_eq!(image.qualifies(), Some(false));
    assert_eq!(image.get_attribute("qualifies"), None);
    assert_eq!(image.lifecycle(), Lifecycle::Loaded);

    fx.host.resize_node(parent, 700.0);
    fx.settle();
    assert_eq!(image.qualifies(), Some(true));
    assert_eq!(sources(&events), vec!["a.jpg"]);
}

#[test]
fn test_threshold_is_inclusive() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(499.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    image.connect();
    assert!(!image.is_loaded());

    fx.host.resize_node(parent, 500.0);
    fx.settle();
    assert!(image.is_loaded());
}

#[test]
fn test_siblings_with_different_thresholds() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(300.0);
    let small = fx.image(fx.host.create_child(parent, 0.0), &[("src", "s.jpg"), ("min-inline-size", "400")]);
    let large = fx.image(fx.host.create_child(parent, 0.0), &[("src", "l.jpg"), ("min-inline-size", "500")]);
    small.connect();
    large.connect();
    assert_eq!(fx.host.resize_observer_count(), 1);

    fx.host.resize_node(parent, 450.0);
    assert_eq!(fx.settle(), 2);
    assert!(small.is_loaded());
    assert!(!large.is_loaded());
}

#[test]
fn test_loaded_event_propagates_to_context() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(800.0);
    let node = fx.host.create_child(parent, 0.0);
    let document_events = record(fx.ctx.loaded());

    let image = fx.image(node, &[("src", "hero.jpg")]);
    let order = Arc::new(Mutex::new(Vec::new()));
    let (first, second) = (order.clone(), order.clone());
    image.loaded().connect(move |_: &LoadedEvent| first.lock().push("instance"));
    fx.ctx.loaded().connect(move |_: &LoadedEvent| second.lock().push("document"));
    image.connect();

    let events = document_events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target, node);
    assert_eq!(events[0].src, "hero.jpg");
    assert!(events[0].bubbles);
    assert!(events[0].composed);
    assert_eq!(*order.lock(), vec!["instance", "document"]);
}

// ============================================================================
// Pool reference counting
// ============================================================================

#[test]
fn test_shared_container_reference_counting() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(300.0);
    let first = fx.image(fx.host.create_child(parent, 0.0), &[("src", "1.jpg"), ("min-inline-size", "1000")]);
    let second = fx.image(fx.host.create_child(parent, 0.0), &[("src", "2.jpg"), ("min-inline-size", "1000")]);
    first.connect();
    second.connect();

    let stats = fx.ctx.registry().stats();
    assert_eq!(stats.size_observers, 1);
    assert_eq!(stats.size_subscribers, 2);

    first.disconnect();
    assert_eq!(fx.host.resize_observer_count(), 1);
    fx.host.resize_node(parent, 1200.0);
    fx.settle();
    assert!(!first.is_loaded());
    assert!(second.is_loaded());

    second.disconnect();
    assert_eq!(fx.host.resize_observer_count(), 0);
    assert_eq!(fx.ctx.registry().stats().size_subscribers, 0);
}

#[test]
fn test_media_instances_share_one_listener() {
    let fx = Fixture::new();
    let a = fx.image(fx.host.create_node(0.0), &[("src", "a.jpg"), ("query", "media"), ("min-inline-size", "1400")]);
    let b = fx.image(fx.host.create_node(0.0), &[("src", "b.jpg"), ("query", "media"), ("min-inline-size", "1600")]);
    a.connect();
    b.connect();
    assert_eq!(fx.host.window_listener_count(), 1);
    assert!(!a.is_loaded());

    fx.host.resize_viewport(1500.0, 900.0);
    fx.settle();
    assert!(a.is_loaded());
    assert!(!b.is_loaded());

    a.disconnect();
    b.disconnect();
    assert_eq!(fx.host.window_listener_count(), 0);
}

// ============================================================================
// Named breakpoints
// ============================================================================

#[test]
fn test_named_breakpoints_take_precedence() {
    let vars = Arc::new(StyleVariables::new());
    vars.set("--query-image-breakpoint", "sm");
    let signal = vars.clone();
    let fx = Fixture::with_builder(move |builder| builder.breakpoints(signal));

    let parent = fx.host.create_node(800.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(
        node,
        &[("src", "a.jpg"), ("named-breakpoints", "md, lg"), ("min-inline-size", "100")],
    );
    image.connect();
    assert!(!image.is_loaded());
    assert_eq!(image.qualifies(), Some(false));

    vars.set("--query-image-breakpoint", "lg");
    fx.host.resize_node(parent, 801.0);
    fx.settle();
    assert!(image.is_loaded());
}

#[test]
fn test_context_style_variables_drive_named_breakpoints() {
    let settings = Settings {
        breakpoint_property: "--layout-breakpoint".to_string(),
        ..Settings::default()
    };
    let fx = Fixture::with_builder(move |builder| builder.settings(settings));
    let parent = fx.host.create_node(800.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("named-breakpoints", "md, lg")]);

    fx.ctx.style_variables().set("layout-breakpoint", "lg");
    image.connect();
    assert!(image.is_loaded());
    assert_eq!(image.qualifies(), Some(true));
    assert_eq!(image.last_warning(), None);
}

#[test]
fn test_missing_breakpoint_signal_warns() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(800.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("named-breakpoints", "md")]);
    image.connect();

    assert!(!image.is_loaded());
    assert_eq!(image.last_warning(), Some(ConfigWarning::MissingBreakpointSignal));
}

#[test]
fn test_invalid_threshold_warns() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(800.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "wide")]);
    image.connect();

    assert!(!image.is_loaded());
    assert_eq!(
        image.last_warning().map(|warning| warning.kind()),
        Some("invalid-size-threshold")
    );
}

// ============================================================================
// View mode
// ============================================================================

#[test]
fn test_view_mode_loads_once_and_leaves_pool() {
    let fx = Fixture::new();
    let options = IntersectionOptions::new(0, 0.25);
    let attrs = [("query", "view"), ("view-range-start", "entry 25%")];

    let a_node = fx.host.create_node(100.0);
    let b_node = fx.host.create_node(100.0);
    let a = fx.image(a_node, &[("src", "a.jpg"), attrs[0], attrs[1]]);
    let b = fx.image(b_node, &[("src", "b.jpg"), attrs[0], attrs[1]]);
    let events = record(fx.ctx.loaded());
    a.connect();
    b.connect();
    assert_eq!(fx.host.intersection_observer_count(), 1);
    assert_eq!(fx.ctx.registry().intersection().subscriber_count(options), 2);

    fx.host.set_visible_ratio(a_node, 0.1);
    assert!(!a.is_loaded());

    fx.host.set_visible_ratio(a_node, 0.3);
    assert!(a.is_loaded());
    assert_eq!(fx.ctx.registry().intersection().subscriber_count(options), 1);
    assert!(!fx.host.is_observed(a_node));

    let checks = a.qualification_checks();
    fx.host.set_visible_ratio(a_node, 0.0);
    fx.host.set_visible_ratio(a_node, 0.9);
    assert_eq!(a.qualification_checks(), checks);

    fx.host.set_visible_ratio(b_node, 0.25);
    assert!(b.is_loaded());
    assert_eq!(fx.host.intersection_observer_count(), 0);
    assert_eq!(sources(&events), vec!["a.jpg", "b.jpg"]);
}

#[test]
fn test_view_ranges_key_separate_observers() {
    let fx = Fixture::new();
    let a = fx.image(fx.host.create_node(0.0), &[("query", "view"), ("view-range-start", "entry 25%")]);
    let b = fx.image(fx.host.create_node(0.0), &[("query", "view"), ("view-range-start", "entry -200px")]);
    let c = fx.image(fx.host.create_node(0.0), &[("query", "view"), ("view-range-start", "entry -200px")]);
    a.connect();
    b.connect();
    c.connect();

    assert_eq!(fx.host.intersection_observer_count(), 2);
    assert!(fx.ctx.registry().intersection().has_observer(IntersectionOptions::new(200, 0.0)));
}

#[test]
fn test_view_mode_loads_when_already_visible() {
    let fx = Fixture::new();
    let node = fx.host.create_node(100.0);
    fx.host.set_visible_ratio(node, 1.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("query", "view")]);
    let events = record(image.loaded());

    image.connect();
    assert!(image.is_loaded());
    assert_eq!(image.lifecycle(), Lifecycle::Loaded);
    assert_eq!(sources(&events), vec!["a.jpg"]);

    // The one-shot subscription is gone and nothing is left pending.
    assert_eq!(fx.ctx.registry().stats(), RegistryStats::default());
    assert_eq!(fx.host.intersection_observer_count(), 0);
    assert!(!fx.host.is_observed(node));
    assert_eq!(fx.ctx.run_pending(), 0);
}

#[test]
fn test_view_mode_below_threshold_waits() {
    let fx = Fixture::new();
    let node = fx.host.create_node(100.0);
    fx.host.set_visible_ratio(node, 0.1);
    let image = fx.image(node, &[("src", "a.jpg"), ("query", "view"), ("view-range-start", "entry 25%")]);

    image.connect();
    assert!(!image.is_loaded());
    assert!(fx.host.is_observed(node));

    fx.host.set_visible_ratio(node, 0.5);
    assert!(image.is_loaded());
}

#[test]
fn test_view_range_change_reloads_while_visible() {
    let fx = Fixture::new();
    let node = fx.host.create_node(100.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("query", "view")]);
    let events = record(image.loaded());
    image.connect();
    fx.host.set_visible_ratio(node, 1.0);
    assert!(image.is_loaded());

    image.set_attribute("view-range-start", Some("entry -200px"));
    assert!(image.is_loaded());
    assert_eq!(sources(&events), vec!["a.jpg", "a.jpg"]);
    assert_eq!(fx.ctx.registry().stats().intersection_subscribers, 0);
    assert_eq!(fx.host.intersection_observer_count(), 0);
}

// ============================================================================
// Attribute mutation
// ============================================================================

#[test]
fn test_image_identity_frozen_after_load() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(600.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    image.connect();
    assert!(image.is_loaded());

    image.set_attribute("src", Some("b.jpg"));
    image.set_attribute("srcset", Some("b-2x.jpg 2x"));
    assert_eq!(image.get_attribute("src").as_deref(), Some("a.jpg"));
    assert_eq!(image.get_attribute("srcset"), None);
    assert_eq!(image.render_view().image_attribute("src"), Some("a.jpg"));

    image.set_attribute("loading", Some("lazy"));
    assert_eq!(image.render_view().image_attribute("loading"), Some("lazy"));
    assert_eq!(
        fx.renderer.markup(node).as_deref(),
        Some("<img src=\"a.jpg\" loading=\"lazy\">")
    );
}

#[test]
fn test_pass_through_attributes_are_escaped() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(600.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg?w=1&h=2"), ("alt", "\"quoted\" <tag>")]);
    image.connect();

    assert_eq!(
        fx.renderer.markup(node).as_deref(),
        Some("<img src=\"a.jpg?w=1&amp;h=2\" alt=\"&quot;quoted&quot; &lt;tag&gt;\">")
    );
}

#[test]
fn test_condition_change_resets_load() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(600.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "500")]);
    let events = record(image.loaded());
    image.connect();
    assert!(image.is_loaded());

    image.set_attribute("min-inline-size", Some("700"));
    assert!(!image.is_loaded());
    assert_eq!(image.lifecycle(), Lifecycle::Watching);
    assert_eq!(fx.renderer.markup(node).as_deref(), Some(""));

    // Identity attributes are writable again once the load is forgotten.
    image.set_attribute("src", Some("b.jpg"));
    assert!(!image.is_loaded());

    fx.host.resize_node(parent, 800.0);
    fx.settle();
    assert!(image.is_loaded());
    assert_eq!(sources(&events), vec!["a.jpg", "b.jpg"]);
    assert_eq!(fx.ctx.registry().stats().size_subscribers, 1);
}

#[test]
fn test_mode_change_while_loaded_is_inert() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(600.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("query", "view")]);
    let events = record(image.loaded());
    image.connect();
    fx.host.set_visible_ratio(node, 1.0);
    assert!(image.is_loaded());

    image.set_attribute("query", Some("container"));
    assert!(image.is_loaded());
    assert_eq!(image.mode(), QueryMode::Container);
    let stats = fx.ctx.registry().stats();
    assert_eq!(stats.size_subscribers, 0);
    assert_eq!(stats.intersection_subscribers, 0);

    // A condition change resets and wires the new mode.
    image.set_attribute("min-inline-size", Some("100"));
    assert!(image.is_loaded());
    assert_eq!(fx.ctx.registry().stats().size_subscribers, 1);
    assert_eq!(sources(&events), vec!["a.jpg", "a.jpg"]);
}

#[test]
fn test_mode_change_before_load_rewires() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(300.0);
    let node = fx.host.create_child(parent, 0.0);
    let image = fx.image(node, &[("src", "a.jpg"), ("min-inline-size", "1000")]);
    image.connect();
    assert_eq!(fx.ctx.registry().stats().size_subscribers, 1);

    image.set_attribute("query", Some("media"));
    let stats = fx.ctx.registry().stats();
    assert_eq!(stats.size_subscribers, 0);
    assert_eq!(stats.window_subscribers, 1);
    // The default viewport is 1280 wide.
    assert!(image.is_loaded());
}

#[test]
fn test_dropping_context_users_releases_pools() {
    let fx = Fixture::new();
    let parent = fx.host.create_node(300.0);
    let images: Vec<QueryImage> = (0..10)
        .map(|_| fx.image(fx.host.create_child(parent, 0.0), &[("src", "a.jpg"), ("min-inline-size", "1000")]))
        .collect();
    for image in &images {
        image.connect();
    }
    assert_eq!(fx.host.resize_observer_count(), 1);
    assert_eq!(fx.ctx.instance_count(), 10);

    drop(images);
    assert_eq!(fx.host.resize_observer_count(), 0);
    assert_eq!(fx.ctx.instance_count(), 0);
}

//! Logging facilities for Horizon Query Image.
//!
//! Horizon Query Image uses the `tracing` crate for instrumentation. The
//! library never installs a subscriber; to see logs, install one in your
//! application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_query_image_core::pool=debug")
//!         .init();
//! }
//! ```
//!
//! Configuration diagnostics (invalid thresholds, malformed view ranges,
//! missing breakpoint signal) are emitted at `warn` level on the element
//! target. Pool creation and teardown are emitted at `debug`, and individual
//! dispatches at `trace`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core services target.
    pub const CORE: &str = "horizon_query_image_core";
    /// Shared observer pools.
    pub const POOL: &str = "horizon_query_image_core::pool";
    /// Per-instance throttle gate.
    pub const THROTTLE: &str = "horizon_query_image_core::throttle";
    /// Timer queue.
    pub const TIMER: &str = "horizon_query_image_core::timer";
    /// Signal emission.
    pub const SIGNAL: &str = "horizon_query_image_core::signal";
    /// Headless host.
    pub const HEADLESS: &str = "horizon_query_image_core::headless";
    /// Widget lifecycle and configuration diagnostics.
    pub const ELEMENT: &str = "horizon_query_image::element";
}

/// Span names used throughout Horizon Query Image for tracing.
pub mod span_names {
    /// Pool dispatch (fan-out of one platform notification).
    pub const POOL_DISPATCH: &str = "horizon_query_image::pool_dispatch";
    /// Qualification check.
    pub const QUALIFY: &str = "horizon_query_image::qualify";
}

//! Core services for Horizon Query Image.
//!
//! This crate provides the platform-facing machinery behind the
//! `<query-image>` element:
//!
//! - **Host boundary**: the [`ObserverHost`] trait and the records it delivers
//! - **Shared observer pools**: size, window-resize, and intersection pools that
//!   multiplex many subscribers onto one platform observer per key
//! - **Throttle gate**: per-instance trailing debounce
//! - **Timers and clocks**: a one-shot timer queue over a swappable [`Clock`]
//! - **Signals**: synchronous fan-out notifications
//! - **Headless host**: an in-memory [`ObserverHost`] for non-browser use
//!
//! Everything here is single-document and event-driven: the host delivers
//! notifications one at a time and the pools fan them out synchronously.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_query_image_core::{HeadlessHost, ObserverRegistry, ResizeEntry};
//!
//! let host = Arc::new(HeadlessHost::new());
//! let registry = ObserverRegistry::new(host.clone());
//! let container = host.create_node(400.0);
//!
//! // Two subscribers, one underlying observer.
//! let a = registry.size().subscribe(container, Arc::new(|_: &ResizeEntry| {}));
//! let b = registry.size().subscribe(container, Arc::new(|_: &ResizeEntry| {}));
//! assert_eq!(host.resize_observer_count(), 1);
//!
//! registry.size().unsubscribe(container, a);
//! registry.size().unsubscribe(container, b);
//! assert_eq!(host.resize_observer_count(), 0);
//! ```

mod clock;
mod error;
pub mod headless;
pub mod host;
pub mod logging;
pub mod pool;
pub mod signal;
pub mod throttle;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ObserverError, Result, TimerError};
pub use headless::HeadlessHost;
pub use host::{
    IntersectionEntry, IntersectionHandler, IntersectionOptions, ListenerId, NodeId,
    ObserverHost, PlatformObserver, ResizeEntry, ResizeHandler, ViewportSize,
    WindowResizeHandler,
};
pub use pool::{
    IntersectionCallback, IntersectionPool, ObserverRegistry, RegistryStats, SizeCallback,
    SizePool, SubscriberId, WindowCallback, WindowPool,
};
pub use signal::{ConnectionId, Signal};
pub use throttle::{InstanceId, ThrottleGate, DEFAULT_THROTTLE_DELAY};
pub use timer::{TimerId, TimerManager};

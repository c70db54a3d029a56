//! Horizon Query Image - an image element that loads only when it qualifies.
//!
//! A `<query-image>` defers fetching its `src` until a condition holds:
//!
//! - **container** (default): the parent's inline size reaches `min-inline-size`
//! - **media**: the viewport width reaches `min-inline-size`
//! - **view**: the element scrolls into view, per `view-range-start`
//!
//! In container and media modes, `named-breakpoints` takes precedence over
//! `min-inline-size` and compares against the active breakpoint published by
//! the stylesheet. Once loaded, an instance stays loaded for the rest of its
//! attachment.
//!
//! Instances share platform observers through the pools in
//! [`horizon_query_image_core`], so a page full of images costs one observer
//! per distinct container or view range.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use horizon_query_image::prelude::*;
//!
//! let host = Arc::new(HeadlessHost::new());
//! let clock = Arc::new(ManualClock::new());
//! let ctx = QueryImageContext::builder(host.clone()).clock(clock.clone()).build();
//!
//! let registry = ElementRegistry::new(Some(ctx.clone()));
//! registry.define("query-image");
//!
//! let container = host.create_node(320.0);
//! let node = host.create_child(container, 0.0);
//! let image = registry.create("query-image", node).unwrap();
//! image.set_attribute("src", Some("hero.jpg"));
//! image.set_attribute("min-inline-size", Some("600"));
//! image.connect();
//! assert!(!image.is_loaded());
//!
//! host.resize_node(container, 800.0);
//! clock.advance(Duration::from_millis(150));
//! ctx.run_pending();
//! assert!(image.is_loaded());
//! ```

pub use horizon_query_image_core::*;

pub mod attributes;
pub mod breakpoint;
pub mod config;
mod context;
pub mod define;
pub mod element;
pub mod error;
pub mod render;
pub mod resolver;
pub mod settings;
pub mod view_range;

pub mod prelude;

pub use context::{QueryImageContext, QueryImageContextBuilder};
pub use define::{DefineOutcome, ElementRegistry};
pub use element::{Lifecycle, LoadedEvent, QueryImage};
pub use error::{ConfigWarning, Error};
pub use settings::Settings;

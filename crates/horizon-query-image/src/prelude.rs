//! Prelude module for Horizon Query Image.
//!
//! ```ignore
//! use horizon_query_image::prelude::*;
//! ```

// ============================================================================
// Element
// ============================================================================

pub use crate::context::{QueryImageContext, QueryImageContextBuilder};
pub use crate::define::{DefineOutcome, ElementRegistry};
pub use crate::element::{Lifecycle, LoadedEvent, QueryImage};

// ============================================================================
// Configuration
// ============================================================================

pub use crate::attributes::Attributes;
pub use crate::breakpoint::{BreakpointSignal, StyleVariables};
pub use crate::config::QueryMode;
pub use crate::error::ConfigWarning;
pub use crate::settings::Settings;

// ============================================================================
// Rendering
// ============================================================================

pub use crate::render::{MarkupRenderer, RenderView, Renderer};

// ============================================================================
// Host
// ============================================================================

pub use horizon_query_image_core::{Clock, HeadlessHost, ManualClock, NodeId, SystemClock};

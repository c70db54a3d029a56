//! Registering the element under a tag name.
//!
//! Registration is idempotent and never fails loudly: defining an existing
//! tag, or defining anything without a host, is a no-op reported through
//! [`DefineOutcome`].

use std::collections::HashSet;
use std::sync::Arc;

use horizon_query_image_core::logging::targets;
use horizon_query_image_core::NodeId;
use parking_lot::Mutex;

use crate::context::QueryImageContext;
use crate::element::QueryImage;

/// Result of a [`ElementRegistry::define`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineOutcome {
    /// The tag was registered.
    Defined,
    /// The tag was already registered; nothing changed.
    AlreadyDefined,
    /// No host is available; nothing was registered.
    NoHost,
    /// The tag is not a valid custom element name.
    InvalidName,
}

/// Maps tag names to the query image element.
pub struct ElementRegistry {
    ctx: Option<Arc<QueryImageContext>>,
    defined: Mutex<HashSet<String>>,
}

impl ElementRegistry {
    /// Create a registry. Pass `None` when running without a rendering host.
    pub fn new(ctx: Option<Arc<QueryImageContext>>) -> Self {
        Self {
            ctx,
            defined: Mutex::new(HashSet::new()),
        }
    }

    /// Register the element under `tag`.
    pub fn define(&self, tag: &str) -> DefineOutcome {
        if self.ctx.is_none() {
            tracing::debug!(target: targets::ELEMENT, tag, "no host; skipping registration");
            return DefineOutcome::NoHost;
        }
        if !is_valid_tag_name(tag) {
            tracing::warn!(target: targets::ELEMENT, tag, "invalid custom element name");
            return DefineOutcome::InvalidName;
        }
        if !self.defined.lock().insert(tag.to_string()) {
            return DefineOutcome::AlreadyDefined;
        }
        tracing::debug!(target: targets::ELEMENT, tag, "defined element");
        DefineOutcome::Defined
    }

    /// Register the element under the tag name from the context's settings.
    pub fn define_default(&self) -> DefineOutcome {
        match &self.ctx {
            Some(ctx) => {
                let tag = ctx.settings().tag_name.clone();
                self.define(&tag)
            }
            None => DefineOutcome::NoHost,
        }
    }

    /// Whether `tag` is registered.
    pub fn is_defined(&self, tag: &str) -> bool {
        self.defined.lock().contains(tag)
    }

    /// Create an unattached instance for a registered tag.
    pub fn create(&self, tag: &str, node: NodeId) -> Option<QueryImage> {
        let ctx = self.ctx.as_ref()?;
        self.is_defined(tag).then(|| QueryImage::new(ctx, node))
    }
}

static_assertions::assert_impl_all!(ElementRegistry: Send, Sync);

/// Whether `tag` is a valid custom element name: lowercase ASCII, starting
/// with a letter, containing a hyphen.
pub fn is_valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    starts_with_letter
        && tag.contains('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}

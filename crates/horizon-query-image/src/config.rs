//! Cached instance configuration and attribute-change planning.
//!
//! An instance snapshots its condition attributes into an [`InstanceConfig`]
//! when it attaches and whenever one of them changes, so dispatches never
//! re-read or re-parse attributes. Attribute changes are turned into a list
//! of [`Transition`]s by diffing the old and new snapshots:
//!
//! ```
//! use horizon_query_image::attributes::Attributes;
//! use horizon_query_image::config::{plan_transitions, ConfigDiff, InstanceConfig, Transition};
//!
//! let old = InstanceConfig::from_attributes(&Attributes::new());
//! let attrs: Attributes = [("min-inline-size", "500")].into_iter().collect();
//! let new = InstanceConfig::from_attributes(&attrs);
//!
//! let diff = ConfigDiff::between(&old, &new);
//! assert_eq!(
//!     plan_transitions(&diff, true),
//!     vec![Transition::Reset, Transition::Rewire, Transition::Check, Transition::Rerender]
//! );
//! ```

use std::fmt;

use crate::attributes::{self, Attributes};
use crate::error::ConfigWarning;
use crate::view_range::ViewRange;

/// How an instance decides that it qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Compare the parent container's inline size.
    #[default]
    Container,
    /// Compare the viewport width.
    Media,
    /// Load once the element scrolls into view.
    View,
}

impl QueryMode {
    /// Parse the `query` attribute. Unknown or absent values mean `Container`.
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("media") => Self::Media,
            Some(v) if v.eq_ignore_ascii_case("view") => Self::View,
            _ => Self::Container,
        }
    }

    /// The attribute spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Media => "media",
            Self::View => "view",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `min-inline-size` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeThreshold {
    /// A valid integer threshold in pixels.
    Pixels(i64),
    /// The raw value, which is not an integer.
    Invalid(String),
}

impl SizeThreshold {
    /// Parse the attribute. Absent or blank values mean "no threshold".
    pub fn from_attribute(value: Option<&str>) -> Option<Self> {
        let value = value?.trim();
        if value.is_empty() {
            return None;
        }
        Some(match value.parse::<i64>() {
            Ok(px) => Self::Pixels(px),
            Err(_) => Self::Invalid(value.to_string()),
        })
    }
}

/// Parse the `named-breakpoints` attribute.
///
/// Names are comma-separated and trimmed; empty names are dropped. An
/// attribute with no names means "no breakpoint condition".
pub fn parse_breakpoint_names(value: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    (!names.is_empty()).then_some(names)
}

/// Snapshot of the attributes that govern qualification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceConfig {
    /// Query mode.
    pub mode: QueryMode,
    /// Minimum inline size.
    pub size_threshold: Option<SizeThreshold>,
    /// Accepted breakpoint names, in attribute order.
    pub breakpoint_names: Option<Vec<String>>,
    /// View-mode trigger range.
    pub view_range: ViewRange,
    /// Diagnostic from parsing `view-range-start`, if any.
    pub view_range_warning: Option<ConfigWarning>,
}

impl InstanceConfig {
    /// Build a snapshot from the current attributes.
    pub fn from_attributes(attrs: &Attributes) -> Self {
        let (view_range, view_range_warning) =
            ViewRange::from_attribute(attrs.get(attributes::VIEW_RANGE_START));
        Self {
            mode: QueryMode::from_attribute(attrs.get(attributes::QUERY)),
            size_threshold: SizeThreshold::from_attribute(attrs.get(attributes::MIN_INLINE_SIZE)),
            breakpoint_names: parse_breakpoint_names(attrs.get(attributes::NAMED_BREAKPOINTS)),
            view_range,
            view_range_warning,
        }
    }
}

/// Which parts of the configuration changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigDiff {
    /// `query` changed.
    pub mode: bool,
    /// `min-inline-size` changed.
    pub size_threshold: bool,
    /// `named-breakpoints` changed.
    pub breakpoint_names: bool,
    /// `view-range-start` changed.
    pub view_range: bool,
}

impl ConfigDiff {
    /// Compare two snapshots.
    pub fn between(old: &InstanceConfig, new: &InstanceConfig) -> Self {
        Self {
            mode: old.mode != new.mode,
            size_threshold: old.size_threshold != new.size_threshold,
            breakpoint_names: old.breakpoint_names != new.breakpoint_names,
            view_range: old.view_range != new.view_range
                || old.view_range_warning != new.view_range_warning,
        }
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        !(self.mode || self.size_threshold || self.breakpoint_names || self.view_range)
    }

    /// Whether a qualification condition (anything but the mode) changed.
    pub fn condition_changed(&self) -> bool {
        self.size_threshold || self.breakpoint_names || self.view_range
    }
}

/// One step of reacting to a configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Forget the load: clear the loaded flag and unfreeze the image identity.
    Reset,
    /// Leave the current pool and join the one the current mode selects.
    Rewire,
    /// Run a qualification check now.
    Check,
    /// Re-project state into markup.
    Rerender,
}

/// Plan the reaction to a configuration change on an attached instance.
///
/// - Condition changes reset a loaded instance, re-join a pool, and check.
/// - A mode change on an unloaded instance re-joins a pool and checks.
/// - A mode change on a loaded instance is recorded but inert: the resource
///   already fetched is kept and the current wiring stays until the next
///   reset or re-attach.
pub fn plan_transitions(diff: &ConfigDiff, loaded: bool) -> Vec<Transition> {
    let mut plan = Vec::new();
    let condition = diff.condition_changed();

    if loaded && !condition {
        return plan;
    }
    if loaded {
        plan.push(Transition::Reset);
    }
    if diff.mode || diff.view_range || loaded {
        plan.push(Transition::Rewire);
    }
    if diff.mode || condition {
        plan.push(Transition::Check);
        plan.push(Transition::Rerender);
    }
    plan
}

//! Qualification predicate for `container` and `media` modes.
//!
//! [`resolve`] is pure: it reads a config snapshot and an environment
//! snapshot and reports whether the instance qualifies. The only side effect
//! is a `warn`-level diagnostic when the configuration is unusable. View mode
//! never calls it; entering the viewport is the qualification.
//!
//! Precedence is fixed. Named breakpoints are checked first and, when set,
//! decide alone; the size threshold is consulted only otherwise. An instance
//! with neither condition always qualifies.

use horizon_query_image_core::logging::targets;

use crate::config::{InstanceConfig, SizeThreshold};
use crate::error::ConfigWarning;

/// The environment a qualification check runs against.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Environment<'a> {
    /// The active named breakpoint, if the style signal is set.
    pub active_breakpoint: Option<&'a str>,
    /// Container or viewport inline size, in pixels.
    pub current_size: f64,
}

/// Outcome of one qualification check.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Whether the condition holds.
    pub qualifies: bool,
    /// Diagnostic explaining a forced `false`, if any.
    pub warning: Option<ConfigWarning>,
}

impl Resolution {
    fn pass(qualifies: bool) -> Self {
        Self {
            qualifies,
            warning: None,
        }
    }

    fn fail(warning: ConfigWarning) -> Self {
        tracing::warn!(target: targets::ELEMENT, kind = warning.kind(), "{warning}");
        Self {
            qualifies: false,
            warning: Some(warning),
        }
    }
}

/// Decide whether `config` qualifies in `env`.
pub fn resolve(config: &InstanceConfig, env: &Environment<'_>) -> Resolution {
    if let Some(names) = &config.breakpoint_names {
        let active = env.active_breakpoint.map(str::trim).filter(|name| !name.is_empty());
        return match active {
            None => Resolution::fail(ConfigWarning::MissingBreakpointSignal),
            Some(active) => Resolution::pass(names.iter().any(|name| name == active)),
        };
    }

    match &config.size_threshold {
        Some(SizeThreshold::Pixels(threshold)) => {
            Resolution::pass(env.current_size >= *threshold as f64)
        }
        Some(SizeThreshold::Invalid(raw)) => {
            Resolution::fail(ConfigWarning::InvalidSizeThreshold(raw.clone()))
        }
        None => Resolution::pass(true),
    }
}

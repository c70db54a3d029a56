//! The active named breakpoint.
//!
//! Named breakpoints are not computed by the element. A stylesheet sets a
//! custom property (by default `--query-image-breakpoint`) to the name of the
//! breakpoint currently in effect, e.g.
//!
//! ```css
//! :root { --query-image-breakpoint: sm; }
//! @media (min-width: 768px) { :root { --query-image-breakpoint: md; } }
//! ```
//!
//! and the element reads it through a [`BreakpointSignal`]. The value is
//! process-wide: every instance sees the same active breakpoint.

use std::collections::HashMap;

use cssparser::{Parser, ParserInput, Token};
use parking_lot::RwLock;

/// The default custom property carrying the active breakpoint name.
pub const DEFAULT_BREAKPOINT_PROPERTY: &str = "--query-image-breakpoint";

/// Source of the active named breakpoint.
pub trait BreakpointSignal: Send + Sync {
    /// The active breakpoint name, or `None` when the signal is unset or blank.
    fn active_breakpoint(&self) -> Option<String>;
}

/// A fixed breakpoint value, mostly useful for tests and server rendering.
impl BreakpointSignal for Option<String> {
    fn active_breakpoint(&self) -> Option<String> {
        self.as_deref().and_then(normalize_breakpoint)
    }
}

/// Thread-safe CSS custom property store.
///
/// Property names may be given with or without the leading `--`.
#[derive(Debug, Default)]
pub struct StyleVariables {
    variables: RwLock<HashMap<String, String>>,
    breakpoint_property: String,
}

impl StyleVariables {
    /// Create an empty store that reads the breakpoint from
    /// [`DEFAULT_BREAKPOINT_PROPERTY`].
    pub fn new() -> Self {
        Self::with_breakpoint_property(DEFAULT_BREAKPOINT_PROPERTY)
    }

    /// Create an empty store that reads the breakpoint from `property`.
    pub fn with_breakpoint_property(property: impl AsRef<str>) -> Self {
        Self {
            variables: RwLock::new(HashMap::new()),
            breakpoint_property: strip_dashes(property.as_ref()).to_string(),
        }
    }

    /// Set a variable.
    pub fn set(&self, name: impl AsRef<str>, value: impl Into<String>) {
        self.variables
            .write()
            .insert(strip_dashes(name.as_ref()).to_string(), value.into());
    }

    /// Get a variable value.
    pub fn get(&self, name: &str) -> Option<String> {
        self.variables.read().get(strip_dashes(name)).cloned()
    }

    /// Remove a variable. Returns the previous value.
    pub fn remove(&self, name: &str) -> Option<String> {
        self.variables.write().remove(strip_dashes(name))
    }

    /// Clear all variables.
    pub fn clear(&self) {
        self.variables.write().clear();
    }

    /// The property the breakpoint is read from, without leading dashes.
    pub fn breakpoint_property(&self) -> &str {
        &self.breakpoint_property
    }
}

impl BreakpointSignal for StyleVariables {
    fn active_breakpoint(&self) -> Option<String> {
        self.variables
            .read()
            .get(&self.breakpoint_property)
            .and_then(|value| normalize_breakpoint(value))
    }
}

fn strip_dashes(name: &str) -> &str {
    name.strip_prefix("--").unwrap_or(name)
}

/// Normalize a custom property value to a breakpoint name.
///
/// Accepts a bare identifier (`md`) or a quoted string (`"md"`), with
/// surrounding whitespace. Blank values mean "unset". Anything else is taken
/// verbatim after trimming, since custom properties are free-form.
pub fn normalize_breakpoint(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut input = ParserInput::new(trimmed);
    let mut parser = Parser::new(&mut input);
    let parsed = match parser.next() {
        Ok(Token::Ident(name)) | Ok(Token::QuotedString(name)) => Some(name.to_string()),
        _ => None,
    };
    let exhausted = parser.is_exhausted();

    match parsed {
        Some(name) if exhausted => {
            let name = name.trim().to_string();
            (!name.is_empty()).then_some(name)
        }
        _ => Some(trimmed.to_string()),
    }
}

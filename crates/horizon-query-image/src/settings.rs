//! Process-level settings.
//!
//! Settings are read once when a [`QueryImageContext`] is built. Every field
//! has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! tag_name = "lazy-image"
//! throttle_delay_ms = 200
//! breakpoint_property = "--app-breakpoint"
//! ```
//!
//! [`QueryImageContext`]: crate::QueryImageContext

use std::path::Path;
use std::time::Duration;

use horizon_query_image_core::DEFAULT_THROTTLE_DELAY;
use serde::{Deserialize, Serialize};

use crate::breakpoint::DEFAULT_BREAKPOINT_PROPERTY;
use crate::error::{Error, Result};

/// The tag name the element is registered under by default.
pub const DEFAULT_TAG_NAME: &str = "query-image";

/// Settings shared by every instance in a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tag name to register the element under.
    pub tag_name: String,
    /// Debounce window for size and viewport triggers, in milliseconds.
    pub throttle_delay_ms: u64,
    /// Custom property carrying the active breakpoint name.
    pub breakpoint_property: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tag_name: DEFAULT_TAG_NAME.to_string(),
            throttle_delay_ms: DEFAULT_THROTTLE_DELAY.as_millis() as u64,
            breakpoint_property: DEFAULT_BREAKPOINT_PROPERTY.to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(
            target: horizon_query_image_core::logging::targets::ELEMENT,
            path = %path.display(),
            "loaded settings"
        );
        Ok(settings)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The debounce window as a [`Duration`].
    pub fn throttle_delay(&self) -> Duration {
        Duration::from_millis(self.throttle_delay_ms)
    }
}

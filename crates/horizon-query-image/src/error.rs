//! Error and diagnostic types for the query image element.

use std::path::PathBuf;

/// Result type alias for settings operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or saving settings.
///
/// The element itself never fails: invalid configuration degrades to a
/// non-qualifying state plus a [`ConfigWarning`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings file I/O error.
    #[error("Failed to read settings '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings TOML could not be parsed.
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// Settings could not be serialized.
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Error {
    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// An advisory configuration diagnostic.
///
/// Warnings are local to one instance and never abort its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigWarning {
    /// Named breakpoints are configured but the active-breakpoint property is unset.
    #[error("named breakpoints require the active-breakpoint signal to be set")]
    MissingBreakpointSignal,

    /// `min-inline-size` is not an integer.
    #[error("threshold must be a valid number, got '{0}'")]
    InvalidSizeThreshold(String),

    /// `view-range-start` does not follow `entry <int>%` or `entry -<int>px`.
    #[error("view-range-start must be 'entry <int>%' or 'entry -<int>px', got '{0}'")]
    InvalidViewRangeFormat(String),

    /// `view-range-start` percentage outside `[0, 100]`.
    #[error("view-range-start percentage must be between 0 and 100, got {0}")]
    OutOfRangePercentage(i32),
}

impl ConfigWarning {
    /// A stable identifier for the warning kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingBreakpointSignal => "missing-breakpoint-signal",
            Self::InvalidSizeThreshold(_) => "invalid-size-threshold",
            Self::InvalidViewRangeFormat(_) => "invalid-view-range-format",
            Self::OutOfRangePercentage(_) => "out-of-range-percentage",
        }
    }
}

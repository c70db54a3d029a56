//! Error types for Horizon Query Image core services.
//!
//! None of these cross the widget's public surface: pool teardown errors are
//! swallowed by the pools, and timer errors only surface to code that drives a
//! [`TimerManager`](crate::TimerManager) directly.

use std::fmt;

/// Timer-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The timer ID is invalid or has already fired or been stopped.
    InvalidTimerId,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimerId => write!(f, "Invalid or expired timer ID"),
        }
    }
}

impl std::error::Error for TimerError {}

/// Errors reported by a platform observer or listener during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// The observer was already disconnected by the platform.
    AlreadyDisconnected,
    /// The window listener is not (or no longer) registered.
    UnknownListener,
    /// Any other platform-reported failure.
    Platform(String),
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyDisconnected => write!(f, "Observer has already been disconnected"),
            Self::UnknownListener => write!(f, "Window resize listener is not registered"),
            Self::Platform(msg) => write!(f, "Platform observer error: {msg}"),
        }
    }
}

impl std::error::Error for ObserverError {}

/// A specialized Result type for timer operations.
pub type Result<T> = std::result::Result<T, TimerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TimerError::InvalidTimerId.to_string(), "Invalid or expired timer ID");
        assert_eq!(
            ObserverError::Platform("gone".into()).to_string(),
            "Platform observer error: gone"
        );
    }
}

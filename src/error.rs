//! Error types for key signature retrieval

use std::fmt;

/// Errors that can occur when setting up key signature retrieval
///
/// The scanning core itself never fails: a missing or degenerate key area simply
/// yields "no signature". Errors are reserved for invalid inputs at the API boundary.
#[derive(Debug, Clone)]
pub enum KeyError {
    /// Invalid input parameters (geometry, scale)
    InvalidInput(String),

    /// Invalid configuration value
    InvalidConfig(String),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            KeyError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for KeyError {}

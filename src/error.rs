use std::{error::Error as StdError, fmt};

/// The three fatal error classes from the delete engine's error taxonomy.
///
/// None of these are recoverable locally: a structural precondition
/// violation means the tree is already corrupt, a cache failure means the
/// underlying I/O is unreliable, and a protocol error means the caller fed
/// the FSM an event it did not ask for. `KeyNotFound` is deliberately not a
/// variant here — "not found" is a normal `step` outcome, not an error.
#[derive(Debug)]
pub enum EngineError {
    /// A node handler reported impossible arguments, or `validate` failed.
    Structural(String),
    /// `event.result` was outside `{0, -1}`, or the cache could not honor
    /// an acquire/allocate/commit call.
    Cache(String),
    /// `step` received an event that does not match the current phase.
    Protocol(String),
}

impl EngineError {
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::Structural(msg) => {
                write!(f, "structural precondition violation: {}", msg)
            }
            EngineError::Cache(msg) => write!(f, "cache/AIO failure: {}", msg),
            EngineError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl StdError for EngineError {}

use crate::error::EngineError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Shorthand for the common `Result<(), EngineError>` shape used by the
/// structural-repair helpers in `fsm`.
pub type VoidResult = Result<(), EngineError>;

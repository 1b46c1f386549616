use thiserror::Error;

/// Unified result type for the gazekit crate.
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors surfaced by the interaction runtime.
///
/// Hardware start/connect failures are not errors at this level: ports report
/// them as booleans and the owning feature disables itself, so nothing below
/// the runtime boundary ever needs to propagate an exception.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("runtime already initialized")]
    AlreadyInitialized,
    #[error("runtime not initialized")]
    NotInitialized,
    #[error("runtime already torn down")]
    TornDown,
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

/// Error taxonomy shared by every crate in the workspace.
///
/// Indicator primitives fail fast with `InvalidArgument`. Acquisition
/// failures (`RateLimited`, `Provider`) are absorbed by provider fallback
/// and only surface when every source is exhausted. `Persistence` errors
/// are swallowed at the service boundary. `Cancelled` propagates upward
/// unchanged.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider failure: {0}")]
    Provider(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Operation cancelled")]
    Cancelled,
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemedyError {
    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Session not available: {0}")]
    SessionUnavailable(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Strategy registration rejected: {0}")]
    StrategyRegistration(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, RemedyError>;

// Convert anyhow::Error to RemedyError
impl From<anyhow::Error> for RemedyError {
    fn from(err: anyhow::Error) -> Self {
        RemedyError::AnyhowError(err.to_string())
    }
}

impl RemedyError {
    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        RemedyError::DriverError(err.to_string())
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid class policy: {0}")]
    InvalidPolicy(String),

    #[error("File system error: {0}")]
    FileSystemError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for admission control operations
pub type Result<T> = std::result::Result<T, AdmissionError>;

use thiserror::Error;

/// Unified error type for document and blob store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection failed (authentication, network, etc.)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Document or object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Upload failed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a "not found" error with custom message
    pub fn not_found(msg: impl Into<String>) -> Self {
        StoreError::NotFound(msg.into())
    }

    /// Create a connection failure error
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        StoreError::ConnectionFailed(msg.into())
    }

    /// Create a generic backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }

    /// Whether this error is the store reporting a missing document/object
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

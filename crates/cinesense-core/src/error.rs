//! Error types for CineSense

/// Result type alias using CineSense's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for CineSense operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend could not be brought to a ready state
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Inference execution errors
    #[error("inference failed: {0}")]
    Inference(String),

    /// Model, vocabulary, or lexicon asset errors
    #[error("asset error: {0}")]
    Asset(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new initialization error
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new asset error
    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            Error::inference("tensor shape mismatch").to_string(),
            "inference failed: tensor shape mismatch"
        );
        assert_eq!(
            Error::asset("vocab.json missing").to_string(),
            "asset error: vocab.json missing"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

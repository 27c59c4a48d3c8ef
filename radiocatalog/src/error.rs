//! Error types for the stream catalog

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or browsing the catalog
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog endpoint answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The device has no usable network connection
    #[error("No network connection")]
    NoNetwork,

    /// A browse request targeted a node the tree does not contain
    #[error("Unknown id: {0}")]
    UnknownNode(String),

    /// No stream with this id in the current snapshot
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Rejected argument (blank ids and the like)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The catalog has not produced a successful snapshot yet
    #[error("Catalog not loaded")]
    NotLoaded,

    /// Configuration error (from radioconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// A blocking settings task was cancelled or panicked
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn unknown_node(id: impl Into<String>) -> Self {
        Self::UnknownNode(id.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

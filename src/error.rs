use thiserror::Error;

/// Failures raised by a [`crate::store::DocumentStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode or decode document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("permission denied for {path}")]
    PermissionDenied { path: String },

    #[error("document {path} not found")]
    NotFound { path: String },

    #[error("store lock poisoned during {0}")]
    Poisoned(&'static str),

    #[error("invalid document path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("You must be logged in")]
    Unauthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("You can only delete your own reviews")]
    PermissionDenied,

    /// The review was written but its own id could not be recorded on it.
    #[error("Failed to update review ID: {message}")]
    ReviewIdPatch { review_id: String, message: String },

    #[error("{0}")]
    Store(StoreError),

    #[error("background task failed: {0}")]
    Runtime(String),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl From<StoreError> for LibraryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied { .. } => LibraryError::PermissionDenied,
            other => LibraryError::Store(other),
        }
    }
}

impl From<tokio::task::JoinError> for LibraryError {
    fn from(err: tokio::task::JoinError) -> Self {
        LibraryError::Runtime(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search service returned status {0}")]
    Status(u16),

    #[error("search response could not be read: {0}")]
    Decode(String),
}

/// Why a membership toggle did not change anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToggleError {
    #[error("Book data is missing!")]
    MissingBookData,

    #[error("Failed to update {0}")]
    Failed(&'static str),
}

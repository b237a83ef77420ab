use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Media library permission not granted")]
    PermissionDenied,

    #[error("Fetch Failed: {0}")]
    FetchFailed(String),

    #[error("Delete Failed: {message} ({} of {} deleted)", .deleted.len(), .requested.len())]
    DeleteFailed {
        requested: Vec<String>,
        deleted: Vec<String>,
        message: String,
    },

    #[error("Persistence Write Failed: {0}")]
    PersistenceWriteFailed(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database Pool Error: {0}")]
    DbPool(#[from] r2d2::Error),

    #[error("Database Error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path Error: {0}")]
    Path(String),

    #[error("Initialization Failed: {0}")]
    Init(String),
}

impl Error {
    /// Whether the UI should offer a retry affordance for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PermissionDenied | Error::FetchFailed(_))
    }
}

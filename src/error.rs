//! Error types for feedcourier.

use thiserror::Error;

/// Common error type for feedcourier.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Database error.
    ///
    /// Wraps errors from any database backend. Errors from sqlx are converted
    /// automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration values or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A source with the same name is already registered.
    #[error("source already exists: {0}")]
    SourceAlreadyExists(String),

    /// Feed download or parse error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Page retrieval error (anti-bot proxy).
    #[error("retrieval error: {0}")]
    Retrieve(String),

    /// Article extraction error.
    #[error("extraction error: {0}")]
    Extract(String),

    /// Notification delivery error.
    #[error("notification error: {0}")]
    Notify(String),

    /// The job queue has no consumer left.
    #[error("job queue closed")]
    QueueClosed,

    /// Failure while processing a single feed item.
    #[error("item {link}: {source}")]
    Item {
        link: String,
        #[source]
        source: Box<CourierError>,
    },
}

impl CourierError {
    /// Attach the item link to an error raised while processing that item.
    pub fn for_item(link: impl Into<String>, err: CourierError) -> Self {
        CourierError::Item {
            link: link.into(),
            source: Box::new(err),
        }
    }
}

impl From<sqlx::Error> for CourierError {
    fn from(e: sqlx::Error) -> Self {
        CourierError::Database(e.to_string())
    }
}

/// Result type alias for feedcourier operations.
pub type Result<T> = std::result::Result<T, CourierError>;

use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request (connection lost, driver failure, ...).
    #[error("{backend} storage unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A record with the same identifier already exists.
    #[error("{backend} storage already holds `{id}` in `{collection}`")]
    Duplicate {
        backend: &'static str,
        collection: &'static str,
        id: String,
    },
    /// A persisted record could not be mapped back onto its entity.
    #[error("{backend} storage returned a malformed `{collection}` record: {message}")]
    Malformed {
        backend: &'static str,
        collection: &'static str,
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(
        backend: &'static str,
        message: String,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Unavailable {
            backend,
            message,
            source: Box::new(source),
        }
    }

    /// Name of the backend that produced the error.
    pub fn backend(&self) -> &'static str {
        match self {
            StorageError::Unavailable { backend, .. }
            | StorageError::Duplicate { backend, .. }
            | StorageError::Malformed { backend, .. } => backend,
        }
    }
}

use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend, tagged with the collection involved.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("`{id}` already exists in `{collection}`")]
    Duplicate { collection: &'static str, id: String },
    #[error("failed to insert `{id}` into `{collection}`")]
    Insert {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load `{id}` from `{collection}`")]
    Load {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list `{collection}` by `{key}`")]
    List {
        collection: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update `{key}` in `{collection}`")]
    Update {
        collection: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete `{key}` from `{collection}`")]
    Delete {
        collection: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("malformed document in `{collection}`: {message}")]
    Malformed {
        collection: &'static str,
        message: String,
    },
}

/// Server code of a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

impl MongoDaoError {
    /// Classify a failed insert, singling out unique index violations.
    pub fn insert(collection: &'static str, id: String, source: MongoError) -> Self {
        match source.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY => {
                MongoDaoError::Duplicate { collection, id }
            }
            _ => MongoDaoError::Insert {
                collection,
                id,
                source,
            },
        }
    }
}

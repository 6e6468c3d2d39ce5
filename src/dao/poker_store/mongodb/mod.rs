mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::{MongoDaoError, MongoResult};
pub use store::MongoPokerStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Duplicate { collection, id } => StorageError::Duplicate {
                backend: "mongodb",
                collection,
                id,
            },
            MongoDaoError::Malformed {
                collection,
                message,
            } => StorageError::Malformed {
                backend: "mongodb",
                collection,
                message,
            },
            other => StorageError::unavailable("mongodb", other.to_string(), other),
        }
    }
}

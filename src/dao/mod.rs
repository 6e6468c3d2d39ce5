/// Room, user, task and vote records as the storage layer sees them.
pub mod models;
/// Persistence backends behind the [`poker_store::PokerStore`] trait.
pub mod poker_store;
/// Storage abstraction layer for database operations.
pub mod storage;

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{RoomEntity, RoomPatch, TaskEntity, TaskPatch, UserEntity, VoteEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer holding rooms, users, tasks and votes.
///
/// Every call is atomic on its own; callers never get a transaction spanning
/// several calls. Listing methods are bounded by the limit the store was built with.
pub trait PokerStore: Send + Sync {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Returns whether a room matched.
    fn update_room(&self, id: &str, patch: RoomPatch) -> BoxFuture<'static, StorageResult<bool>>;
    fn delete_room(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>>;

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_user(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn list_users(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    fn count_users(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>>;
    fn delete_user(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>>;

    fn insert_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_task(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>>;
    fn list_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<TaskEntity>>>;
    /// Identifiers of every task of the room, ignoring the listing limit.
    fn task_ids(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    fn update_task(&self, id: &str, patch: TaskPatch) -> BoxFuture<'static, StorageResult<bool>>;
    /// Move every `ACTIVE` task of the room back to `PENDING`, returning how many changed.
    fn demote_active_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>>;
    fn delete_task(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>>;
    fn delete_room_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>>;

    /// Store the vote. A previous vote of the same user on the same task keeps its id
    /// and only takes the new value.
    fn replace_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_votes(&self, task_id: &str) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    fn delete_task_votes(&self, task_id: &str) -> BoxFuture<'static, StorageResult<u64>>;
    fn delete_votes_for_tasks(
        &self,
        task_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

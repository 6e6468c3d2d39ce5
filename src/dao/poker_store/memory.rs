//! Process-local store used by tests and when no database is configured.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::dao::{
    models::{RoomEntity, RoomPatch, TaskEntity, TaskPatch, TaskStatus, UserEntity, VoteEntity},
    poker_store::PokerStore,
    storage::{StorageError, StorageResult},
};

type VoteKey = (String, String);

/// In-memory implementation of [`PokerStore`]. Collections keep insertion order so
/// listings match what a document database returns for natural order scans.
#[derive(Clone)]
pub struct MemoryPokerStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    rooms: RwLock<IndexMap<String, RoomEntity>>,
    users: RwLock<IndexMap<String, UserEntity>>,
    tasks: RwLock<IndexMap<String, TaskEntity>>,
    votes: RwLock<IndexMap<VoteKey, VoteEntity>>,
    listing_limit: usize,
}

impl MemoryPokerStore {
    /// Build an empty store whose listings return at most `listing_limit` records.
    pub fn new(listing_limit: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                rooms: RwLock::new(IndexMap::new()),
                users: RwLock::new(IndexMap::new()),
                tasks: RwLock::new(IndexMap::new()),
                votes: RwLock::new(IndexMap::new()),
                listing_limit,
            }),
        }
    }

    /// Spawn `work` against a cheap clone of the shared collections.
    fn run<T, F, Fut>(&self, work: F) -> BoxFuture<'static, StorageResult<T>>
    where
        F: FnOnce(Arc<MemoryInner>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(work(inner).await) })
    }

    /// Like [`Self::run`] for work that can itself fail.
    fn try_run<T, F, Fut>(&self, work: F) -> BoxFuture<'static, StorageResult<T>>
    where
        F: FnOnce(Arc<MemoryInner>) -> Fut + Send + 'static,
        Fut: Future<Output = StorageResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        Box::pin(work(inner))
    }
}

/// Insert `value` under `id` unless the key is taken, mirroring a unique index.
fn insert_absent<V>(
    collection: &mut IndexMap<String, V>,
    name: &'static str,
    id: String,
    value: V,
) -> StorageResult<()> {
    if collection.contains_key(&id) {
        return Err(StorageError::Duplicate {
            backend: "memory",
            collection: name,
            id,
        });
    }
    collection.insert(id, value);
    Ok(())
}

impl Default for MemoryPokerStore {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PokerStore for MemoryPokerStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.try_run(|inner| async move {
            let id = room.id.clone();
            insert_absent(&mut *inner.rooms.write().await, "rooms", id, room)
        })
    }

    fn find_room(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let id = id.to_owned();
        self.run(|inner| async move { inner.rooms.read().await.get(&id).cloned() })
    }

    fn update_room(&self, id: &str, patch: RoomPatch) -> BoxFuture<'static, StorageResult<bool>> {
        let id = id.to_owned();
        self.run(|inner| async move {
            match inner.rooms.write().await.get_mut(&id) {
                Some(room) => {
                    patch.apply(room);
                    true
                }
                None => false,
            }
        })
    }

    fn delete_room(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let id = id.to_owned();
        self.run(|inner| async move { inner.rooms.write().await.shift_remove(&id).is_some() })
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.try_run(|inner| async move {
            let id = user.id.clone();
            insert_absent(&mut *inner.users.write().await, "users", id, user)
        })
    }

    fn find_user(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let id = id.to_owned();
        self.run(|inner| async move { inner.users.read().await.get(&id).cloned() })
    }

    fn list_users(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let room_id = room_id.to_owned();
        self.run(|inner| async move {
            inner
                .users
                .read()
                .await
                .values()
                .filter(|user| user.room_id == room_id)
                .take(inner.listing_limit)
                .cloned()
                .collect()
        })
    }

    fn count_users(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        let room_id = room_id.to_owned();
        self.run(|inner| async move {
            inner
                .users
                .read()
                .await
                .values()
                .filter(|user| user.room_id == room_id)
                .count() as u64
        })
    }

    fn delete_user(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let id = id.to_owned();
        self.run(|inner| async move { inner.users.write().await.shift_remove(&id).is_some() })
    }

    fn insert_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.try_run(|inner| async move {
            let id = task.id.clone();
            insert_absent(&mut *inner.tasks.write().await, "tasks", id, task)
        })
    }

    fn find_task(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>> {
        let id = id.to_owned();
        self.run(|inner| async move { inner.tasks.read().await.get(&id).cloned() })
    }

    fn list_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<TaskEntity>>> {
        let room_id = room_id.to_owned();
        self.run(|inner| async move {
            inner
                .tasks
                .read()
                .await
                .values()
                .filter(|task| task.room_id == room_id)
                .take(inner.listing_limit)
                .cloned()
                .collect()
        })
    }

    fn task_ids(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let room_id = room_id.to_owned();
        self.run(|inner| async move {
            inner
                .tasks
                .read()
                .await
                .values()
                .filter(|task| task.room_id == room_id)
                .map(|task| task.id.clone())
                .collect()
        })
    }

    fn update_task(&self, id: &str, patch: TaskPatch) -> BoxFuture<'static, StorageResult<bool>> {
        let id = id.to_owned();
        self.run(|inner| async move {
            match inner.tasks.write().await.get_mut(&id) {
                Some(task) => {
                    patch.apply(task);
                    true
                }
                None => false,
            }
        })
    }

    fn demote_active_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        let room_id = room_id.to_owned();
        self.run(|inner| async move {
            let mut tasks = inner.tasks.write().await;
            let mut demoted = 0;
            for task in tasks
                .values_mut()
                .filter(|task| task.room_id == room_id && task.status == TaskStatus::Active)
            {
                task.status = TaskStatus::Pending;
                demoted += 1;
            }
            demoted
        })
    }

    fn delete_task(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let id = id.to_owned();
        self.run(|inner| async move { inner.tasks.write().await.shift_remove(&id).is_some() })
    }

    fn delete_room_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        let room_id = room_id.to_owned();
        self.run(|inner| async move {
            let mut tasks = inner.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|_, task| task.room_id != room_id);
            (before - tasks.len()) as u64
        })
    }

    fn replace_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        // Same shape as the MongoDB upsert: the first vote keeps its id and slot.
        self.run(|inner| async move {
            let key = (vote.task_id.clone(), vote.user_id.clone());
            let mut votes = inner.votes.write().await;
            match votes.get_mut(&key) {
                Some(existing) => existing.value = vote.value,
                None => {
                    votes.insert(key, vote);
                }
            }
        })
    }

    fn list_votes(&self, task_id: &str) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let task_id = task_id.to_owned();
        self.run(|inner| async move {
            inner
                .votes
                .read()
                .await
                .values()
                .filter(|vote| vote.task_id == task_id)
                .take(inner.listing_limit)
                .cloned()
                .collect()
        })
    }

    fn delete_task_votes(&self, task_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        let task_id = task_id.to_owned();
        self.run(|inner| async move {
            let mut votes = inner.votes.write().await;
            let before = votes.len();
            votes.retain(|(vote_task, _), _| *vote_task != task_id);
            (before - votes.len()) as u64
        })
    }

    fn delete_votes_for_tasks(
        &self,
        task_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        self.run(|inner| async move {
            if task_ids.is_empty() {
                return 0;
            }
            let mut votes = inner.votes.write().await;
            let before = votes.len();
            votes.retain(|(vote_task, _), _| !task_ids.contains(vote_task));
            (before - votes.len()) as u64
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn task(id: &str, room_id: &str, status: TaskStatus) -> TaskEntity {
        TaskEntity {
            id: id.into(),
            room_id: room_id.into(),
            title: format!("Task {id}"),
            description: String::new(),
            status,
            final_score: None,
        }
    }

    fn vote(task_id: &str, user_id: &str, value: &str) -> VoteEntity {
        VoteEntity {
            id: format!("{task_id}-{user_id}-{value}"),
            task_id: task_id.into(),
            user_id: user_id.into(),
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn replacing_a_vote_keeps_a_single_record() {
        let store = MemoryPokerStore::default();
        store.replace_vote(vote("t1", "alice", "3")).await.unwrap();
        store.replace_vote(vote("t1", "alice", "8")).await.unwrap();
        store.replace_vote(vote("t1", "bob", "5")).await.unwrap();

        let votes = store.list_votes("t1").await.unwrap();
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].user_id, "alice");
        assert_eq!(votes[0].id, "t1-alice-3");
        assert_eq!(votes[0].value, "8");
    }

    #[tokio::test]
    async fn inserting_a_taken_id_is_rejected() {
        let store = MemoryPokerStore::default();
        store.insert_task(task("a", "R1", TaskStatus::Active)).await.unwrap();

        let err = store
            .insert_task(task("a", "R2", TaskStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Duplicate { backend: "memory", collection: "tasks", ref id } if id == "a"
        ));

        let kept = store.find_task("a").await.unwrap().unwrap();
        assert_eq!(kept.room_id, "R1");
        assert_eq!(kept.status, TaskStatus::Active);
        assert_eq!(store.task_ids("R2").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn demote_only_touches_active_tasks_of_the_room() {
        let store = MemoryPokerStore::default();
        store.insert_task(task("a", "R1", TaskStatus::Active)).await.unwrap();
        store.insert_task(task("b", "R1", TaskStatus::Completed)).await.unwrap();
        store.insert_task(task("c", "R2", TaskStatus::Active)).await.unwrap();

        assert_eq!(store.demote_active_tasks("R1").await.unwrap(), 1);
        let a = store.find_task("a").await.unwrap().unwrap();
        let b = store.find_task("b").await.unwrap().unwrap();
        let c = store.find_task("c").await.unwrap().unwrap();
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(b.status, TaskStatus::Completed);
        assert_eq!(c.status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn listings_respect_limit_and_insertion_order() {
        let store = MemoryPokerStore::new(2);
        for id in ["first", "second", "third"] {
            store.insert_task(task(id, "R1", TaskStatus::Pending)).await.unwrap();
        }

        let listed: Vec<_> = store
            .list_tasks("R1")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(listed, vec!["first", "second"]);
        assert_eq!(store.task_ids("R1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn bulk_vote_deletion_is_scoped_to_given_tasks() {
        let store = MemoryPokerStore::default();
        store.replace_vote(vote("t1", "alice", "1")).await.unwrap();
        store.replace_vote(vote("t2", "alice", "2")).await.unwrap();
        store.replace_vote(vote("t3", "alice", "3")).await.unwrap();

        let removed = store
            .delete_votes_for_tasks(vec!["t1".into(), "t2".into()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.list_votes("t3").await.unwrap().len(), 1);
        assert_eq!(store.delete_votes_for_tasks(Vec::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn room_updates_report_missing_rooms() {
        let store = MemoryPokerStore::default();
        assert!(!store
            .update_room("NOPE", RoomPatch::revealed(true))
            .await
            .unwrap());

        store
            .insert_room(RoomEntity {
                id: "ROOM1".into(),
                name: "Sprint".into(),
                created_at: SystemTime::now(),
                cards_revealed: false,
                active_task_id: None,
            })
            .await
            .unwrap();
        assert!(store
            .update_room("ROOM1", RoomPatch::revealed(true))
            .await
            .unwrap());
        assert!(store.find_room("ROOM1").await.unwrap().unwrap().cards_revealed);
    }
}

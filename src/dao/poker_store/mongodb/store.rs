use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::info;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoRoomDocument, MongoTaskDocument, MongoUserDocument, MongoVoteDocument, doc_id,
        room_update, task_update,
    },
};
use crate::dao::{
    models::{RoomEntity, RoomPatch, TaskEntity, TaskPatch, TaskStatus, UserEntity, VoteEntity},
    poker_store::PokerStore,
    storage::StorageResult,
};

const ROOMS: &str = "rooms";
const USERS: &str = "users";
const TASKS: &str = "tasks";
const VOTES: &str = "votes";

/// MongoDB implementation of [`PokerStore`], one collection per entity.
#[derive(Clone)]
pub struct MongoPokerStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    listing_limit: i64,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        info!(database = %self.config.database_name, "MongoDB connection re-established");
        Ok(())
    }
}

impl MongoPokerStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig, listing_limit: usize) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
            listing_limit: i64::try_from(listing_limit).unwrap_or(i64::MAX),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let lookups: [(&'static str, &'static str, Document, bool); 4] = [
            (USERS, "user_room_idx", doc! {"room_id": 1}, false),
            (TASKS, "task_room_idx", doc! {"room_id": 1, "status": 1}, false),
            (VOTES, "vote_task_idx", doc! {"task_id": 1}, false),
            (VOTES, "vote_task_user_idx", doc! {"task_id": 1, "user_id": 1}, true),
        ];

        for (collection, name, keys, unique) in lookups {
            let index = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        self.database().await.collection(ROOMS)
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        self.database().await.collection(USERS)
    }

    async fn tasks(&self) -> Collection<MongoTaskDocument> {
        self.database().await.collection(TASKS)
    }

    async fn votes(&self) -> Collection<MongoVoteDocument> {
        self.database().await.collection(VOTES)
    }

    async fn insert_room(&self, room: RoomEntity) -> MongoResult<()> {
        let id = room.id.clone();
        let document: MongoRoomDocument = room.into();
        self.rooms()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::insert(ROOMS, id, source))?;
        Ok(())
    }

    async fn find_room(&self, id: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: ROOMS,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn update_room(&self, id: String, patch: RoomPatch) -> MongoResult<bool> {
        if patch == RoomPatch::default() {
            return Ok(self.find_room(id).await?.is_some());
        }

        let result = self
            .rooms()
            .await
            .update_one(doc_id(&id), room_update(&patch))
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: ROOMS,
                key: id,
                source,
            })?;
        Ok(result.matched_count > 0)
    }

    async fn delete_room(&self, id: String) -> MongoResult<bool> {
        let result = self
            .rooms()
            .await
            .delete_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: ROOMS,
                key: id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_user(&self, user: UserEntity) -> MongoResult<()> {
        let id = user.id.clone();
        let document: MongoUserDocument = user.into();
        self.users()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::insert(USERS, id, source))?;
        Ok(())
    }

    async fn find_user(&self, id: String) -> MongoResult<Option<UserEntity>> {
        let document = self
            .users()
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: USERS,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_users(&self, room_id: String) -> MongoResult<Vec<UserEntity>> {
        let list_error = |source| MongoDaoError::List {
            collection: USERS,
            key: room_id.clone(),
            source,
        };

        let documents: Vec<MongoUserDocument> = self
            .users()
            .await
            .find(doc! {"room_id": &room_id})
            .limit(self.inner.listing_limit)
            .await
            .map_err(list_error)?
            .try_collect()
            .await
            .map_err(list_error)?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn count_users(&self, room_id: String) -> MongoResult<u64> {
        self.users()
            .await
            .count_documents(doc! {"room_id": &room_id})
            .await
            .map_err(|source| MongoDaoError::List {
                collection: USERS,
                key: room_id,
                source,
            })
    }

    async fn delete_user(&self, id: String) -> MongoResult<bool> {
        let result = self
            .users()
            .await
            .delete_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: USERS,
                key: id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_task(&self, task: TaskEntity) -> MongoResult<()> {
        let id = task.id.clone();
        let document: MongoTaskDocument = task.into();
        self.tasks()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::insert(TASKS, id, source))?;
        Ok(())
    }

    async fn find_task(&self, id: String) -> MongoResult<Option<TaskEntity>> {
        let document = self
            .tasks()
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: TASKS,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_tasks(&self, room_id: String) -> MongoResult<Vec<TaskEntity>> {
        let list_error = |source| MongoDaoError::List {
            collection: TASKS,
            key: room_id.clone(),
            source,
        };

        let documents: Vec<MongoTaskDocument> = self
            .tasks()
            .await
            .find(doc! {"room_id": &room_id})
            .limit(self.inner.listing_limit)
            .await
            .map_err(list_error)?
            .try_collect()
            .await
            .map_err(list_error)?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn task_ids(&self, room_id: String) -> MongoResult<Vec<String>> {
        let list_error = |source| MongoDaoError::List {
            collection: TASKS,
            key: room_id.clone(),
            source,
        };

        let documents: Vec<Document> = self
            .database()
            .await
            .collection::<Document>(TASKS)
            .find(doc! {"room_id": &room_id})
            .projection(doc! {"_id": 1})
            .await
            .map_err(list_error)?
            .try_collect()
            .await
            .map_err(list_error)?;

        documents
            .iter()
            .map(|document| {
                document
                    .get_str("_id")
                    .map(str::to_owned)
                    .map_err(|err| MongoDaoError::Malformed {
                        collection: TASKS,
                        message: err.to_string(),
                    })
            })
            .collect()
    }

    async fn update_task(&self, id: String, patch: TaskPatch) -> MongoResult<bool> {
        if patch == TaskPatch::default() {
            return Ok(self.find_task(id).await?.is_some());
        }

        let result = self
            .tasks()
            .await
            .update_one(doc_id(&id), task_update(&patch))
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: TASKS,
                key: id,
                source,
            })?;
        Ok(result.matched_count > 0)
    }

    async fn demote_active_tasks(&self, room_id: String) -> MongoResult<u64> {
        let result = self
            .tasks()
            .await
            .update_many(
                doc! {"room_id": &room_id, "status": TaskStatus::Active.as_str()},
                task_update(&TaskPatch::status(TaskStatus::Pending)),
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: TASKS,
                key: room_id,
                source,
            })?;
        Ok(result.modified_count)
    }

    async fn delete_task(&self, id: String) -> MongoResult<bool> {
        let result = self
            .tasks()
            .await
            .delete_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: TASKS,
                key: id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_room_tasks(&self, room_id: String) -> MongoResult<u64> {
        let result = self
            .tasks()
            .await
            .delete_many(doc! {"room_id": &room_id})
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: TASKS,
                key: room_id,
                source,
            })?;
        Ok(result.deleted_count)
    }

    /// Upsert keyed by `(task_id, user_id)` so the replacement is a single atomic write.
    async fn replace_vote(&self, vote: VoteEntity) -> MongoResult<()> {
        let filter = doc! {"task_id": &vote.task_id, "user_id": &vote.user_id};
        let key = format!("{}/{}", vote.task_id, vote.user_id);
        let update = doc! {
            "$set": {"value": &vote.value},
            "$setOnInsert": {"_id": &vote.id},
        };

        self.votes()
            .await
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: VOTES,
                key,
                source,
            })?;
        Ok(())
    }

    async fn list_votes(&self, task_id: String) -> MongoResult<Vec<VoteEntity>> {
        let list_error = |source| MongoDaoError::List {
            collection: VOTES,
            key: task_id.clone(),
            source,
        };

        let documents: Vec<MongoVoteDocument> = self
            .votes()
            .await
            .find(doc! {"task_id": &task_id})
            .limit(self.inner.listing_limit)
            .await
            .map_err(list_error)?
            .try_collect()
            .await
            .map_err(list_error)?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn delete_task_votes(&self, task_id: String) -> MongoResult<u64> {
        let result = self
            .votes()
            .await
            .delete_many(doc! {"task_id": &task_id})
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: VOTES,
                key: task_id,
                source,
            })?;
        Ok(result.deleted_count)
    }

    async fn delete_votes_for_tasks(&self, task_ids: Vec<String>) -> MongoResult<u64> {
        if task_ids.is_empty() {
            return Ok(0);
        }

        let key = task_ids.join(",");
        let result = self
            .votes()
            .await
            .delete_many(doc! {"task_id": {"$in": task_ids}})
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: VOTES,
                key,
                source,
            })?;
        Ok(result.deleted_count)
    }
}

// Arguments are evaluated before the future is built so it owns everything it touches.
macro_rules! boxed {
    ($store:expr, $call:ident($arg:expr)) => {{
        let store = $store.clone();
        let arg = $arg;
        Box::pin(async move { store.$call(arg).await.map_err(Into::into) })
    }};
    ($store:expr, $call:ident($first:expr, $second:expr)) => {{
        let store = $store.clone();
        let (first, second) = ($first, $second);
        Box::pin(async move { store.$call(first, second).await.map_err(Into::into) })
    }};
}

impl PokerStore for MongoPokerStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, insert_room(room))
    }

    fn find_room(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        boxed!(self, find_room(id.to_owned()))
    }

    fn update_room(&self, id: &str, patch: RoomPatch) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, update_room(id.to_owned(), patch))
    }

    fn delete_room(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, delete_room(id.to_owned()))
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, insert_user(user))
    }

    fn find_user(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        boxed!(self, find_user(id.to_owned()))
    }

    fn list_users(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        boxed!(self, list_users(room_id.to_owned()))
    }

    fn count_users(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        boxed!(self, count_users(room_id.to_owned()))
    }

    fn delete_user(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, delete_user(id.to_owned()))
    }

    fn insert_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, insert_task(task))
    }

    fn find_task(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>> {
        boxed!(self, find_task(id.to_owned()))
    }

    fn list_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<TaskEntity>>> {
        boxed!(self, list_tasks(room_id.to_owned()))
    }

    fn task_ids(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        boxed!(self, task_ids(room_id.to_owned()))
    }

    fn update_task(&self, id: &str, patch: TaskPatch) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, update_task(id.to_owned(), patch))
    }

    fn demote_active_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        boxed!(self, demote_active_tasks(room_id.to_owned()))
    }

    fn delete_task(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, delete_task(id.to_owned()))
    }

    fn delete_room_tasks(&self, room_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        boxed!(self, delete_room_tasks(room_id.to_owned()))
    }

    fn replace_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, replace_vote(vote))
    }

    fn list_votes(&self, task_id: &str) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        boxed!(self, list_votes(task_id.to_owned()))
    }

    fn delete_task_votes(&self, task_id: &str) -> BoxFuture<'static, StorageResult<u64>> {
        boxed!(self, delete_task_votes(task_id.to_owned()))
    }

    fn delete_votes_for_tasks(
        &self,
        task_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        boxed!(self, delete_votes_for_tasks(task_ids))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

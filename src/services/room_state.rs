//! Read-side projection of a room: masking, `has_voted` and the completion check.

use std::collections::HashSet;

use crate::{
    dao::{models::VoteEntity, poker_store::PokerStore, storage::StorageResult},
    dto::{
        room::{RoomDto, UserDto},
        state::{RoomState, VoteView},
    },
};

/// Whether vote values may be sent while cards are still hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Hide values until the room is revealed.
    Masked,
    /// Always send values (reveal broadcasts).
    Unmasked,
}

/// Build the snapshot of a room, or `None` when it does not exist.
///
/// Pure read: nothing is written, so concurrent calls are fine.
pub async fn assemble(
    store: &dyn PokerStore,
    room_id: &str,
    visibility: Visibility,
) -> StorageResult<Option<RoomState>> {
    let Some(room) = store.find_room(room_id).await? else {
        return Ok(None);
    };

    let users = store.list_users(room_id).await?;
    let tasks = store.list_tasks(room_id).await?;

    let active_task = match room.active_task_id.as_deref() {
        Some(task_id) => store.find_task(task_id).await?,
        None => None,
    };

    let (votes, voters) = match &active_task {
        Some(task) => {
            let raw = store.list_votes(&task.id).await?;
            let voters: HashSet<String> = raw.iter().map(|vote| vote.user_id.clone()).collect();
            let view: fn(VoteEntity) -> VoteView =
                if room.cards_revealed || visibility == Visibility::Unmasked {
                    VoteView::revealed
                } else {
                    VoteView::masked
                };
            (raw.into_iter().map(view).collect(), voters)
        }
        None => (Vec::new(), HashSet::new()),
    };

    let users = users
        .into_iter()
        .map(|user| {
            let has_voted = voters.contains(&user.id);
            UserDto::new(user, has_voted)
        })
        .collect();

    Ok(Some(RoomState {
        room: RoomDto::from(room),
        users,
        tasks: tasks.into_iter().map(Into::into).collect(),
        votes,
        active_task: active_task.map(Into::into),
    }))
}

/// Whether every non-spectator of the room voted on `task_id`.
///
/// A room without eligible voters is never complete.
pub async fn all_voted(store: &dyn PokerStore, room_id: &str, task_id: &str) -> StorageResult<bool> {
    let voters: Vec<String> = store
        .list_users(room_id)
        .await?
        .into_iter()
        .filter(|user| !user.is_spectator)
        .map(|user| user.id)
        .collect();

    if voters.is_empty() {
        return Ok(false);
    }

    let cast: HashSet<String> = store
        .list_votes(task_id)
        .await?
        .into_iter()
        .map(|vote| vote.user_id)
        .collect();

    Ok(voters.iter().all(|id| cast.contains(id)))
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::{
        models::{RoomEntity, TaskEntity, TaskStatus, UserEntity},
        poker_store::memory::MemoryPokerStore,
    };

    const ROOM: &str = "ROOM0001";

    async fn seed(store: &MemoryPokerStore, revealed: bool) {
        store
            .insert_room(RoomEntity {
                id: ROOM.into(),
                name: "Sprint 1".into(),
                created_at: SystemTime::now(),
                cards_revealed: revealed,
                active_task_id: Some("t1".into()),
            })
            .await
            .unwrap();
        for (id, spectator) in [("alice", false), ("bob", false), ("eve", true)] {
            store
                .insert_user(UserEntity {
                    id: id.into(),
                    room_id: ROOM.into(),
                    name: id.into(),
                    is_admin: id == "alice",
                    is_spectator: spectator,
                })
                .await
                .unwrap();
        }
        store
            .insert_task(TaskEntity {
                id: "t1".into(),
                room_id: ROOM.into(),
                title: "Login page".into(),
                description: String::new(),
                status: TaskStatus::Active,
                final_score: None,
            })
            .await
            .unwrap();
        store
            .replace_vote(VoteEntity {
                id: "v1".into(),
                task_id: "t1".into(),
                user_id: "alice".into(),
                value: "5".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn hidden_votes_are_masked_but_counted() {
        let store = MemoryPokerStore::default();
        seed(&store, false).await;

        let state = assemble(&store, ROOM, Visibility::Masked)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state.votes.len(), 1);
        assert!(state.votes.iter().all(|vote| vote.value().is_none()));
        let alice = state.users.iter().find(|u| u.id == "alice").unwrap();
        let bob = state.users.iter().find(|u| u.id == "bob").unwrap();
        assert!(alice.has_voted);
        assert!(!bob.has_voted);
        assert_eq!(state.active_task.unwrap().id, "t1");
    }

    #[tokio::test]
    async fn unmasked_or_revealed_rooms_expose_values() {
        let store = MemoryPokerStore::default();
        seed(&store, false).await;
        let state = assemble(&store, ROOM, Visibility::Unmasked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.votes[0].value(), Some("5"));

        let revealed = MemoryPokerStore::default();
        seed(&revealed, true).await;
        let state = assemble(&revealed, ROOM, Visibility::Masked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.votes[0].value(), Some("5"));
    }

    #[tokio::test]
    async fn missing_room_yields_none() {
        let store = MemoryPokerStore::default();
        assert!(
            assemble(&store, "NOPE0000", Visibility::Masked)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn completion_ignores_spectators() {
        let store = MemoryPokerStore::default();
        seed(&store, false).await;
        assert!(!all_voted(&store, ROOM, "t1").await.unwrap());

        store
            .replace_vote(VoteEntity {
                id: "v2".into(),
                task_id: "t1".into(),
                user_id: "bob".into(),
                value: "8".into(),
            })
            .await
            .unwrap();
        assert!(all_voted(&store, ROOM, "t1").await.unwrap());
    }

    #[tokio::test]
    async fn completion_is_false_without_voters() {
        let store = MemoryPokerStore::default();
        store
            .insert_user(UserEntity {
                id: "eve".into(),
                room_id: ROOM.into(),
                name: "Eve".into(),
                is_admin: true,
                is_spectator: true,
            })
            .await
            .unwrap();

        assert!(!all_voted(&store, ROOM, "t1").await.unwrap());
    }
}

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{
        broadcast::EVENT_STATE_UPDATE,
        room_state::{Visibility, assemble},
    },
    state::{SharedState, deck::normalize_room_id},
};

/// A live subscription to one room: its current snapshot and the receiver for what follows.
pub struct RoomSubscription {
    pub room_id: String,
    pub snapshot: ServerEvent,
    pub receiver: broadcast::Receiver<ServerEvent>,
}

/// Subscribe to a room's events, failing when the room does not exist.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: &str,
) -> Result<RoomSubscription, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    // Subscribe first so nothing emitted after the snapshot is missed.
    let receiver = state.channels().join_group(&room_id);
    let Some(snapshot) = assemble(store.as_ref(), &room_id, Visibility::Masked).await? else {
        drop(receiver);
        state.channels().leave_group(&room_id);
        return Err(ServiceError::NotFound(format!("room `{room_id}` not found")));
    };

    let snapshot = ServerEvent::json(EVENT_STATE_UPDATE, &snapshot)
        .map_err(|err| ServiceError::Internal(format!("unserializable room state: {err}")))?;

    Ok(RoomSubscription {
        room_id,
        snapshot,
        receiver,
    })
}

fn to_event(payload: ServerEvent) -> Event {
    Event::default().event(payload.event).data(payload.data.as_ref())
}

/// Convert a room subscription into an SSE response, forwarding events and
/// leaving the room group once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    subscription: RoomSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let RoomSubscription {
        room_id,
        snapshot,
        mut receiver,
    } = subscription;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(snapshot))).await.is_ok() {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    recv_result = receiver.recv() => {
                        match recv_result {
                            Ok(payload) => {
                                if tx.send(Ok(to_event(payload))).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Closed) => {
                                debug!(room_id = %room_id, "room group closed; ending SSE stream");
                                break;
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                // Snapshots are complete, the next one catches the client up.
                                debug!(room_id = %room_id, skipped, "SSE subscriber lagged");
                                continue;
                            }
                        }
                    }
                }
            }
        }

        drop(receiver);
        state.channels().leave_group(&room_id);
        info!(room_id = %room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::poker_store::memory::MemoryPokerStore,
        dto::room::CreateRoomRequest,
        services::room_service,
        state::AppState,
    };

    async fn state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryPokerStore::default())).await;
        state
    }

    #[tokio::test]
    async fn subscription_starts_with_a_masked_snapshot() {
        let state = state().await;
        let room = room_service::create_room(
            &state,
            CreateRoomRequest {
                name: "Sprint 3".into(),
            },
        )
        .await
        .unwrap();

        let subscription = subscribe_room(&state, &room.id.to_lowercase()).await.unwrap();
        assert_eq!(subscription.room_id, room.id);
        assert_eq!(subscription.snapshot.event, EVENT_STATE_UPDATE);
        let snapshot: serde_json::Value =
            serde_json::from_str(&subscription.snapshot.data).unwrap();
        assert_eq!(snapshot["room"]["name"], "Sprint 3");
        assert_eq!(state.channels().len(), 1);
    }

    #[tokio::test]
    async fn unknown_rooms_leave_no_group_behind() {
        let state = state().await;

        let result = subscribe_room(&state, "NOPE0000").await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert!(state.channels().is_empty());
    }
}

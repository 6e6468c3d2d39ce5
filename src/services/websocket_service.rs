use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        sse::ServerEvent,
        ws::{ClientMessage, WsErrorMessage},
    },
    error::{ActionRejection, ServiceError},
    services::{
        broadcast::EVENT_ERROR,
        room_service::{self, ActionOutcome},
    },
    state::{ConnectionId, Session, SharedState, deck::normalize_room_id},
};

/// Forwarding of one room group onto a connection's outbound queue.
struct GroupMembership {
    room_id: String,
    forwarder: JoinHandle<()>,
}

impl GroupMembership {
    fn spawn(
        state: &SharedState,
        connection: ConnectionId,
        room_id: &str,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let mut receiver = state.channels().join_group(room_id);
        let room = room_id.to_owned();

        let forwarder = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if outbound
                            .send(Message::Text(event.to_ws_frame().into()))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(connection = %connection, room_id = %room, skipped, "websocket subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self {
            room_id: room_id.to_owned(),
            forwarder,
        }
    }

    /// Stop forwarding and drop the group when this was its last subscriber.
    async fn leave(self, state: &SharedState) {
        self.forwarder.abort();
        // Wait for the receiver to be dropped so the subscriber count is accurate.
        let _ = self.forwarder.await;
        state.channels().leave_group(&self.room_id);
    }
}

/// Handle the full lifecycle of a room WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection: ConnectionId = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!(connection = %connection, "websocket connected");
    let mut membership: Option<GroupMembership> = None;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection = %connection, payload = %text.as_str(), "received websocket message");

                match ClientMessage::from_json_str(text.as_str()) {
                    Ok(message) => {
                        let kind = message.kind();
                        if let Err(err) =
                            dispatch(&state, connection, &outbound_tx, &mut membership, message)
                                .await
                        {
                            warn!(connection = %connection, kind, error = %err, "websocket action failed");
                            send_error(&outbound_tx, &err.to_string());
                        }
                    }
                    Err(err) => {
                        warn!(connection = %connection, error = %err, "failed to parse or validate websocket message");
                        send_error(&outbound_tx, &err.to_string());
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %connection, "websocket closed by client");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Err(err) = leave_session(&state, connection, &mut membership).await {
        warn!(connection = %connection, error = %err, "failed to clean up session on disconnect");
    }
    info!(connection = %connection, "websocket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Run one inbound message through the matching room handler.
///
/// Discarded actions are not reported back to the client.
async fn dispatch(
    state: &SharedState,
    connection: ConnectionId,
    outbound: &mpsc::UnboundedSender<Message>,
    membership: &mut Option<GroupMembership>,
    message: ClientMessage,
) -> Result<(), ServiceError> {
    let kind = message.kind();
    let applied = match message {
        ClientMessage::JoinRoom { room_id, user_id } => {
            join(state, connection, outbound, membership, &room_id, &user_id).await?
        }
        ClientMessage::AddTask { room_id, task } => {
            room_service::create_task(state, &room_id, task)
                .await?
                .is_applied()
        }
        ClientMessage::SetActiveTask { room_id, action } => {
            room_service::set_active_task(state, &room_id, action)
                .await?
                .is_applied()
        }
        ClientMessage::CastVote { room_id, vote } => {
            room_service::cast_vote(state, room_id.as_deref(), vote)
                .await?
                .is_applied()
        }
        ClientMessage::RevealCards { room_id, actor } => {
            room_service::reveal_cards(state, &room_id, &actor.user_id)
                .await?
                .is_applied()
        }
        ClientMessage::ResetVotes { room_id, reset } => {
            room_service::reset_votes(state, &room_id, reset)
                .await?
                .is_applied()
        }
        ClientMessage::CompleteTask {
            room_id,
            completion,
        } => room_service::complete_task(state, &room_id, completion)
            .await?
            .is_applied(),
        ClientMessage::DeleteTask { room_id, action } => {
            room_service::delete_task(state, &room_id, action)
                .await?
                .is_applied()
        }
        ClientMessage::CancelTask { room_id, action } => {
            room_service::cancel_task(state, &room_id, action)
                .await?
                .is_applied()
        }
        ClientMessage::LeaveRoom {} => leave_session(state, connection, membership).await?,
    };

    debug!(connection = %connection, kind, applied, "websocket message handled");
    Ok(())
}

/// Bind the connection to a room member, subscribe it to the room and announce it.
///
/// Binding to another member first runs the leave cleanup of the previous one.
async fn join(
    state: &SharedState,
    connection: ConnectionId,
    outbound: &mpsc::UnboundedSender<Message>,
    membership: &mut Option<GroupMembership>,
    room_id: &str,
    user_id: &str,
) -> Result<bool, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let ActionOutcome::Applied(user) =
        room_service::check_membership(state, &room_id, user_id).await?
    else {
        return Ok(false);
    };

    let session = Session {
        room_id: room_id.clone(),
        user_id: user.id,
    };
    if let Some(previous) = state.sessions().register(connection, session.clone()) {
        if previous != session {
            info!(
                connection = %connection,
                previous_room = %previous.room_id,
                previous_user = %previous.user_id,
                "connection switched member; leaving previous session"
            );
            if previous.room_id != room_id {
                leave_group(state, membership).await;
            }
            room_service::leave_room(state, &previous.room_id, &previous.user_id).await?;
        }
    }

    let subscribed = membership
        .as_ref()
        .is_some_and(|current| current.room_id == room_id);
    if !subscribed {
        leave_group(state, membership).await;
        *membership = Some(GroupMembership::spawn(
            state,
            connection,
            &room_id,
            outbound.clone(),
        ));
    }

    info!(connection = %connection, room_id = %room_id, user_id = %session.user_id, "websocket joined room");
    room_service::announce(state, &room_id).await?;
    Ok(true)
}

/// Forget the connection's session and run the leave action for it.
async fn leave_session(
    state: &SharedState,
    connection: ConnectionId,
    membership: &mut Option<GroupMembership>,
) -> Result<bool, ServiceError> {
    leave_group(state, membership).await;

    let Some(session) = state.sessions().remove(&connection) else {
        debug!(connection = %connection, reason = %ActionRejection::NoSession, "leave ignored");
        return Ok(false);
    };

    let outcome = room_service::leave_room(state, &session.room_id, &session.user_id).await?;
    Ok(outcome.is_applied())
}

async fn leave_group(state: &SharedState, membership: &mut Option<GroupMembership>) {
    if let Some(current) = membership.take() {
        current.leave(state).await;
    }
}

/// Send an `error` event to this connection only.
fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    let payload = WsErrorMessage {
        message: message.to_owned(),
    };
    match ServerEvent::json(EVENT_ERROR, &payload) {
        Ok(event) => {
            let _ = tx.send(Message::Text(event.to_ws_frame().into()));
        }
        Err(err) => warn!(error = %err, "failed to serialize websocket error"),
    }
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::Value;
    use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::poker_store::{PokerStore, memory::MemoryPokerStore},
        dto::room::{CreateRoomRequest, JoinRoomRequest},
        state::AppState,
    };

    struct Connection {
        id: ConnectionId,
        tx: mpsc::UnboundedSender<Message>,
        rx: UnboundedReceiver<Message>,
        membership: Option<GroupMembership>,
    }

    impl Connection {
        fn open() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                id: Uuid::new_v4(),
                tx,
                rx,
                membership: None,
            }
        }

        async fn send(&mut self, state: &SharedState, message: ClientMessage) {
            dispatch(state, self.id, &self.tx, &mut self.membership, message)
                .await
                .unwrap();
        }

        async fn join(&mut self, state: &SharedState, room_id: &str, user_id: &str) {
            self.send(
                state,
                ClientMessage::JoinRoom {
                    room_id: room_id.into(),
                    user_id: user_id.into(),
                },
            )
            .await;
        }

        async fn next_frame(&mut self) -> Value {
            let message = timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("no frame within a second")
                .expect("outbound channel closed");
            match message {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected frame {other:?}"),
            }
        }

        fn subscribed_to(&self) -> Option<&str> {
            self.membership.as_ref().map(|m| m.room_id.as_str())
        }
    }

    fn user_ids(frame: &Value) -> Vec<&str> {
        frame["data"]["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|user| user["id"].as_str().unwrap())
            .collect()
    }

    async fn setup() -> (SharedState, MemoryPokerStore) {
        let store = MemoryPokerStore::default();
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(store.clone())).await;
        (state, store)
    }

    async fn open_room(state: &SharedState, name: &str) -> String {
        room_service::create_room(state, CreateRoomRequest { name: name.into() })
            .await
            .unwrap()
            .id
    }

    async fn add_member(state: &SharedState, room_id: &str, name: &str) -> String {
        room_service::join_room(
            state,
            room_id,
            JoinRoomRequest {
                name: name.into(),
                is_spectator: false,
                room_id: None,
            },
        )
        .await
        .unwrap()
        .user
        .id
    }

    #[tokio::test]
    async fn joining_binds_the_connection_and_announces_the_room() {
        let (state, _store) = setup().await;
        let room_id = open_room(&state, "Sprint").await;
        let alice = add_member(&state, &room_id, "Alice").await;
        let bob = add_member(&state, &room_id, "Bob").await;

        let mut conn = Connection::open();
        conn.join(&state, &room_id.to_lowercase(), &alice).await;

        assert_eq!(
            state.sessions().get(&conn.id),
            Some(Session {
                room_id: room_id.clone(),
                user_id: alice.clone(),
            })
        );
        assert_eq!(conn.subscribed_to(), Some(room_id.as_str()));
        assert_eq!(state.channels().len(), 1);

        let frame = conn.next_frame().await;
        assert_eq!(frame["event"], "state_update");
        assert_eq!(frame["data"]["room"]["id"], room_id.as_str());
        assert_eq!(user_ids(&frame), vec![alice.as_str(), bob.as_str()]);
    }

    #[tokio::test]
    async fn joining_as_a_stranger_registers_nothing() {
        let (state, store) = setup().await;
        let room_id = open_room(&state, "Sprint").await;
        let alice = add_member(&state, &room_id, "Alice").await;
        let other_room = open_room(&state, "Elsewhere").await;
        let outsider = add_member(&state, &other_room, "Carol").await;

        let mut conn = Connection::open();
        conn.join(&state, &room_id, "no-such-user").await;
        conn.join(&state, &room_id, &outsider).await;
        conn.join(&state, "NOROOM", &alice).await;

        assert!(state.sessions().is_empty());
        assert!(conn.subscribed_to().is_none());
        assert!(state.channels().is_empty());
        assert!(conn.rx.try_recv().is_err());
        assert!(store.find_user(&outsider).await.unwrap().is_some());
        assert_eq!(store.count_users(&room_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn joining_as_another_member_leaves_the_previous_one() {
        let (state, store) = setup().await;
        let room_id = open_room(&state, "Sprint").await;
        let alice = add_member(&state, &room_id, "Alice").await;
        let bob = add_member(&state, &room_id, "Bob").await;

        let mut conn = Connection::open();
        conn.join(&state, &room_id, &alice).await;
        assert_eq!(user_ids(&conn.next_frame().await).len(), 2);

        conn.join(&state, &room_id, &bob).await;

        assert!(store.find_user(&alice).await.unwrap().is_none());
        assert!(store.find_room(&room_id).await.unwrap().is_some());
        assert_eq!(
            state.sessions().get(&conn.id).map(|s| s.user_id),
            Some(bob.clone())
        );
        assert_eq!(state.sessions().len(), 1);
        assert_eq!(conn.subscribed_to(), Some(room_id.as_str()));

        // The leave broadcast, then the announcement of the new binding.
        let after_leave = conn.next_frame().await;
        let announced = conn.next_frame().await;
        assert_eq!(user_ids(&after_leave), vec![bob.as_str()]);
        assert_eq!(user_ids(&announced), vec![bob.as_str()]);
    }

    #[tokio::test]
    async fn switching_rooms_cleans_up_the_previous_room() {
        let (state, store) = setup().await;
        let first = open_room(&state, "First").await;
        let alice = add_member(&state, &first, "Alice").await;
        let second = open_room(&state, "Second").await;
        let carol = add_member(&state, &second, "Carol").await;

        let mut conn = Connection::open();
        conn.join(&state, &first, &alice).await;
        conn.join(&state, &second, &carol).await;

        assert!(store.find_user(&alice).await.unwrap().is_none());
        assert!(store.find_room(&first).await.unwrap().is_none());
        assert_eq!(conn.subscribed_to(), Some(second.as_str()));
        assert_eq!(state.channels().len(), 1);
        assert_eq!(
            state.sessions().get(&conn.id).map(|s| s.room_id),
            Some(second.clone())
        );
    }

    #[tokio::test]
    async fn leave_room_removes_the_last_member_and_the_room() {
        let (state, store) = setup().await;
        let room_id = open_room(&state, "Sprint").await;
        let alice = add_member(&state, &room_id, "Alice").await;

        let mut conn = Connection::open();
        conn.join(&state, &room_id, &alice).await;
        conn.send(&state, ClientMessage::LeaveRoom {}).await;

        assert!(store.find_user(&alice).await.unwrap().is_none());
        assert!(store.find_room(&room_id).await.unwrap().is_none());
        assert!(state.sessions().is_empty());
        assert!(conn.subscribed_to().is_none());
        assert!(state.channels().is_empty());

        // Nothing left to leave.
        conn.send(&state, ClientMessage::LeaveRoom {}).await;
        assert!(!leave_session(&state, conn.id, &mut conn.membership).await.unwrap());
    }

    #[tokio::test]
    async fn disconnect_runs_the_leave_action() {
        let (state, store) = setup().await;
        let room_id = open_room(&state, "Sprint").await;
        let alice = add_member(&state, &room_id, "Alice").await;
        let bob = add_member(&state, &room_id, "Bob").await;

        let mut first = Connection::open();
        let mut second = Connection::open();
        first.join(&state, &room_id, &alice).await;
        second.join(&state, &room_id, &bob).await;

        assert!(leave_session(&state, first.id, &mut first.membership).await.unwrap());
        assert!(store.find_user(&alice).await.unwrap().is_none());
        assert!(store.find_room(&room_id).await.unwrap().is_some());
        assert_eq!(state.sessions().len(), 1);
        assert_eq!(state.channels().len(), 1);

        assert!(leave_session(&state, second.id, &mut second.membership).await.unwrap());
        assert!(store.find_user(&bob).await.unwrap().is_none());
        assert!(store.find_room(&room_id).await.unwrap().is_none());
        assert!(state.sessions().is_empty());
        assert!(state.channels().is_empty());
    }
}

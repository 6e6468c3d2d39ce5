use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dao::{poker_store::PokerStore, storage::StorageResult},
    dto::sse::ServerEvent,
    services::room_state::{Visibility, assemble},
    state::SharedState,
};

/// Masked snapshot pushed after every regular change.
pub const EVENT_STATE_UPDATE: &str = "state_update";
/// Unmasked snapshot pushed when cards are revealed.
pub const EVENT_REVEAL_VOTES: &str = "reveal_votes";
/// Error notice sent to a single WebSocket connection.
pub const EVENT_ERROR: &str = "error";

/// Push the masked state of the room to its group.
pub async fn broadcast_room_state(
    state: &SharedState,
    store: &dyn PokerStore,
    room_id: &str,
) -> StorageResult<()> {
    broadcast_snapshot(state, store, room_id, EVENT_STATE_UPDATE, Visibility::Masked).await
}

/// Push the unmasked state of the room to its group.
pub async fn broadcast_reveal(
    state: &SharedState,
    store: &dyn PokerStore,
    room_id: &str,
) -> StorageResult<()> {
    broadcast_snapshot(state, store, room_id, EVENT_REVEAL_VOTES, Visibility::Unmasked).await
}

async fn broadcast_snapshot(
    state: &SharedState,
    store: &dyn PokerStore,
    room_id: &str,
    event: &'static str,
    visibility: Visibility,
) -> StorageResult<()> {
    let Some(snapshot) = assemble(store, room_id, visibility).await? else {
        debug!(room_id, event, "room vanished; nothing to broadcast");
        return Ok(());
    };

    send_room_event(state, room_id, event, &snapshot);
    Ok(())
}

fn send_room_event(
    state: &SharedState,
    room_id: &str,
    event: &'static str,
    payload: &impl Serialize,
) {
    match ServerEvent::json(event, payload) {
        Ok(message) => {
            let receivers = state.channels().emit(room_id, message);
            debug!(room_id, event, receivers, "room event emitted");
        }
        Err(err) => warn!(room_id, event, error = %err, "failed to serialize room event"),
    }
}

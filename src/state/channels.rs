use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::dto::sse::ServerEvent;

/// Per-room publish groups, created lazily on first subscription.
///
/// Every subscriber (WebSocket connection or SSE stream) owns a receiver of the room's
/// broadcast channel; dropping the receiver is how a subscriber stops listening.
pub struct RoomChannels {
    hubs: DashMap<String, RoomHub>,
    capacity: usize,
}

/// Broadcast hub of a single room.
struct RoomHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl RoomHub {
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl RoomChannels {
    /// Build an empty registry whose channels buffer `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to the room's group, creating it when needed.
    pub fn join_group(&self, room_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomHub::new(self.capacity))
            .sender
            .subscribe()
    }

    /// Drop the room's group once its last receiver is gone.
    ///
    /// Callers drop their receiver before calling this.
    pub fn leave_group(&self, room_id: &str) {
        let removed = self
            .hubs
            .remove_if(room_id, |_, hub| hub.sender.receiver_count() == 0);
        if removed.is_some() {
            debug!(room_id, "dropped empty room group");
        }
    }

    /// Push an event to every subscriber of the room, returning how many received it.
    pub fn emit(&self, room_id: &str, event: ServerEvent) -> usize {
        let Some(hub) = self.hubs.get(room_id) else {
            return 0;
        };
        hub.sender.send(event).unwrap_or(0)
    }

    /// Tear the room's group down, ending every subscriber stream.
    pub fn close(&self, room_id: &str) {
        if self.hubs.remove(room_id).is_some() {
            debug!(room_id, "closed room group");
        }
    }

    /// Number of live groups.
    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    /// Whether no group is live.
    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &'static str) -> ServerEvent {
        ServerEvent::json(name, &serde_json::json!({"ok": true})).unwrap()
    }

    #[tokio::test]
    async fn events_only_reach_the_room_subscribers() {
        let channels = RoomChannels::new(4);
        let mut first = channels.join_group("AAAA1111");
        let mut other = channels.join_group("BBBB2222");

        assert_eq!(channels.emit("AAAA1111", event("state_update")), 1);

        let received = first.recv().await.unwrap();
        assert_eq!(received.event, "state_update");
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn empty_groups_are_dropped_on_leave() {
        let channels = RoomChannels::new(4);
        let receiver = channels.join_group("AAAA1111");
        let second = channels.join_group("AAAA1111");

        drop(receiver);
        channels.leave_group("AAAA1111");
        assert_eq!(channels.len(), 1);

        drop(second);
        channels.leave_group("AAAA1111");
        assert!(channels.is_empty());
        assert_eq!(channels.emit("AAAA1111", event("state_update")), 0);
    }

    #[tokio::test]
    async fn closing_a_group_ends_the_streams() {
        let channels = RoomChannels::new(4);
        let mut receiver = channels.join_group("AAAA1111");
        channels.close("AAAA1111");

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}

use dashmap::DashMap;
use uuid::Uuid;

/// Identifier handed to every WebSocket connection when it is accepted.
pub type ConnectionId = Uuid;

/// Room membership bound to a connection by `join_room`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room_id: String,
    pub user_id: String,
}

/// Process-local registry mapping live connections to the user they speak for.
///
/// Nothing here is persisted: a restart drops every session along with its socket.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<ConnectionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `session` to the connection, returning the binding it replaces.
    pub fn register(&self, connection: ConnectionId, session: Session) -> Option<Session> {
        self.sessions.insert(connection, session)
    }

    pub fn get(&self, connection: &ConnectionId) -> Option<Session> {
        self.sessions
            .get(connection)
            .map(|entry| entry.value().clone())
    }

    pub fn remove(&self, connection: &ConnectionId) -> Option<Session> {
        self.sessions.remove(connection).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(room: &str, user: &str) -> Session {
        Session {
            room_id: room.into(),
            user_id: user.into(),
        }
    }

    #[test]
    fn register_returns_the_replaced_session() {
        let registry = SessionRegistry::new();
        let connection = Uuid::new_v4();

        assert!(registry.register(connection, session("AAAA1111", "u1")).is_none());
        let previous = registry.register(connection, session("BBBB2222", "u2"));

        assert_eq!(previous, Some(session("AAAA1111", "u1")));
        assert_eq!(registry.get(&connection), Some(session("BBBB2222", "u2")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_forgets_the_connection() {
        let registry = SessionRegistry::new();
        let connection = Uuid::new_v4();
        registry.register(connection, session("AAAA1111", "u1"));

        assert!(registry.remove(&connection).is_some());
        assert!(registry.remove(&connection).is_none());
        assert!(registry.is_empty());
    }
}

pub mod channels;
pub mod deck;
pub mod gates;
pub mod sessions;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::poker_store::PokerStore, error::ServiceError};

pub use self::channels::RoomChannels;
pub use self::gates::RoomGates;
pub use self::sessions::{ConnectionId, Session, SessionRegistry};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, per-room channels, sessions and gates.
pub struct AppState {
    config: Arc<AppConfig>,
    store: RwLock<Option<Arc<dyn PokerStore>>>,
    degraded: watch::Sender<bool>,
    channels: RoomChannels,
    sessions: SessionRegistry,
    gates: RoomGates,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            channels: RoomChannels::new(config.channel_capacity()),
            gates: RoomGates::new(config.gate_timeout()),
            sessions: SessionRegistry::new(),
            store: RwLock::new(None),
            degraded: degraded_tx,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn PokerStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn PokerStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn PokerStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    pub fn channels(&self) -> &RoomChannels {
        &self.channels
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Run `work` serialized with every other action on the same room.
    pub async fn run_in_room<Fut, T>(&self, room_id: &str, work: Fut) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.gates.run(room_id, work).await
    }

    #[cfg(test)]
    pub(crate) fn gates(&self) -> &RoomGates {
        &self.gates
    }

    /// Release the per-room resources of a deleted room.
    pub fn forget_room(&self, room_id: &str) {
        self.channels.close(room_id);
        self.gates.forget(room_id);
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::poker_store::memory::MemoryPokerStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));

        state.install_store(Arc::new(MemoryPokerStore::default())).await;
        assert!(!state.is_degraded());

        state.clear_store().await;
        assert!(state.is_degraded());
        assert!(state.store().await.is_none());
    }
}

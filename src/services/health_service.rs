use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the installed store and report whether the service runs degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(backend = err.backend(), error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    let sessions = state.sessions().len();
    if state.is_degraded() {
        HealthResponse::degraded(sessions)
    } else {
        HealthResponse::ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::poker_store::memory::MemoryPokerStore,
        state::{AppState, Session},
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        state.install_store(Arc::new(MemoryPokerStore::default())).await;
        state.sessions().register(
            uuid::Uuid::new_v4(),
            Session {
                room_id: "ABCD1234".into(),
                user_id: "u1".into(),
            },
        );

        let status = health_status(&state).await;
        assert_eq!(status.status, "ok");
        assert_eq!(status.sessions, 1);
    }
}

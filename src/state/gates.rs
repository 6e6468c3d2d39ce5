use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{sync::Mutex, time::timeout};
use tracing::warn;

use crate::error::ServiceError;

/// Per-room async mutexes serializing the actions of a room on this node.
pub struct RoomGates {
    gates: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl RoomGates {
    pub fn new(timeout: Duration) -> Self {
        Self {
            gates: DashMap::new(),
            timeout,
        }
    }

    /// Run `work` while holding the room's gate.
    ///
    /// Only acquiring the gate is bounded: once `work` starts it runs to completion, so a
    /// timeout never leaves a half-applied action behind. The gate is dropped from the map
    /// once nobody holds or awaits it, so unknown room ids leave nothing behind.
    pub async fn run<Fut, T>(&self, room_id: &str, work: Fut) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.gate(room_id);
        let result = match timeout(self.timeout, gate.lock()).await {
            Ok(_guard) => work.await,
            Err(_) => {
                warn!(room_id, "timed out waiting for room gate");
                Err(ServiceError::Timeout)
            }
        };

        drop(gate);
        self.forget(room_id);
        result
    }

    /// Drop the gate of a room unless someone is still holding or waiting on it.
    pub fn forget(&self, room_id: &str) {
        self.gates
            .remove_if(room_id, |_, gate| Arc::strong_count(gate) == 1);
    }

    fn gate(&self, room_id: &str) -> Arc<Mutex<()>> {
        self.gates
            .entry(room_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of rooms with an action in flight.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.gates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waiting_past_the_timeout_fails_without_running() {
        let gates = Arc::new(RoomGates::new(Duration::from_millis(20)));
        let holder = gates.gate("AAAA1111");
        let _held = holder.lock().await;

        let mut ran = false;
        let result = gates
            .run("AAAA1111", async {
                ran = true;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Timeout)));
        assert!(!ran);
    }

    #[tokio::test]
    async fn other_rooms_are_not_blocked() {
        let gates = RoomGates::new(Duration::from_millis(20));
        let holder = gates.gate("AAAA1111");
        let _held = holder.lock().await;

        let value = gates.run("BBBB2222", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn finished_actions_release_their_gate() {
        let gates = RoomGates::new(Duration::from_millis(20));

        for i in 0..50 {
            let room = format!("NOROOM{i}");
            let result: Result<(), ServiceError> = gates
                .run(&room, async {
                    Err(crate::error::ActionRejection::RoomNotFound(room.clone()).into())
                })
                .await;
            assert!(result.is_err());
        }
        gates.run("AAAA1111", async { Ok(()) }).await.unwrap();

        assert_eq!(gates.len(), 0);
    }

    #[tokio::test]
    async fn waiting_actions_keep_the_gate() {
        let gates = Arc::new(RoomGates::new(Duration::from_secs(1)));
        let holder = gates.gate("AAAA1111");
        let held = holder.lock().await;

        let waiting = {
            let gates = gates.clone();
            tokio::spawn(async move { gates.run("AAAA1111", async { Ok(1) }).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(gates.len(), 1);

        drop(held);
        drop(holder);
        assert_eq!(waiting.await.unwrap().unwrap(), 1);
        assert_eq!(gates.len(), 0);
    }

    #[tokio::test]
    async fn forget_keeps_gates_in_use() {
        let gates = RoomGates::new(Duration::from_millis(20));
        let holder = gates.gate("AAAA1111");

        gates.forget("AAAA1111");
        assert_eq!(gates.len(), 1);

        drop(holder);
        gates.forget("AAAA1111");
        assert_eq!(gates.len(), 0);
    }
}

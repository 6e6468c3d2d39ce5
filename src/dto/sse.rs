use std::sync::Arc;

use serde::Serialize;

#[derive(Clone, Debug)]
/// Dispatched payload carried across the per-room channels.
///
/// `data` is serialized once and shared by every subscriber of the room.
pub struct ServerEvent {
    pub event: &'static str,
    pub data: Arc<str>,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &'static str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event,
            data: serde_json::to_string(payload)?.into(),
        })
    }

    /// WebSocket text frame: `{"event": <name>, "data": <payload>}`.
    pub fn to_ws_frame(&self) -> String {
        format!(r#"{{"event":"{}","data":{}}}"#, self.event, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_frame_wraps_the_payload() {
        let event = ServerEvent::json("state_update", &serde_json::json!({"votes": []})).unwrap();
        let frame: serde_json::Value = serde_json::from_str(&event.to_ws_frame()).unwrap();

        assert_eq!(frame["event"], "state_update");
        assert_eq!(frame["data"]["votes"], serde_json::json!([]));
    }
}

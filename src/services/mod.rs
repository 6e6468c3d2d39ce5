/// Fan-out of room snapshots to subscribed clients.
pub mod broadcast;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room, task and vote actions.
pub mod room_service;
/// Room snapshot assembly and vote masking.
pub mod room_state;
/// Server-Sent Events streaming of room snapshots.
pub mod sse_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;

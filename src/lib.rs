//! Library crate for planning-poker-back: rooms, tasks and card votes kept in sync
//! across HTTP, Server-Sent Events and WebSocket clients.

/// Runtime configuration.
pub mod config;
/// Persistence layer and storage backends.
pub mod dao;
/// Wire payloads shared by every transport.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Room actions, broadcasting and connection handling.
pub mod services;
/// Shared application state.
pub mod state;

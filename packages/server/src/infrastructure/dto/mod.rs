//! Data Transfer Objects (DTOs) for the coordinator.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket message DTOs (inbound parsing, outbound events)
//! - `http`: HTTP query surface DTOs (room snapshots)

pub mod conversion;
pub mod http;
pub mod websocket;

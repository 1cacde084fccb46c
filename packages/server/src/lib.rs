//! Real-time room coordinator.
//!
//! Serves two kinds of rooms over WebSocket: collaborative circuit editing
//! (`DocumentRoom`) and timed competitive challenges (`ChallengeRoom`).
//! Each room runs as its own actor; rooms share no mutable state.

// layers
pub mod domain;
pub mod infrastructure;
pub mod runtime;
pub mod ui;
pub mod usecase;

pub mod config;

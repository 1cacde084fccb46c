//! Utilities shared by the voltroom packages.

pub mod logger;
pub mod time;

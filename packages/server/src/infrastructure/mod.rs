//! Infrastructure 層
//!
//! ドメイン層のインターフェースの具体的な実装（WebSocket への送信）と、
//! 通信プロトコルの DTO を提供します。

pub mod dto;
pub mod message_pusher;

//! UseCase 層
//!
//! ルームの振る舞い（共同編集ルームとチャレンジルーム）を実装します。
//! 各ルームはアクターの単一の実行コンテキストからのみ呼び出されます。

pub mod challenge_room;
pub mod document_room;
pub mod room;

pub use challenge_room::ChallengeRoom;
pub use document_room::DocumentRoom;
pub use room::RoomBehavior;

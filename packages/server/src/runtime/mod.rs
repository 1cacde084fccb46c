//! Room runtime: actors, their directory and timers.

pub mod actor;
pub mod directory;
pub mod messages;
pub mod scheduler;

pub use actor::{RoomActor, RoomHandle};
pub use directory::{RoomDirectory, RoomFactory};
pub use messages::{JoinRequest, RoomCommand, TimerEvent};
pub use scheduler::{Scheduler, TimerToken};

//! Room key → actor handle, with at most one live actor per key.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{
    actor::{RoomActor, RoomHandle},
    messages::JoinRequest,
    scheduler::Scheduler,
};
use crate::{
    config::RuntimeSettings,
    domain::{RoomError, RoomKey},
    usecase::RoomBehavior,
};

/// Builds the state of a freshly spawned room.
pub type RoomFactory<B> = Arc<dyn Fn(RoomKey, Scheduler) -> B + Send + Sync>;

/// All resident rooms of one kind.
pub struct RoomDirectory<B> {
    rooms: Mutex<HashMap<RoomKey, RoomHandle>>,
    factory: RoomFactory<B>,
    settings: RuntimeSettings,
    cancel_token: CancellationToken,
}

impl<B: RoomBehavior> RoomDirectory<B> {
    pub fn new(
        factory: RoomFactory<B>,
        settings: RuntimeSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            factory,
            settings,
            cancel_token,
        }
    }

    /// Live handle for `key`, spawning the room if it is absent or has closed.
    ///
    /// The lock is held across the spawn so two first connections to the
    /// same key always land in the same actor.
    pub async fn handle_for(&self, key: &RoomKey) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        rooms.retain(|_, handle| !handle.is_closed());

        if let Some(handle) = rooms.get(key) {
            return handle.clone();
        }

        let (handle, _task) = RoomActor::spawn(
            key.clone(),
            &self.factory,
            self.cancel_token.child_token(),
            self.settings.clone(),
        );
        tracing::debug!(room_key = %key, kind = ?B::KIND, "Spawned room actor");
        rooms.insert(key.clone(), handle.clone());
        handle
    }

    /// Live handle for `key` without creating a room.
    pub async fn get(&self, key: &RoomKey) -> Option<RoomHandle> {
        let rooms = self.rooms.lock().await;
        rooms.get(key).filter(|handle| !handle.is_closed()).cloned()
    }

    /// Join `key`, retrying once if the room closed itself in the meantime.
    pub async fn join(&self, key: &RoomKey, request: JoinRequest) -> Result<RoomHandle, RoomError> {
        let handle = self.handle_for(key).await;
        match handle.join(request.clone()).await {
            Ok(()) => Ok(handle),
            Err(RoomError::RoomClosed) => {
                tracing::debug!(room_key = %key, "Room closed during join, retrying");
                let handle = self.handle_for(key).await;
                handle.join(request).await?;
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    /// Keys of the rooms whose actors are still running, sorted.
    pub async fn keys(&self) -> Vec<RoomKey> {
        let rooms = self.rooms.lock().await;
        let mut keys: Vec<RoomKey> = rooms
            .iter()
            .filter(|(_, handle)| !handle.is_closed())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Stop every room of this directory.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

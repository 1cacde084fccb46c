//! Live participant set of a single room.
//!
//! The registry only tracks membership. It never notifies anyone; the room
//! decides which payload to broadcast after a join or a leave.

use std::collections::HashMap;

use super::{error::RoomError, participant::Participant, value_object::ConnectionId};

/// Insertion-ordered participant map keyed by connection handle.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry<S> {
    participants: Vec<Participant<S>>,
    index: HashMap<ConnectionId, usize>,
    capacity: Option<usize>,
}

impl<S> ConnectionRegistry<S> {
    /// Registry without a participant limit (document rooms).
    pub fn unbounded() -> Self {
        Self {
            participants: Vec::new(),
            index: HashMap::new(),
            capacity: None,
        }
    }

    /// Registry that admits at most `capacity` participants (challenge rooms).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            participants: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Whether another participant would be rejected.
    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.participants.len() >= capacity)
    }

    /// Insert a participant.
    ///
    /// # Errors
    ///
    /// * `RoomError::RoomFull` - the registry is at capacity
    /// * `RoomError::Internal` - the handle is already registered
    pub fn join(&mut self, participant: Participant<S>) -> Result<&Participant<S>, RoomError> {
        if let Some(capacity) = self.capacity.filter(|_| self.is_full()) {
            return Err(RoomError::RoomFull { capacity });
        }
        if self.index.contains_key(&participant.handle) {
            return Err(RoomError::Internal(format!(
                "connection {} is already registered",
                participant.handle
            )));
        }

        let position = self.participants.len();
        self.index.insert(participant.handle, position);
        self.participants.push(participant);
        Ok(&self.participants[position])
    }

    /// Remove and return the participant for `handle`.
    ///
    /// Unknown handles are a no-op and return `None`.
    pub fn leave(&mut self, handle: &ConnectionId) -> Option<Participant<S>> {
        let position = self.index.remove(handle)?;
        let removed = self.participants.remove(position);
        for (offset, participant) in self.participants[position..].iter().enumerate() {
            self.index.insert(participant.handle, position + offset);
        }
        Some(removed)
    }

    pub fn get(&self, handle: &ConnectionId) -> Option<&Participant<S>> {
        self.index
            .get(handle)
            .and_then(|&position| self.participants.get(position))
    }

    pub fn get_mut(&mut self, handle: &ConnectionId) -> Option<&mut Participant<S>> {
        match self.index.get(handle) {
            Some(&position) => self.participants.get_mut(position),
            None => None,
        }
    }

    /// Participants in join order.
    pub fn list(&self) -> &[Participant<S>] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

//! Repository trait definitions.
//!
//! The domain layer owns the contract; `infrastructure::repository` provides
//! the implementation (dependency inversion).

use super::{
    entity::Session,
    error::RegistryError,
    value_object::{ConnectionId, RoomId},
};

/// Connection registry: every live session keyed by connection id.
///
/// Room membership is not stored separately; it is the set of sessions
/// whose `current_room` equals the room id, so it can never go stale.
/// Implementations are plain synchronous maps. Callers serialize access
/// (see `usecase::EventRouter`).
pub trait SessionRepository: Send {
    /// Insert a freshly connected session.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AlreadyRegistered` if the connection id is taken.
    fn register(&mut self, session: Session) -> Result<(), RegistryError>;

    fn get(&self, id: &ConnectionId) -> Option<&Session>;

    fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Session>;

    /// O(n) scan over live sessions.
    fn find_by_external_user_id(&self, user_id: &str) -> Option<&Session>;

    /// Remove a session. Returns the removed session, if any.
    fn unregister(&mut self, id: &ConnectionId) -> Option<Session>;

    /// Sessions currently in `room_id`, ordered by connection time.
    fn members_of(&self, room_id: &RoomId) -> Vec<&Session>;

    /// All live sessions, ordered by connection time.
    fn all(&self) -> Vec<&Session>;

    /// Rooms with at least one member and their member counts, ordered by room id.
    fn rooms(&self) -> Vec<(RoomId, usize)>;

    fn count(&self) -> usize;

    /// Resolve a user reference: external user id first, then connection id.
    fn resolve(&self, user_ref: &str) -> Option<&Session> {
        self.find_by_external_user_id(user_ref).or_else(|| {
            ConnectionId::new(user_ref.to_string())
                .ok()
                .and_then(|id| self.get(&id))
        })
    }
}

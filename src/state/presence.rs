//! In-memory registry of live realtime sessions, one per connected user.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Live session metadata for a single connected user.
#[derive(Clone)]
pub struct SessionEntry {
    /// Authenticated user id for this connection.
    pub user_id: Uuid,
    /// Current partner, if the user is paired. Mutable while the session is
    /// live so pairing changes apply without a reconnect.
    pub partner_id: Option<Uuid>,
    /// Display name captured at authentication time.
    pub display_name: String,
    /// Outbound sender feeding the connection's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Process-wide table mapping a connected user to connection metadata.
///
/// Policy: at most one live connection per user id. Registering a user who is
/// already present silently replaces the prior entry (last connection wins).
#[derive(Default)]
pub struct PresenceRegistry {
    sessions: DashMap<Uuid, SessionEntry>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing any prior entry for the same user.
    pub fn register(
        &self,
        user_id: Uuid,
        partner_id: Option<Uuid>,
        display_name: String,
        tx: mpsc::UnboundedSender<Message>,
    ) {
        self.sessions.insert(
            user_id,
            SessionEntry {
                user_id,
                partner_id,
                display_name,
                tx,
            },
        );
    }

    /// Remove the session for `user_id`, if any. Called on disconnect.
    pub fn unregister(&self, user_id: Uuid) {
        self.sessions.remove(&user_id);
    }

    /// Whether the user currently has a live connection.
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.sessions.contains_key(&user_id)
    }

    /// Point a live session at a new partner (or clear it on unpairing).
    /// No-op when the user is not connected.
    pub fn update_partner(&self, user_id: Uuid, new_partner_id: Option<Uuid>) {
        if let Some(mut entry) = self.sessions.get_mut(&user_id) {
            entry.partner_id = new_partner_id;
        }
    }

    /// Snapshot the session entry for a connected user.
    pub fn get(&self, user_id: Uuid) -> Option<SessionEntry> {
        self.sessions.get(&user_id).map(|entry| entry.clone())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no users are connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> mpsc::UnboundedSender<Message> {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn register_then_unregister_round_trip() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();

        assert!(!registry.is_online(user));
        registry.register(user, None, "Ann".into(), sender());
        assert!(registry.is_online(user));

        registry.unregister(user);
        assert!(!registry.is_online(user));
    }

    #[test]
    fn re_register_replaces_prior_entry() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let first_partner = Uuid::new_v4();
        let second_partner = Uuid::new_v4();

        registry.register(user, Some(first_partner), "Ann".into(), sender());
        registry.register(user, Some(second_partner), "Ann".into(), sender());

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(user).and_then(|entry| entry.partner_id),
            Some(second_partner)
        );
    }

    #[test]
    fn update_partner_applies_to_live_session() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let partner = Uuid::new_v4();

        registry.register(user, Some(partner), "Ann".into(), sender());
        registry.update_partner(user, None);
        assert_eq!(registry.get(user).and_then(|entry| entry.partner_id), None);

        // Unknown users are ignored rather than inserted.
        registry.update_partner(Uuid::new_v4(), Some(partner));
        assert_eq!(registry.len(), 1);
    }
}

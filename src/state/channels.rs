//! Broadcast channels keyed by string id with per-user membership tracking.

use std::collections::HashMap;

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Deterministic key for an unordered pair of users: the two ids sorted and
/// joined. Identical regardless of which partner computes it.
pub fn couple_key(user_id: Uuid, partner_id: Uuid) -> String {
    let (low, high) = if user_id < partner_id {
        (user_id, partner_id)
    } else {
        (partner_id, user_id)
    };
    format!("{low}_{high}")
}

/// Deterministic couple channel id for two partnered users.
///
/// Order-independent: both partners derive the same channel regardless of
/// argument order. Returns `None` when the user has no partner.
pub fn couple_channel_for(user_id: Uuid, partner_id: Option<Uuid>) -> Option<String> {
    let partner_id = partner_id?;
    Some(format!("couple:{}", couple_key(user_id, partner_id)))
}

/// Channel id scoping events to a single TicTacToe game.
pub fn tictactoe_channel(game_id: Uuid) -> String {
    format!("tictactoe:{game_id}")
}

/// Channel id scoping events to a single Wordle game.
pub fn wordle_channel(game_id: Uuid) -> String {
    format!("wordle:{game_id}")
}

/// Channel id scoping events to a single chat thread.
pub fn chat_channel(thread_id: Uuid) -> String {
    format!("chat:{thread_id}")
}

/// Registry of broadcast channels. Membership is tracked per user id, so
/// "is this user in the room" is an exact lookup rather than a socket count.
#[derive(Default)]
pub struct ChannelHub {
    channels: DashMap<String, HashMap<Uuid, mpsc::UnboundedSender<Message>>>,
}

impl ChannelHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `user_id` to a channel. A user joining twice keeps a single
    /// membership entry, updated to the most recent sender.
    pub fn join(&self, channel_id: &str, user_id: Uuid, tx: mpsc::UnboundedSender<Message>) {
        self.channels
            .entry(channel_id.to_owned())
            .or_default()
            .insert(user_id, tx);
    }

    /// Remove `user_id` from a channel, dropping the channel once empty.
    pub fn leave(&self, channel_id: &str, user_id: Uuid) {
        if let Some(mut members) = self.channels.get_mut(channel_id) {
            members.remove(&user_id);
            if members.is_empty() {
                drop(members);
                self.channels
                    .remove_if(channel_id, |_, members| members.is_empty());
            }
        }
    }

    /// Remove `user_id` from every channel. Called on disconnect.
    pub fn leave_all(&self, user_id: Uuid) {
        let mut emptied = Vec::new();
        for mut entry in self.channels.iter_mut() {
            entry.value_mut().remove(&user_id);
            if entry.value().is_empty() {
                emptied.push(entry.key().clone());
            }
        }
        for channel_id in emptied {
            self.channels
                .remove_if(&channel_id, |_, members| members.is_empty());
        }
    }

    /// Whether `user_id` is currently joined to the channel.
    pub fn contains_user(&self, channel_id: &str, user_id: Uuid) -> bool {
        self.channels
            .get(channel_id)
            .is_some_and(|members| members.contains_key(&user_id))
    }

    /// Number of users joined to the channel.
    pub fn member_count(&self, channel_id: &str) -> usize {
        self.channels
            .get(channel_id)
            .map_or(0, |members| members.len())
    }

    /// Serialize `payload` once and fan it out to every channel member,
    /// optionally excluding one user (typically the sender).
    pub fn emit_to_channel<T>(&self, channel_id: &str, payload: &T, exclude: Option<Uuid>)
    where
        T: ?Sized + Serialize,
    {
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "failed to serialize channel payload");
                return;
            }
        };

        let Some(members) = self.channels.get(channel_id) else {
            return;
        };

        for (member_id, tx) in members.iter() {
            if exclude == Some(*member_id) {
                continue;
            }
            // A closed writer means the connection is going away; disconnect
            // cleanup will prune the membership.
            let _ = tx.send(Message::Text(text.clone().into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Ping {
        value: u32,
    }

    fn sender() -> (
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn couple_channel_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(couple_channel_for(a, Some(b)), couple_channel_for(b, Some(a)));
        assert!(couple_channel_for(a, Some(b)).unwrap().starts_with("couple:"));
    }

    #[test]
    fn couple_channel_absent_without_partner() {
        assert_eq!(couple_channel_for(Uuid::new_v4(), None), None);
    }

    #[test]
    fn join_tracks_membership_by_user_id() {
        let hub = ChannelHub::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = sender();

        hub.join("chat:x", user, tx.clone());
        hub.join("chat:x", user, tx);
        assert_eq!(hub.member_count("chat:x"), 1);
        assert!(hub.contains_user("chat:x", user));

        hub.leave("chat:x", user);
        assert!(!hub.contains_user("chat:x", user));
        assert_eq!(hub.member_count("chat:x"), 0);
    }

    #[test]
    fn emit_skips_excluded_sender() {
        let hub = ChannelHub::new();
        let sender_id = Uuid::new_v4();
        let receiver_id = Uuid::new_v4();
        let (sender_tx, mut sender_rx) = sender();
        let (receiver_tx, mut receiver_rx) = sender();

        hub.join("chat:x", sender_id, sender_tx);
        hub.join("chat:x", receiver_id, receiver_tx);

        hub.emit_to_channel("chat:x", &Ping { value: 7 }, Some(sender_id));

        assert!(receiver_rx.try_recv().is_ok());
        assert!(sender_rx.try_recv().is_err());
    }

    #[test]
    fn leave_all_clears_every_channel() {
        let hub = ChannelHub::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = sender();

        hub.join("chat:x", user, tx.clone());
        hub.join("couple:a_b", user, tx);
        hub.leave_all(user);

        assert_eq!(hub.member_count("chat:x"), 0);
        assert_eq!(hub.member_count("couple:a_b"), 0);
    }
}

use super::{clean_text, AppState, Room, SharedRoom};
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::AbortHandle;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Room codes are typed by people; accept them in any case
fn normalize_code(room_id: &str) -> String {
    room_id.trim().to_ascii_uppercase()
}

/// Friendly name for a player who has not picked one
pub(super) fn default_display_name() -> String {
    petname::petname(2, " ")
        .map(|name| {
            name.split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" ")
        })
        .unwrap_or_else(|| "Player".to_string())
}

impl AppState {
    /// Create a room with `identity` as creator and only member
    pub async fn create_room(
        &self,
        identity: &str,
        display_name: &str,
    ) -> (RoomId, broadcast::Receiver<ServerMessage>) {
        let mut rooms = self.rooms.write().await;

        // Generate a unique code (check for collisions)
        let room_id = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let name = match clean_text(display_name, self.config.max_name_chars) {
            name if name.is_empty() => format!("Room {}", room_id),
            name => name,
        };
        let creator = Player::human(identity.to_string(), default_display_name());
        let options = RoomOptions {
            total_rounds: self.config.default_total_rounds,
            enabled_content_types: self.config.default_content_types.clone(),
        };

        let room = Room::new(room_id.clone(), name, creator, options);
        let events = room.subscribe();
        room.broadcast(room.roster_update());

        tracing::info!("Room {} created by {}", room_id, identity);
        rooms.insert(room_id.clone(), Arc::new(Mutex::new(room)));

        (room_id, events)
    }

    pub async fn get_room(&self, room_id: &str) -> Option<SharedRoom> {
        self.rooms
            .read()
            .await
            .get(&normalize_code(room_id))
            .cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn room_summary(&self, room_id: &str) -> Option<RoomSummary> {
        let shared = self.get_room(room_id).await?;
        let room = shared.lock().await;
        (!room.closed).then(|| room.summary())
    }

    /// Drop a closed room from the registry, then stop its tasks.
    ///
    /// Must be called without the room lock held. The calling task may be
    /// one of `tasks`; aborting is the last thing done here.
    pub(super) async fn destroy_room(&self, room_id: &str, tasks: Vec<AbortHandle>) {
        let removed = self.rooms.write().await.remove(room_id).is_some();
        if removed {
            tracing::info!("Room {} destroyed", room_id);
        }
        for handle in tasks {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_codes_use_safe_alphabet() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[test]
    fn test_default_display_name_is_capitalized() {
        let name = default_display_name();
        assert!(!name.is_empty());
        assert!(name
            .split(' ')
            .all(|word| word.chars().next().is_some_and(|c| !c.is_lowercase())));
    }

    #[tokio::test]
    async fn test_create_and_lookup_room() {
        let state = AppState::default();
        let (room_id, mut events) = state.create_room("alice", "  Friday Night ").await;

        assert_eq!(state.room_count().await, 1);
        let summary = state.room_summary(&room_id.to_lowercase()).await.unwrap();
        assert_eq!(summary.name, "Friday Night");
        assert_eq!(summary.creator, "alice");
        assert_eq!(summary.phase, Phase::Lobby);
        assert_eq!(summary.roster.len(), 1);
        assert_eq!(summary.options.total_rounds, state.config.default_total_rounds);

        assert!(matches!(
            events.recv().await.unwrap(),
            ServerMessage::PlayerUpdate { .. }
        ));
    }

    #[tokio::test]
    async fn test_blank_room_name_gets_code() {
        let state = AppState::default();
        let (room_id, _events) = state.create_room("alice", "   ").await;
        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.name, format!("Room {}", room_id));
    }

    #[tokio::test]
    async fn test_out_of_range_default_rounds_are_clamped() {
        let state = AppState::new(
            std::sync::Arc::new(crate::content::StaticContentProvider),
            crate::config::GameConfig {
                default_total_rounds: 0,
                ..Default::default()
            },
        );
        let (room_id, _events) = state.create_room("alice", "Test").await;
        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.options.total_rounds, 1);
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let state = AppState::default();
        assert!(state.get_room("NOPE1").await.is_none());
        assert!(state.room_summary("NOPE1").await.is_none());
    }

    #[tokio::test]
    async fn test_destroy_room() {
        let state = AppState::default();
        let (room_id, _events) = state.create_room("alice", "Test").await;
        let task = tokio::spawn(std::future::pending::<()>());

        state.destroy_room(&room_id, vec![task.abort_handle()]).await;
        assert_eq!(state.room_count().await, 0);
        assert!(task.await.unwrap_err().is_cancelled());
    }
}

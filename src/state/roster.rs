use super::registry::default_display_name;
use super::{clean_text, AppState, Room, SharedRoom};
use crate::protocol::ServerMessage;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

/// How an arriving connection maps onto the roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejoin {
    /// The returning creator takes over their old slot
    ReclaimCreator { previous: PlayerId },
    AlreadyPresent,
    Fresh,
}

/// Decide how `identity` joins, given the identity it had before.
///
/// Only the current creator can be reclaimed, by strict identity match.
pub fn resolve_rejoin(room: &Room, identity: &str, previous: Option<&str>) -> Rejoin {
    if let Some(previous) = previous {
        if previous == room.creator
            && previous != identity
            && room.contains(previous)
            && !room.contains(identity)
        {
            return Rejoin::ReclaimCreator {
                previous: previous.to_string(),
            };
        }
    }

    if room.contains(identity) {
        Rejoin::AlreadyPresent
    } else {
        Rejoin::Fresh
    }
}

pub struct JoinOutcome {
    pub room_id: RoomId,
    pub room_name: String,
    pub is_creator: bool,
    pub events: broadcast::Receiver<ServerMessage>,
}

/// Result of taking someone out of a room
enum Departure {
    Stayed,
    /// The last human left; tasks to abort once the room is unregistered
    Emptied(Vec<AbortHandle>),
}

impl AppState {
    pub async fn join_room(
        &self,
        room_id: &str,
        identity: &str,
        previous_identity: Option<&str>,
    ) -> Option<JoinOutcome> {
        let shared = self.get_room(room_id).await?;
        let mut room = shared.lock().await;
        if room.closed {
            return None;
        }

        // Subscribe first so the joiner sees the updates below
        let events = room.subscribe();

        match resolve_rejoin(&room, identity, previous_identity) {
            Rejoin::ReclaimCreator { previous } => {
                room.timers.cancel_grace(&previous);
                room.rekey_player(&previous, identity);
                tracing::info!(
                    "Room {}: creator {} reconnected as {}",
                    room.id,
                    previous,
                    identity
                );
                room.broadcast(ServerMessage::CreatorUpdate {
                    creator: identity.to_string(),
                });
            }
            Rejoin::AlreadyPresent => {
                room.timers.cancel_grace(identity);
                if let Some(player) = room.player_mut(identity) {
                    player.connected = true;
                }
            }
            Rejoin::Fresh => {
                let player = Player::human(identity.to_string(), default_display_name());
                tracing::info!(
                    "Room {}: {} joined as {}",
                    room.id,
                    identity,
                    player.display_name
                );
                room.roster.push(player);
            }
        }

        room.broadcast(room.roster_update());
        room.broadcast(room.options_update());

        Some(JoinOutcome {
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            is_creator: room.is_creator(identity),
            events,
        })
    }

    pub async fn leave_room(self: &Arc<Self>, room_id: &str, identity: &str) -> Result<(), String> {
        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let mut room = shared.lock().await;
        if !room.contains(identity) {
            return Err("Not in this room".to_string());
        }

        let departure = self.depart(&shared, &mut room, identity);
        let room_id = room.id.clone();
        drop(room);

        if let Departure::Emptied(tasks) = departure {
            self.destroy_room(&room_id, tasks).await;
        }
        Ok(())
    }

    /// Connection dropped: hold the slot for the grace period, then leave
    pub async fn disconnect(self: &Arc<Self>, room_id: &str, identity: &str) {
        if self.config.reconnect_grace.is_zero() {
            let _ = self.leave_room(room_id, identity).await;
            return;
        }

        let Some(shared) = self.get_room(room_id).await else {
            return;
        };
        let mut room = shared.lock().await;
        let Some(player) = room.player_mut(identity) else {
            return;
        };
        player.connected = false;
        tracing::info!("Room {}: {} disconnected", room.id, identity);
        room.broadcast(room.roster_update());

        let state = self.clone();
        let shared_room = shared.clone();
        let player_id = identity.to_string();
        let grace = self.config.reconnect_grace;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let mut room = shared_room.lock().await;
            let abandoned = room
                .player(&player_id)
                .is_some_and(|player| !player.connected);
            if !abandoned || room.closed {
                return;
            }
            tracing::info!("Room {}: {} did not come back", room.id, player_id);

            let departure = state.depart(&shared_room, &mut room, &player_id);
            let room_id = room.id.clone();
            drop(room);

            if let Departure::Emptied(tasks) = departure {
                state.destroy_room(&room_id, tasks).await;
            }
        })
        .abort_handle();

        room.timers.track_grace(identity, handle);
    }

    /// Remove a player and repair everything that depended on them
    fn depart(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room, identity: &str) -> Departure {
        let Some(player) = room.remove_player(identity) else {
            return Departure::Stayed;
        };
        tracing::info!("Room {}: {} left", room.id, identity);

        if room.human_count() == 0 {
            room.roster.clear();
            return Departure::Emptied(room.close());
        }

        room.broadcast(ServerMessage::SystemNotice {
            text: format!("{} left the game", player.display_name),
        });

        if room.creator == identity {
            if let Some(next) = room.roster.iter().find(|p| !p.is_bot) {
                room.creator = next.id.clone();
                tracing::info!("Room {}: creator is now {}", room.id, room.creator);
                room.broadcast(ServerMessage::CreatorUpdate {
                    creator: room.creator.clone(),
                });
            }
        }
        room.broadcast(room.roster_update());

        // The remaining roster may now be complete
        match room.phase {
            Phase::Submitting => self.check_submission_quorum(shared, room),
            Phase::Voting => self.check_vote_quorum(shared, room),
            _ => {}
        }
        Departure::Stayed
    }

    pub async fn set_display_name(
        &self,
        room_id: &str,
        identity: &str,
        name: &str,
    ) -> Result<(), String> {
        let name = clean_text(name, self.config.max_name_chars);
        if name.is_empty() {
            return Err("Display name cannot be empty".to_string());
        }

        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let mut room = shared.lock().await;
        let player = room.player_mut(identity).ok_or("Not in this room")?;
        player.display_name = name;
        room.broadcast(room.roster_update());
        Ok(())
    }

    pub async fn set_room_options(
        &self,
        room_id: &str,
        identity: &str,
        total_rounds: u32,
        enabled_content_types: Vec<ContentType>,
    ) -> Result<(), String> {
        if !(1..=self.config.max_total_rounds).contains(&total_rounds) {
            return Err(format!(
                "Total rounds must be between 1 and {}",
                self.config.max_total_rounds
            ));
        }
        let mut types: Vec<ContentType> = Vec::new();
        for content_type in enabled_content_types {
            if !types.contains(&content_type) {
                types.push(content_type);
            }
        }
        if types.is_empty() {
            return Err("At least one content type is required".to_string());
        }

        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let mut room = shared.lock().await;
        if !room.is_creator(identity) {
            return Err("Only the creator can change options".to_string());
        }
        if room.phase != Phase::Lobby {
            return Err("Options can only change in the lobby".to_string());
        }

        room.options = RoomOptions {
            total_rounds,
            enabled_content_types: types,
        };
        room.broadcast(room.options_update());
        Ok(())
    }

    /// Back to the lobby from any phase; resetting twice equals resetting once
    pub async fn reset_game(&self, room_id: &str, identity: &str) -> Result<(), String> {
        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let mut room = shared.lock().await;
        if !room.is_creator(identity) {
            return Err("Only the creator can reset".to_string());
        }

        room.reset_to_lobby();
        tracing::info!("Room {}: game reset", room.id);
        room.broadcast(ServerMessage::GameReset);
        room.broadcast(room.roster_update());
        Ok(())
    }

    pub async fn send_chat(&self, room_id: &str, identity: &str, text: &str) -> Result<(), String> {
        let text = clean_text(text, self.config.max_chat_chars);
        if text.is_empty() {
            return Err("Empty chat message".to_string());
        }

        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let room = shared.lock().await;
        let sender = room.player(identity).ok_or("Not in this room")?;
        room.broadcast(ServerMessage::ChatMessage {
            sender_identity: sender.id.clone(),
            sender_name: sender.display_name.clone(),
            text,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn room_of(ids: &[&str]) -> Room {
        let mut room = Room::new(
            "ROOM1".to_string(),
            "Test".to_string(),
            Player::human(ids[0].to_string(), ids[0].to_uppercase()),
            RoomOptions {
                total_rounds: 3,
                enabled_content_types: vec![ContentType::Acronym],
            },
        );
        for id in &ids[1..] {
            room.roster
                .push(Player::human(id.to_string(), id.to_uppercase()));
        }
        room
    }

    #[test]
    fn test_resolver_reclaims_creator_slot() {
        let room = room_of(&["c1", "p2"]);
        assert_eq!(
            resolve_rejoin(&room, "c2", Some("c1")),
            Rejoin::ReclaimCreator {
                previous: "c1".to_string()
            }
        );
    }

    #[test]
    fn test_resolver_ignores_non_creator_previous_identity() {
        let room = room_of(&["c1", "p2"]);
        assert_eq!(resolve_rejoin(&room, "p3", Some("p2")), Rejoin::Fresh);
        assert_eq!(resolve_rejoin(&room, "p3", Some("C1")), Rejoin::Fresh);
        assert_eq!(resolve_rejoin(&room, "p3", None), Rejoin::Fresh);
    }

    #[test]
    fn test_resolver_same_identity_is_present() {
        let room = room_of(&["c1", "p2"]);
        assert_eq!(resolve_rejoin(&room, "c1", Some("c1")), Rejoin::AlreadyPresent);
        assert_eq!(resolve_rejoin(&room, "p2", Some("c1")), Rejoin::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_join_and_rename() {
        let state = Arc::new(AppState::default());
        let (room_id, _events) = state.create_room("alice", "Test").await;

        let outcome = state.join_room(&room_id, "bob", None).await.unwrap();
        assert!(!outcome.is_creator);
        assert_eq!(outcome.room_id, room_id);

        // Joining twice never duplicates the player
        state.join_room(&room_id, "bob", None).await.unwrap();
        state.set_display_name(&room_id, "bob", "  Bobby  ").await.unwrap();
        assert!(state.set_display_name(&room_id, "bob", "   ").await.is_err());
        assert!(state.set_display_name(&room_id, "zed", "Zed").await.is_err());

        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.roster.len(), 2);
        assert_eq!(summary.roster[1].display_name, "Bobby");
    }

    #[tokio::test]
    async fn test_room_options_rules() {
        let state = Arc::new(AppState::default());
        let (room_id, _events) = state.create_room("alice", "Test").await;
        state.join_room(&room_id, "bob", None).await.unwrap();

        let all = vec![ContentType::Date, ContentType::Movie, ContentType::Date];
        assert!(state
            .set_room_options(&room_id, "bob", 5, all.clone())
            .await
            .is_err());
        assert!(state
            .set_room_options(&room_id, "alice", 0, all.clone())
            .await
            .is_err());
        assert!(state
            .set_room_options(&room_id, "alice", 5, Vec::new())
            .await
            .is_err());
        state
            .set_room_options(&room_id, "alice", 5, all)
            .await
            .unwrap();

        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.options.total_rounds, 5);
        assert_eq!(
            summary.options.enabled_content_types,
            vec![ContentType::Date, ContentType::Movie]
        );
    }

    #[tokio::test]
    async fn test_creator_leaving_passes_the_role_on() {
        let state = Arc::new(AppState::default());
        let (room_id, _events) = state.create_room("alice", "Test").await;
        let mut bob = state.join_room(&room_id, "bob", None).await.unwrap().events;
        state.join_room(&room_id, "carol", None).await.unwrap();

        state.leave_room(&room_id, "alice").await.unwrap();

        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.creator, "bob");
        assert_eq!(summary.roster.len(), 2);

        let mut saw_update = false;
        while let Ok(msg) = bob.try_recv() {
            if msg == (ServerMessage::CreatorUpdate { creator: "bob".to_string() }) {
                saw_update = true;
            }
        }
        assert!(saw_update);
    }

    #[tokio::test]
    async fn test_last_human_leaving_destroys_room() {
        let state = Arc::new(AppState::default());
        let (room_id, _events) = state.create_room("alice", "Test").await;

        state.leave_room(&room_id, "alice").await.unwrap();
        assert_eq!(state.room_count().await, 0);
        assert!(state.join_room(&room_id, "bob", None).await.is_none());
    }

    #[tokio::test]
    async fn test_chat_requires_membership() {
        let state = Arc::new(AppState::default());
        let (room_id, mut events) = state.create_room("alice", "Test").await;
        let _ = events.recv().await;

        assert!(state.send_chat(&room_id, "zed", "hi").await.is_err());
        assert!(state.send_chat(&room_id, "alice", "   ").await.is_err());
        state.send_chat(&room_id, "alice", " hello ").await.unwrap();

        match events.recv().await.unwrap() {
            ServerMessage::ChatMessage {
                sender_identity,
                text,
                ..
            } => {
                assert_eq!(sender_identity, "alice");
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_holds_slot_until_grace_expires() {
        let state = Arc::new(AppState::default());
        let (room_id, _events) = state.create_room("alice", "Test").await;
        state.join_room(&room_id, "bob", None).await.unwrap();

        state.disconnect(&room_id, "bob").await;
        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.roster.len(), 2);
        assert!(!summary.roster[1].connected);

        tokio::time::sleep(state.config.reconnect_grace + std::time::Duration::from_secs(1)).await;
        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.roster.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_within_grace_keeps_slot() {
        let state = Arc::new(AppState::default());
        let (room_id, _events) = state.create_room("alice", "Test").await;
        state.join_room(&room_id, "bob", None).await.unwrap();

        state.disconnect(&room_id, "bob").await;
        state.join_room(&room_id, "bob", None).await.unwrap();

        tokio::time::sleep(state.config.reconnect_grace * 2).await;
        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.roster.len(), 2);
        assert!(summary.roster[1].connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_disconnect_restarts_grace() {
        let state = Arc::new(AppState::default());
        let (room_id, _events) = state.create_room("alice", "Test").await;
        state.join_room(&room_id, "bob", None).await.unwrap();
        let grace = state.config.reconnect_grace;

        state.disconnect(&room_id, "bob").await;
        tokio::time::sleep(grace - Duration::from_secs(5)).await;
        state.join_room(&room_id, "bob", None).await.unwrap();
        state.disconnect(&room_id, "bob").await;

        // Past the first grace period, still inside the second
        tokio::time::sleep(Duration::from_secs(6)).await;
        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.roster.len(), 2);
        assert!(!summary.roster[1].connected);

        tokio::time::sleep(grace).await;
        let summary = state.room_summary(&room_id).await.unwrap();
        assert_eq!(summary.roster.len(), 1);
    }
}

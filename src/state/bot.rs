use super::{AppState, Room};
use crate::protocol::{ServerMessage, SubmissionEntry};
use crate::types::*;

const BOT_NAMES: &[&str] = &[
    "Botticelli",
    "Robo Ross",
    "Chatty Cathy",
    "Sir Beeps-a-Lot",
    "Ada Bytelace",
    "Gizmo",
    "Turing Tess",
    "Pixel Pete",
];

/// First pool name nobody in the room is using
fn next_bot_name(room: &Room) -> String {
    let taken = |name: &str| room.roster.iter().any(|p| p.display_name == name);

    if let Some(name) = BOT_NAMES.iter().find(|name| !taken(**name)) {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("Bot {}", n))
        .find(|name| !taken(name.as_str()))
        .unwrap_or_else(|| "Bot".to_string())
}

/// Submissions a bot may vote for: every one but its own
pub(super) fn vote_candidates(room: &Room, bot: &str) -> Vec<SubmissionEntry> {
    room.submission_entries()
        .into_iter()
        .filter(|entry| entry.identity != bot)
        .collect()
}

impl AppState {
    /// Top up the roster with bots until it reaches the minimum player count
    pub(super) fn fill_with_bots(&self, room: &mut Room) -> usize {
        let mut added = 0;
        while room.roster.len() < self.config.min_players {
            let name = next_bot_name(room);
            let bot = Player::bot(format!("bot-{}", ulid::Ulid::new()), name.clone());
            tracing::info!("Room {}: adding bot {} ({})", room.id, name, bot.id);
            room.roster.push(bot);
            room.broadcast(ServerMessage::SystemNotice {
                text: format!("{} joined the game", name),
            });
            added += 1;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn room_with(humans: usize) -> Room {
        let mut room = Room::new(
            "ROOM1".to_string(),
            "Test".to_string(),
            Player::human("h0".to_string(), "Human 0".to_string()),
            RoomOptions {
                total_rounds: 3,
                enabled_content_types: vec![ContentType::Acronym],
            },
        );
        for i in 1..humans {
            room.roster
                .push(Player::human(format!("h{}", i), format!("Human {}", i)));
        }
        room
    }

    #[test]
    fn test_fill_reaches_minimum() {
        let state = AppState::default();
        let mut room = room_with(3);
        assert_eq!(state.fill_with_bots(&mut room), 1);
        assert_eq!(room.roster.len(), 4);
        assert_eq!(room.roster.iter().filter(|p| p.is_bot).count(), 1);
        assert!(room.roster[3].id.starts_with("bot-"));
    }

    #[test]
    fn test_fill_is_noop_when_full() {
        let state = AppState::default();
        let mut room = room_with(5);
        assert_eq!(state.fill_with_bots(&mut room), 0);
        assert_eq!(room.roster.len(), 5);
    }

    #[test]
    fn test_bot_names_are_unique() {
        let state = AppState::new(
            std::sync::Arc::new(crate::content::StaticContentProvider),
            GameConfig {
                min_players: BOT_NAMES.len() + 3,
                ..GameConfig::default()
            },
        );
        let mut room = room_with(1);
        state.fill_with_bots(&mut room);

        let mut names: Vec<_> = room.roster.iter().map(|p| p.display_name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), room.roster.len());
        assert!(names.contains(&"Bot 1".to_string()));
    }

    #[test]
    fn test_vote_candidates_skip_only_own() {
        let mut room = room_with(3);
        room.roster.push(Player::bot("bot-1".to_string(), "Gizmo".to_string()));
        room.enter(Phase::Submitting);
        room.record_submission("h0", "Real Answer".to_string());
        room.record_submission("bot-1", "Bot Bits".to_string());
        // h1 and h2 stayed silent until the deadline
        room.fill_missing_submissions();

        let ids: Vec<_> = vote_candidates(&room, "bot-1")
            .into_iter()
            .map(|e| e.identity)
            .collect();
        assert_eq!(ids, vec!["h0", "h1", "h2"]);
    }
}

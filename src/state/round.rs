use super::{clean_text, AppState, Room, SharedRoom};
use crate::content;
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::seq::IndexedRandom;
use std::sync::Arc;

impl AppState {
    /// Creator starts the game: fill with bots and open round one
    pub async fn start_game(self: &Arc<Self>, room_id: &str, identity: &str) -> Result<(), String> {
        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let mut room = shared.lock().await;
        if !room.is_creator(identity) {
            return Err("Only the creator can start the game".to_string());
        }
        if room.phase != Phase::Lobby {
            return Err(format!("Cannot start a game in {:?}", room.phase));
        }

        let bots = self.fill_with_bots(&mut room);
        tracing::info!(
            "Room {}: game started with {} players ({} bots)",
            room.id,
            room.roster.len(),
            bots
        );
        room.broadcast(room.roster_update());
        room.broadcast(ServerMessage::GameStarted {
            total_rounds: room.options.total_rounds,
            enabled_content_types: room.options.enabled_content_types.clone(),
        });

        self.begin_round(&shared, &mut room);
        Ok(())
    }

    /// Enter Submitting for the next round and fetch its content
    pub(super) fn begin_round(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room) {
        if !room.enter(Phase::Submitting) {
            return;
        }
        room.round_no += 1;
        room.current = None;
        room.clear_round();

        let content_type = room
            .options
            .enabled_content_types
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(ContentType::Acronym);
        let epoch = room.epoch();
        let round_no = room.round_no;
        tracing::info!(
            "Room {}: round {}/{} ({:?})",
            room.id,
            round_no,
            room.options.total_rounds,
            content_type
        );

        let state = self.clone();
        let shared_room = shared.clone();
        let handle = tokio::spawn(async move {
            state
                .run_round(shared_room, epoch, content_type, round_no)
                .await
        })
        .abort_handle();
        room.timers.track_round_task(handle);
    }

    /// Content fetch, round start and bot answers, outside the room lock
    async fn run_round(
        self: Arc<Self>,
        shared: SharedRoom,
        epoch: u64,
        content_type: ContentType,
        round_no: u32,
    ) {
        let timeout = self.config.content_timeout;
        let content =
            content::round_content_or_fallback(self.content.as_ref(), content_type, round_no, timeout)
                .await;

        let bots: Vec<PlayerId> = {
            let mut room = shared.lock().await;
            if room.epoch() != epoch {
                tracing::debug!("Room {}: discarding content for round {}", room.id, round_no);
                return;
            }

            let duration = self.config.submission_deadline(&content.content);
            room.current = Some(content.clone());
            room.broadcast(ServerMessage::NewRound {
                round_number: round_no,
                content_type: content.content_type,
                content: content.content.clone(),
                category: content.category.clone(),
                deadline_seconds: duration.as_secs(),
            });
            self.arm_deadline(&shared, &mut room, Phase::Submitting, duration);

            let waiting: Vec<PlayerId> = room
                .roster
                .iter()
                .filter(|p| p.is_bot && !room.submissions.contains_key(&p.id))
                .map(|p| p.id.clone())
                .collect();
            waiting
        };
        if bots.is_empty() {
            return;
        }

        let answers = futures::future::join_all(bots.iter().map(|_| {
            content::bot_submission_or_fallback(self.content.as_ref(), &content, timeout)
        }))
        .await;

        let mut room = shared.lock().await;
        if room.epoch() != epoch {
            return;
        }
        for (bot, text) in bots.iter().zip(answers) {
            let text = clean_text(&text, self.config.max_answer_chars);
            if room.record_submission(bot, text) {
                tracing::debug!("Room {}: bot {} submitted", room.id, bot);
            }
        }
        self.check_submission_quorum(&shared, &mut room);
    }

    pub async fn submit_content(
        self: &Arc<Self>,
        room_id: &str,
        identity: &str,
        text: &str,
    ) -> Result<(), String> {
        let text = clean_text(text, self.config.max_answer_chars);
        if text.is_empty() {
            return Err("Empty submission".to_string());
        }

        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let mut room = shared.lock().await;
        if room.phase == Phase::Submitting && room.current.is_none() {
            return Err(format!("Round {} has not been announced yet", room.round_no));
        }
        if !room.record_submission(identity, text) {
            return Err(format!(
                "Submission not accepted in {:?} from {}",
                room.phase, identity
            ));
        }
        tracing::debug!(
            "Room {}: {}/{} submitted",
            room.id,
            room.submissions.len(),
            room.roster.len()
        );

        self.check_submission_quorum(&shared, &mut room);
        Ok(())
    }

    pub(super) fn check_submission_quorum(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room) {
        if room.phase == Phase::Submitting && room.submissions_complete() {
            let epoch = room.epoch();
            self.close_submissions(shared, room, epoch);
        }
    }

    /// Deadline path: silence becomes an empty answer
    pub(super) fn expire_submissions(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room) {
        let filled = room.fill_missing_submissions();
        tracing::info!(
            "Room {}: submission deadline passed, {} without an answer",
            room.id,
            filled
        );
        let epoch = room.epoch();
        self.close_submissions(shared, room, epoch);
    }

    /// Submitting -> Voting, shared by the quorum and deadline paths.
    ///
    /// Returns false when the transition already happened for `epoch`.
    pub(super) fn close_submissions(
        self: &Arc<Self>,
        shared: &SharedRoom,
        room: &mut Room,
        epoch: u64,
    ) -> bool {
        if room.phase != Phase::Submitting || room.epoch() != epoch {
            return false;
        }
        room.timers.cancel_phase();
        if !room.enter(Phase::Voting) {
            return false;
        }
        room.submission_deadline = None;

        self.open_voting(shared, room);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// A room already in round one with content, as the orchestrator leaves it
    fn submitting_room(ids: &[&str]) -> SharedRoom {
        let mut room = Room::new(
            "ROOM1".to_string(),
            "Test".to_string(),
            Player::human(ids[0].to_string(), ids[0].to_string()),
            RoomOptions {
                total_rounds: 3,
                enabled_content_types: vec![ContentType::Acronym],
            },
        );
        for id in &ids[1..] {
            room.roster
                .push(Player::human(id.to_string(), id.to_string()));
        }
        room.enter(Phase::Submitting);
        room.round_no = 1;
        room.current = Some(crate::content::fallback::round_content(ContentType::Acronym, 1));
        Arc::new(Mutex::new(room))
    }

    #[tokio::test]
    async fn test_close_submissions_fires_once() {
        let state = Arc::new(AppState::default());
        let shared = submitting_room(&["a", "b"]);
        let mut room = shared.lock().await;
        let epoch = room.epoch();

        assert!(state.close_submissions(&shared, &mut room, epoch));
        assert_eq!(room.phase, Phase::Voting);
        let after = room.epoch();

        // The second trigger for the same round is a no-op
        assert!(!state.close_submissions(&shared, &mut room, epoch));
        assert_eq!(room.phase, Phase::Voting);
        assert_eq!(room.epoch(), after);
    }

    #[tokio::test]
    async fn test_expiry_fills_missing_answers() {
        let state = Arc::new(AppState::default());
        let shared = submitting_room(&["a", "b", "c"]);
        let mut room = shared.lock().await;
        let mut events = room.subscribe();
        room.record_submission("a", "Apt Bold Cats".to_string());

        state.expire_submissions(&shared, &mut room);
        assert_eq!(room.phase, Phase::Voting);
        assert_eq!(room.submissions.len(), 3);
        assert_eq!(room.submissions["b"], "");

        match events.recv().await.unwrap() {
            ServerMessage::SubmissionsReceived { submissions } => {
                assert_eq!(submissions.len(), 3);
                assert_eq!(submissions[0].text, "Apt Bold Cats");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert_eq!(events.recv().await.unwrap(), ServerMessage::VotingStart);
    }

    #[tokio::test]
    async fn test_quorum_waits_for_everyone() {
        let state = Arc::new(AppState::default());
        let shared = submitting_room(&["a", "b"]);
        let mut room = shared.lock().await;

        room.record_submission("a", "A".to_string());
        state.check_submission_quorum(&shared, &mut room);
        assert_eq!(room.phase, Phase::Submitting);

        room.record_submission("b", "B".to_string());
        state.check_submission_quorum(&shared, &mut room);
        assert_eq!(room.phase, Phase::Voting);
    }

    #[tokio::test]
    async fn test_submissions_wait_for_round_content() {
        let state = Arc::new(AppState::default());
        let shared = submitting_room(&["a", "b"]);
        shared.lock().await.current = None;
        state
            .rooms
            .write()
            .await
            .insert("ROOM1".to_string(), shared.clone());

        assert!(state.submit_content("ROOM1", "a", "Early Bird").await.is_err());
        assert!(state.submit_content("ROOM1", "b", "Eager Beaver").await.is_err());
        {
            let room = shared.lock().await;
            assert_eq!(room.phase, Phase::Submitting);
            assert!(room.submissions.is_empty());
        }

        shared.lock().await.current =
            Some(crate::content::fallback::round_content(ContentType::Acronym, 1));
        state.submit_content("ROOM1", "a", "Apt Bold Cats").await.unwrap();
        assert_eq!(shared.lock().await.submissions.len(), 1);
    }
}

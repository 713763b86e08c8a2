use super::bot::vote_candidates;
use super::{AppState, Room, SharedRoom};
use crate::content;
use crate::protocol::{RoundResultsPayload, ServerMessage};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Voting just began: show the answers and get the bots going
    pub(super) fn open_voting(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room) {
        room.broadcast(ServerMessage::SubmissionsReceived {
            submissions: room.submission_entries(),
        });
        room.broadcast(ServerMessage::VotingStart);
        self.arm_deadline(shared, room, Phase::Voting, self.config.voting_deadline());

        if room.roster.iter().any(|p| p.is_bot) {
            let state = self.clone();
            let shared_room = shared.clone();
            let epoch = room.epoch();
            let handle = tokio::spawn(async move { state.run_bot_votes(shared_room, epoch).await })
                .abort_handle();
            room.timers.track_round_task(handle);
        }
    }

    async fn run_bot_votes(self: Arc<Self>, shared: SharedRoom, epoch: u64) {
        tokio::time::sleep(self.config.bot_vote_delay).await;

        let (ballots, category) = {
            let room = shared.lock().await;
            if room.epoch() != epoch {
                return;
            }
            let ballots: Vec<(PlayerId, Vec<(PlayerId, String)>)> = room
                .roster
                .iter()
                .filter(|p| p.is_bot && !room.votes.contains_key(&p.id))
                .map(|bot| {
                    let candidates = vote_candidates(&room, &bot.id)
                        .into_iter()
                        .map(|entry| (entry.identity, entry.text))
                        .collect();
                    (bot.id.clone(), candidates)
                })
                .collect();
            let category = room
                .current
                .as_ref()
                .map(|c| c.category.clone())
                .unwrap_or_default();
            (ballots, category)
        };

        let timeout = self.config.content_timeout;
        let picks = futures::future::join_all(ballots.iter().map(|(bot, candidates)| {
            let texts: Vec<String> = candidates.iter().map(|(_, text)| text.clone()).collect();
            let category = category.as_str();
            let provider = self.content.as_ref();
            async move {
                let index = content::choose_or_fallback(provider, &texts, category, timeout).await?;
                let (target, _) = candidates.get(index)?;
                Some((bot.clone(), target.clone()))
            }
        }))
        .await;

        let mut room = shared.lock().await;
        if room.epoch() != epoch {
            return;
        }
        for (bot, target) in picks.into_iter().flatten() {
            if room.record_vote(&bot, &target) {
                tracing::debug!("Room {}: bot {} voted for {}", room.id, bot, target);
            }
        }
        self.check_vote_quorum(&shared, &mut room);
    }

    pub async fn cast_vote(
        self: &Arc<Self>,
        room_id: &str,
        identity: &str,
        target: &str,
    ) -> Result<(), String> {
        let shared = self.get_room(room_id).await.ok_or("Room not found")?;
        let mut room = shared.lock().await;
        if !room.record_vote(identity, target) {
            return Err(format!(
                "Vote from {} for {} not accepted in {:?}",
                identity, target, room.phase
            ));
        }
        tracing::debug!(
            "Room {}: {}/{} voted",
            room.id,
            room.votes.len(),
            room.roster.len()
        );

        self.check_vote_quorum(&shared, &mut room);
        Ok(())
    }

    pub(super) fn check_vote_quorum(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room) {
        if room.phase == Phase::Voting && room.votes_complete() {
            let epoch = room.epoch();
            self.close_voting(shared, room, epoch);
        }
    }

    pub(super) fn expire_voting(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room) {
        tracing::info!(
            "Room {}: voting deadline passed with {}/{} votes",
            room.id,
            room.votes.len(),
            room.roster.len()
        );
        let epoch = room.epoch();
        self.close_voting(shared, room, epoch);
    }

    /// Voting -> RoundResults, then on to the next round or the end.
    ///
    /// Shared by the quorum and deadline paths; false when already done.
    pub(super) fn close_voting(
        self: &Arc<Self>,
        shared: &SharedRoom,
        room: &mut Room,
        epoch: u64,
    ) -> bool {
        if room.phase != Phase::Voting || room.epoch() != epoch {
            return false;
        }
        room.timers.cancel_phase();
        if !room.enter(Phase::RoundResults) {
            return false;
        }
        room.voting_deadline = None;

        let awarded = room.apply_scores(self.config.scoring);
        room.broadcast(ServerMessage::RoundResults(RoundResultsPayload {
            round_number: room.round_no,
            submissions: room.submission_entries(),
            votes: room.vote_entries(),
            updated_roster: room.roster.clone(),
            awarded,
        }));

        if room.round_no >= room.options.total_rounds {
            self.finish_game(room);
        } else {
            self.arm_next_round(shared, room);
        }
        true
    }

    fn finish_game(&self, room: &mut Room) {
        if !room.enter(Phase::Ended) {
            return;
        }
        let winners = room.winners();
        tracing::info!(
            "Room {}: game over, winners {:?}",
            room.id,
            winners.iter().map(|p| p.display_name.as_str()).collect::<Vec<_>>()
        );
        room.broadcast(ServerMessage::GameEnd { winners });
    }
}

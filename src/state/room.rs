use super::timer::RoomTimers;
use crate::protocol::{ServerMessage, SubmissionEntry, VoteEntry};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

/// A room behind its own lock; every handler holds it for one mutation
pub type SharedRoom = Arc<Mutex<Room>>;

/// Capacity of a room's broadcast channel
const EVENT_BUFFER: usize = 256;

/// One independent game session
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub creator: PlayerId,
    pub phase: Phase,
    pub round_no: u32,
    pub options: RoomOptions,
    pub current: Option<RoundContent>,
    pub roster: Vec<Player>,
    /// Empty text means "answered nothing"; absence means "not yet answered"
    pub submissions: HashMap<PlayerId, String>,
    /// voter -> target
    pub votes: HashMap<PlayerId, PlayerId>,
    pub submission_deadline: Option<Instant>,
    pub voting_deadline: Option<Instant>,
    /// Set once the roster emptied; the room is on its way out of the registry
    pub closed: bool,
    /// Bumped on every transition; spawned work compares it before touching the room
    epoch: u64,
    pub(super) timers: RoomTimers,
    events: broadcast::Sender<ServerMessage>,
}

impl Room {
    pub fn new(id: RoomId, name: String, creator: Player, options: RoomOptions) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_BUFFER);
        Self {
            id,
            name,
            creator: creator.id.clone(),
            phase: Phase::Lobby,
            round_no: 0,
            options,
            current: None,
            roster: vec![creator],
            submissions: HashMap::new(),
            votes: HashMap::new(),
            submission_deadline: None,
            voting_deadline: None,
            closed: false,
            epoch: 0,
            timers: RoomTimers::default(),
            events,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Move to `to` if the life cycle allows it
    pub(super) fn enter(&mut self, to: Phase) -> bool {
        if !self.phase.can_transition_to(to) {
            tracing::warn!(
                "Room {}: refusing transition {:?} -> {:?}",
                self.id,
                self.phase,
                to
            );
            return false;
        }
        tracing::info!("Room {}: {:?} -> {:?}", self.id, self.phase, to);
        self.phase = to;
        self.epoch += 1;
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    pub fn broadcast(&self, msg: ServerMessage) {
        // No subscribers is fine (everyone may be reconnecting)
        let _ = self.events.send(msg);
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.roster.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.roster.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn is_creator(&self, id: &str) -> bool {
        self.creator == id && self.contains(id)
    }

    pub fn human_count(&self) -> usize {
        self.roster.iter().filter(|p| !p.is_bot).count()
    }

    pub fn roster_update(&self) -> ServerMessage {
        ServerMessage::PlayerUpdate {
            roster: self.roster.clone(),
            room_name: self.name.clone(),
        }
    }

    pub fn options_update(&self) -> ServerMessage {
        ServerMessage::RoomOptions {
            total_rounds: self.options.total_rounds,
            enabled_content_types: self.options.enabled_content_types.clone(),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            creator: self.creator.clone(),
            phase: self.phase,
            round_no: self.round_no,
            options: self.options.clone(),
            roster: self.roster.clone(),
        }
    }

    /// Accept a first answer from a roster member while submitting
    pub fn record_submission(&mut self, id: &str, text: String) -> bool {
        if self.phase != Phase::Submitting
            || !self.contains(id)
            || self.submissions.contains_key(id)
        {
            return false;
        }
        self.submissions.insert(id.to_string(), text);
        true
    }

    pub fn submissions_complete(&self) -> bool {
        !self.roster.is_empty()
            && self
                .roster
                .iter()
                .all(|p| self.submissions.contains_key(&p.id))
    }

    /// Deadline passed: everyone still silent answered nothing
    pub fn fill_missing_submissions(&mut self) -> usize {
        let missing: Vec<PlayerId> = self
            .roster
            .iter()
            .filter(|p| !self.submissions.contains_key(&p.id))
            .map(|p| p.id.clone())
            .collect();
        for id in &missing {
            self.submissions.insert(id.clone(), String::new());
        }
        missing.len()
    }

    /// Submissions in roster order
    pub fn submission_entries(&self) -> Vec<SubmissionEntry> {
        self.roster
            .iter()
            .filter_map(|p| {
                self.submissions.get(&p.id).map(|text| SubmissionEntry {
                    identity: p.id.clone(),
                    text: text.clone(),
                })
            })
            .collect()
    }

    /// Accept a first vote for someone else's submission while voting
    pub fn record_vote(&mut self, voter: &str, target: &str) -> bool {
        if self.phase != Phase::Voting
            || voter == target
            || !self.contains(voter)
            || self.votes.contains_key(voter)
            || !self.submissions.contains_key(target)
        {
            return false;
        }
        self.votes.insert(voter.to_string(), target.to_string());
        true
    }

    pub fn votes_complete(&self) -> bool {
        !self.roster.is_empty() && self.roster.iter().all(|p| self.votes.contains_key(&p.id))
    }

    /// Votes in roster order of the voter
    pub fn vote_entries(&self) -> Vec<VoteEntry> {
        self.roster
            .iter()
            .filter_map(|p| {
                self.votes.get(&p.id).map(|target| VoteEntry {
                    voter: p.id.clone(),
                    target: target.clone(),
                })
            })
            .collect()
    }

    pub fn clear_round(&mut self) {
        self.submissions.clear();
        self.votes.clear();
        self.submission_deadline = None;
        self.voting_deadline = None;
    }

    /// Remove a player together with everything keyed by them this round
    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let index = self.roster.iter().position(|p| p.id == id)?;
        let player = self.roster.remove(index);
        self.submissions.remove(id);
        self.votes.remove(id);
        // Votes for a vanished submission are void; those voters may vote again
        self.votes.retain(|_, target| target != id);
        Some(player)
    }

    /// Rewrite a roster identity in place (same slot, same score)
    pub fn rekey_player(&mut self, old: &str, new: &str) -> bool {
        let Some(player) = self.player_mut(old) else {
            return false;
        };
        player.id = new.to_string();
        player.connected = true;

        if let Some(text) = self.submissions.remove(old) {
            self.submissions.insert(new.to_string(), text);
        }
        if let Some(target) = self.votes.remove(old) {
            self.votes.insert(new.to_string(), target);
        }
        for target in self.votes.values_mut() {
            if target == old {
                *target = new.to_string();
            }
        }
        if self.creator == old {
            self.creator = new.to_string();
        }
        true
    }

    /// Back to the lobby: round and scores zeroed, bots dismissed
    pub fn reset_to_lobby(&mut self) {
        self.timers.cancel_round_tasks();
        if self.phase == Phase::Lobby {
            self.epoch += 1;
        } else {
            self.enter(Phase::Lobby);
        }
        self.round_no = 0;
        self.current = None;
        self.clear_round();
        self.roster.retain(|p| !p.is_bot);
        for player in &mut self.roster {
            player.score = 0;
        }
    }

    /// Mark the room dead and hand back its tasks for cancellation
    pub(super) fn close(&mut self) -> Vec<tokio::task::AbortHandle> {
        self.closed = true;
        self.epoch += 1;
        self.clear_round();
        self.timers.take_all()
    }
}

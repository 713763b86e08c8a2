use super::Room;
use crate::protocol::AwardEntry;
use crate::types::*;
use std::collections::HashMap;

impl Room {
    /// Votes received per target
    pub fn tally(&self) -> HashMap<PlayerId, u32> {
        let mut counts: HashMap<PlayerId, u32> = HashMap::new();
        for target in self.votes.values() {
            *counts.entry(target.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Points each roster member earns this round under `policy`
    pub fn awards(&self, policy: ScoringPolicy) -> Vec<AwardEntry> {
        let counts = self.tally();
        let received = |id: &str| counts.get(id).copied().unwrap_or(0);

        let top = self
            .roster
            .iter()
            .map(|p| received(&p.id))
            .max()
            .unwrap_or(0);

        self.roster
            .iter()
            .map(|p| {
                let votes = received(&p.id);
                let points = match policy {
                    ScoringPolicy::VotesReceived => votes,
                    ScoringPolicy::MostVoted => u32::from(top > 0 && votes == top),
                };
                AwardEntry {
                    identity: p.id.clone(),
                    points,
                }
            })
            .collect()
    }

    /// Add this round's points to the roster scores
    pub fn apply_scores(&mut self, policy: ScoringPolicy) -> Vec<AwardEntry> {
        let awarded = self.awards(policy);
        for award in &awarded {
            if let Some(player) = self.player_mut(&award.identity) {
                player.score += award.points;
            }
        }
        awarded
    }

    /// Everyone tied at the top score
    pub fn winners(&self) -> Vec<Player> {
        let Some(best) = self.roster.iter().map(|p| p.score).max() else {
            return Vec::new();
        };
        self.roster
            .iter()
            .filter(|p| p.score == best)
            .cloned()
            .collect()
    }
}

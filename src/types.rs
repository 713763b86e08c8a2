use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomId = String;
/// Connection identity issued by the server; doubles as the roster key
pub type PlayerId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Lobby,
    Submitting,
    Voting,
    RoundResults,
    Ended,
}

impl Phase {
    /// Legal edges of the room life cycle. Reset is allowed from anywhere.
    pub fn can_transition_to(self, to: Phase) -> bool {
        use Phase::*;

        matches!(
            (self, to),
            (Lobby, Submitting)
                | (Submitting, Voting)
                | (Voting, RoundResults)
                | (RoundResults, Submitting)
                | (RoundResults, Ended)
                | (_, Lobby)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Acronym,
    Date,
    Movie,
}

impl ContentType {
    pub const ALL: [ContentType; 3] = [ContentType::Acronym, ContentType::Date, ContentType::Movie];
}

/// What the Content Provider hands out for a round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundContent {
    pub content_type: ContentType,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub score: u32,
    pub is_bot: bool,
    /// False while a disconnected human's seat is held for reconnection
    #[serde(default = "default_connected")]
    pub connected: bool,
}

fn default_connected() -> bool {
    true
}

impl Player {
    pub fn human(id: PlayerId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            score: 0,
            is_bot: false,
            connected: true,
        }
    }

    pub fn bot(id: PlayerId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            score: 0,
            is_bot: true,
            connected: true,
        }
    }
}

/// Creator-controlled settings, changeable only in the lobby
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomOptions {
    pub total_rounds: u32,
    pub enabled_content_types: Vec<ContentType>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Every submission earns one point per vote it received
    VotesReceived,
    /// The submission(s) tied for the most votes earn a single point each
    MostVoted,
}

impl std::str::FromStr for ScoringPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "votes" | "votes_received" => Ok(ScoringPolicy::VotesReceived),
            "winner" | "most_voted" => Ok(ScoringPolicy::MostVoted),
            other => Err(format!("unknown scoring policy '{}'", other)),
        }
    }
}

/// Full snapshot of a room, identities included; the HTTP API narrows it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub creator: PlayerId,
    pub phase: Phase,
    pub round_no: u32,
    pub options: RoomOptions,
    pub roster: Vec<Player>,
}

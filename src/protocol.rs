use crate::types::*;
use serde::{Deserialize, Serialize};

/// Protocol version announced in the welcome frame
pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        display_name: String,
    },
    /// Join a room; `previous_identity` is the identity from an earlier
    /// connection, used to reclaim the creator seat
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        previous_identity: Option<PlayerId>,
    },
    SetDisplayName {
        room_id: RoomId,
        name: String,
    },
    // Creator-only messages
    SetRoomOptions {
        room_id: RoomId,
        total_rounds: u32,
        enabled_content_types: Vec<ContentType>,
    },
    StartGame {
        room_id: RoomId,
    },
    ResetGame {
        room_id: RoomId,
    },
    // Round messages
    SubmitContent {
        room_id: RoomId,
        text: String,
    },
    CastVote {
        room_id: RoomId,
        target_identity: PlayerId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    SendChat {
        room_id: RoomId,
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on every connection; the identity must be kept for rejoining
    Welcome {
        protocol: String,
        identity: PlayerId,
    },
    RoomCreated {
        room_id: RoomId,
    },
    RoomJoined {
        room_id: RoomId,
        is_creator: bool,
        room_name: String,
    },
    RoomNotFound,
    PlayerUpdate {
        roster: Vec<Player>,
        room_name: String,
    },
    CreatorUpdate {
        creator: PlayerId,
    },
    RoomOptions {
        total_rounds: u32,
        enabled_content_types: Vec<ContentType>,
    },
    /// Join-style notices (bots taking a seat, players dropping out)
    SystemNotice {
        text: String,
    },
    GameStarted {
        total_rounds: u32,
        enabled_content_types: Vec<ContentType>,
    },
    NewRound {
        round_number: u32,
        content_type: ContentType,
        content: String,
        category: String,
        deadline_seconds: u64,
    },
    TimeUpdate {
        seconds_remaining: u64,
    },
    SubmissionsReceived {
        submissions: Vec<SubmissionEntry>,
    },
    VotingStart,
    RoundResults(RoundResultsPayload),
    GameEnd {
        winners: Vec<Player>,
    },
    GameReset,
    ChatMessage {
        sender_identity: PlayerId,
        sender_name: String,
        text: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// One answer in the voting list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionEntry {
    pub identity: PlayerId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteEntry {
    pub voter: PlayerId,
    pub target: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResultsPayload {
    pub round_number: u32,
    pub submissions: Vec<SubmissionEntry>,
    pub votes: Vec<VoteEntry>,
    pub updated_roster: Vec<Player>,
    /// Points each player gained this round, one entry per roster member
    pub awarded: Vec<AwardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwardEntry {
    pub identity: PlayerId,
    pub points: u32,
}

//! HTTP API endpoints.
//!
//! Read-only views for load balancers and lobby pages; all game traffic
//! goes over the WebSocket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::protocol::PROTOCOL_VERSION;
use crate::state::AppState;
use crate::types::{Phase, RoomId, RoomOptions, RoomSummary};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub protocol: &'static str,
    pub rooms: usize,
    pub content_provider: String,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        protocol: PROTOCOL_VERSION,
        rooms: state.room_count().await,
        content_provider: state.content.name().to_string(),
    })
}

/// Room as anyone outside it may see it.
///
/// Player identities double as rejoin tokens, so none appear here.
#[derive(Debug, Clone, Serialize)]
pub struct PublicRoom {
    pub id: RoomId,
    pub name: String,
    pub phase: Phase,
    pub round_no: u32,
    pub options: RoomOptions,
    pub players: Vec<PublicPlayer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicPlayer {
    pub display_name: String,
    pub score: u32,
    pub is_bot: bool,
    pub connected: bool,
    pub is_creator: bool,
}

impl From<RoomSummary> for PublicRoom {
    fn from(summary: RoomSummary) -> Self {
        let players = summary
            .roster
            .into_iter()
            .map(|p| PublicPlayer {
                is_creator: p.id == summary.creator,
                display_name: p.display_name,
                score: p.score,
                is_bot: p.is_bot,
                connected: p.connected,
            })
            .collect();

        Self {
            id: summary.id,
            name: summary.name,
            phase: summary.phase,
            round_no: summary.round_no,
            options: summary.options,
            players,
        }
    }
}

/// GET /api/rooms/{room_id}
///
/// Snapshot of a room's phase, options and players, or 404.
pub async fn room_summary(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Response {
    match state.room_summary(&room_id).await {
        Some(summary) => Json(PublicRoom::from(summary)).into_response(),
        None => (StatusCode::NOT_FOUND, "Room not found").into_response(),
    }
}

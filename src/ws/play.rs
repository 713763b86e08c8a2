use crate::state::AppState;
use crate::types::{PlayerId, RoomId};
use std::sync::Arc;

use super::Session;

pub async fn handle_submit_content(
    state: &Arc<AppState>,
    session: &Session,
    room_id: RoomId,
    text: String,
) -> Result<(), String> {
    tracing::debug!("Submission from {} in room {}", session.identity, room_id);
    state
        .submit_content(&room_id, &session.identity, &text)
        .await
}

pub async fn handle_cast_vote(
    state: &Arc<AppState>,
    session: &Session,
    room_id: RoomId,
    target_identity: PlayerId,
) -> Result<(), String> {
    tracing::debug!(
        "Vote from {} for {} in room {}",
        session.identity,
        target_identity,
        room_id
    );
    state
        .cast_vote(&room_id, &session.identity, &target_identity)
        .await
}

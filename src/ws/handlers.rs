//! WebSocket message dispatch
//!
//! Requests that are not allowed in the room's current phase, or that come
//! from someone without standing in the room, are dropped without a reply.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

use super::{lobby, play, Session};

/// Log a rejected request and move on
macro_rules! drop_rejected {
    ($session:expr, $action:expr, $result:expr) => {
        if let Err(reason) = $result {
            tracing::debug!("Dropped {} from {}: {}", $action, $session.identity, reason);
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom { display_name } => {
            Some(lobby::handle_create_room(state, session, display_name).await)
        }

        ClientMessage::JoinRoom {
            room_id,
            previous_identity,
        } => Some(lobby::handle_join_room(state, session, room_id, previous_identity).await),

        ClientMessage::LeaveRoom { room_id } => {
            drop_rejected!(
                session,
                "leave_room",
                lobby::handle_leave_room(state, session, room_id).await
            );
            None
        }

        ClientMessage::SetDisplayName { room_id, name } => {
            drop_rejected!(
                session,
                "set_display_name",
                state
                    .set_display_name(&room_id, &session.identity, &name)
                    .await
            );
            None
        }

        ClientMessage::SetRoomOptions {
            room_id,
            total_rounds,
            enabled_content_types,
        } => {
            drop_rejected!(
                session,
                "set_room_options",
                state
                    .set_room_options(
                        &room_id,
                        &session.identity,
                        total_rounds,
                        enabled_content_types
                    )
                    .await
            );
            None
        }

        ClientMessage::StartGame { room_id } => {
            drop_rejected!(
                session,
                "start_game",
                state.start_game(&room_id, &session.identity).await
            );
            None
        }

        ClientMessage::ResetGame { room_id } => {
            drop_rejected!(
                session,
                "reset_game",
                state.reset_game(&room_id, &session.identity).await
            );
            None
        }

        ClientMessage::SubmitContent { room_id, text } => {
            drop_rejected!(
                session,
                "submit_content",
                play::handle_submit_content(state, session, room_id, text).await
            );
            None
        }

        ClientMessage::CastVote {
            room_id,
            target_identity,
        } => {
            drop_rejected!(
                session,
                "cast_vote",
                play::handle_cast_vote(state, session, room_id, target_identity).await
            );
            None
        }

        ClientMessage::SendChat { room_id, text } => {
            drop_rejected!(
                session,
                "send_chat",
                state.send_chat(&room_id, &session.identity, &text).await
            );
            None
        }
    }
}

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::RoomId;
use std::sync::Arc;

use super::Session;

/// Leave whatever room the session follows unless it is `keep`
async fn leave_current(state: &Arc<AppState>, session: &mut Session, keep: Option<&str>) {
    let Some(current) = session.room_id.clone() else {
        return;
    };
    if keep.is_some_and(|keep| keep.eq_ignore_ascii_case(&current)) {
        return;
    }
    if let Err(e) = state.leave_room(&current, &session.identity).await {
        tracing::debug!("{} was no longer in room {}: {}", session.identity, current, e);
    }
    session.exit();
}

pub async fn handle_create_room(
    state: &Arc<AppState>,
    session: &mut Session,
    display_name: String,
) -> ServerMessage {
    leave_current(state, session, None).await;

    let (room_id, events) = state.create_room(&session.identity, &display_name).await;
    session.enter(room_id.clone(), events);
    ServerMessage::RoomCreated { room_id }
}

pub async fn handle_join_room(
    state: &Arc<AppState>,
    session: &mut Session,
    room_id: RoomId,
    previous_identity: Option<String>,
) -> ServerMessage {
    leave_current(state, session, Some(&room_id)).await;

    match state
        .join_room(&room_id, &session.identity, previous_identity.as_deref())
        .await
    {
        Some(joined) => {
            tracing::info!("{} joined room {}", session.identity, joined.room_id);
            session.enter(joined.room_id.clone(), joined.events);
            ServerMessage::RoomJoined {
                room_id: joined.room_id,
                is_creator: joined.is_creator,
                room_name: joined.room_name,
            }
        }
        None => {
            tracing::debug!("{} asked for unknown room {}", session.identity, room_id);
            ServerMessage::RoomNotFound
        }
    }
}

pub async fn handle_leave_room(
    state: &Arc<AppState>,
    session: &mut Session,
    room_id: RoomId,
) -> Result<(), String> {
    state.leave_room(&room_id, &session.identity).await?;
    if session
        .room_id
        .as_deref()
        .is_some_and(|current| current.eq_ignore_ascii_case(&room_id))
    {
        session.exit();
    }
    Ok(())
}

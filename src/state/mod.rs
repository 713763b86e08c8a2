mod bot;
mod registry;
mod room;
mod roster;
mod round;
mod score;
mod timer;
mod vote;

pub use room::{Room, SharedRoom};
pub use roster::{resolve_rejoin, JoinOutcome, Rejoin};
pub use timer::RoomTimers;

use crate::config::GameConfig;
use crate::content::{ContentProvider, StaticContentProvider};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state: the room registry plus what every room needs
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomId, SharedRoom>>>,
    pub content: Arc<dyn ContentProvider>,
    pub config: GameConfig,
}

impl AppState {
    pub fn new(content: Arc<dyn ContentProvider>, config: GameConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            content,
            config: config.sanitized(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(StaticContentProvider), GameConfig::default())
    }
}

/// Trim and cap user text at `max` characters
pub(crate) fn clean_text(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  hello  ", 10), "hello");
        assert_eq!(clean_text("abcdef", 3), "abc");
        assert_eq!(clean_text("ab cd", 3), "ab");
        assert_eq!(clean_text("ünïcödé", 3), "ünï");
        assert_eq!(clean_text("   ", 3), "");
    }

    #[tokio::test]
    async fn test_default_state_is_empty() {
        let state = AppState::default();
        assert_eq!(state.room_count().await, 0);
        assert_eq!(state.content.name(), "static");
    }
}

//! Runtime configuration loaded from environment variables.
//!
//! Every value has a default so the server starts with an empty environment.

use crate::types::{ContentType, ScoringPolicy};
use std::time::Duration;

/// Read a trimmed, non-empty environment variable
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_value(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

/// Rules and timings shared by every room
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Rosters smaller than this are topped up with bots on start
    pub min_players: usize,
    pub default_total_rounds: u32,
    pub max_total_rounds: u32,
    pub default_content_types: Vec<ContentType>,
    /// Content up to this many characters gets the short deadline
    pub short_content_chars: usize,
    /// Content up to this many characters gets the medium deadline
    pub medium_content_chars: usize,
    pub submit_seconds_short: u64,
    pub submit_seconds_medium: u64,
    pub submit_seconds_long: u64,
    pub voting_seconds: u64,
    /// Pause on the results screen before the next round starts
    pub results_seconds: u64,
    pub bot_vote_delay: Duration,
    /// Interval between `time_update` broadcasts
    pub tick: Duration,
    /// How long a disconnected human keeps their seat
    pub reconnect_grace: Duration,
    /// Upper bound for a single Content Provider call
    pub content_timeout: Duration,
    pub scoring: ScoringPolicy,
    pub max_answer_chars: usize,
    pub max_chat_chars: usize,
    pub max_name_chars: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            default_total_rounds: 3,
            max_total_rounds: 10,
            default_content_types: vec![ContentType::Acronym],
            short_content_chars: 10,
            medium_content_chars: 30,
            submit_seconds_short: 30,
            submit_seconds_medium: 45,
            submit_seconds_long: 60,
            voting_seconds: 30,
            results_seconds: 8,
            bot_vote_delay: Duration::from_secs(2),
            tick: Duration::from_secs(1),
            reconnect_grace: Duration::from_secs(15),
            content_timeout: Duration::from_secs(10),
            scoring: ScoringPolicy::VotesReceived,
            max_answer_chars: 200,
            max_chat_chars: 500,
            max_name_chars: 32,
        }
    }
}

impl GameConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            min_players: env_parse("MIN_PLAYERS").unwrap_or(defaults.min_players),
            default_total_rounds: env_parse("DEFAULT_ROUNDS")
                .unwrap_or(defaults.default_total_rounds),
            max_total_rounds: env_parse("MAX_ROUNDS").unwrap_or(defaults.max_total_rounds),
            submit_seconds_short: env_parse("SUBMIT_SECONDS_SHORT")
                .unwrap_or(defaults.submit_seconds_short),
            submit_seconds_medium: env_parse("SUBMIT_SECONDS_MEDIUM")
                .unwrap_or(defaults.submit_seconds_medium),
            submit_seconds_long: env_parse("SUBMIT_SECONDS_LONG")
                .unwrap_or(defaults.submit_seconds_long),
            voting_seconds: env_parse("VOTING_SECONDS").unwrap_or(defaults.voting_seconds),
            results_seconds: env_parse("RESULTS_SECONDS").unwrap_or(defaults.results_seconds),
            bot_vote_delay: env_parse("BOT_VOTE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.bot_vote_delay),
            reconnect_grace: env_parse("RECONNECT_GRACE_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconnect_grace),
            content_timeout: env_parse("CONTENT_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.content_timeout),
            scoring: env_parse("SCORING_POLICY").unwrap_or(defaults.scoring),
            ..defaults
        }
        .sanitized()
    }

    /// Pull round counts back into the range rooms accept
    pub fn sanitized(mut self) -> Self {
        if self.max_total_rounds == 0 {
            tracing::warn!("MAX_ROUNDS must be at least 1, using 1");
            self.max_total_rounds = 1;
        }
        let rounds = self.default_total_rounds.clamp(1, self.max_total_rounds);
        if rounds != self.default_total_rounds {
            tracing::warn!(
                "DEFAULT_ROUNDS {} outside 1..={}, using {}",
                self.default_total_rounds,
                self.max_total_rounds,
                rounds
            );
            self.default_total_rounds = rounds;
        }
        self
    }

    /// Submission time for a round, banded by how long the content is
    pub fn submission_deadline(&self, content: &str) -> Duration {
        let len = content.chars().count();
        let secs = if len <= self.short_content_chars {
            self.submit_seconds_short
        } else if len <= self.medium_content_chars {
            self.submit_seconds_medium
        } else {
            self.submit_seconds_long
        };
        Duration::from_secs(secs)
    }

    pub fn voting_deadline(&self) -> Duration {
        Duration::from_secs(self.voting_seconds)
    }

    pub fn results_delay(&self) -> Duration {
        Duration::from_secs(self.results_seconds)
    }
}

/// Listener and HTTP settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed CORS origins (empty = permissive)
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let cors_origins = env_value("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            port: env_parse("PORT").unwrap_or(3001),
            cors_origins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_deadline_bands() {
        let config = GameConfig::default();
        assert_eq!(config.submission_deadline("ABC"), Duration::from_secs(30));
        assert_eq!(
            config.submission_deadline("January 12, 1912"),
            Duration::from_secs(45)
        );
        assert_eq!(
            config.submission_deadline("The Extraordinarily Long Title Of A Movie"),
            Duration::from_secs(60)
        );
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("VOTING_SECONDS", "12");
        std::env::set_var("SCORING_POLICY", "most_voted");
        std::env::set_var("BOT_VOTE_DELAY_MS", "250");

        let config = GameConfig::from_env();
        assert_eq!(config.voting_seconds, 12);
        assert_eq!(config.scoring, ScoringPolicy::MostVoted);
        assert_eq!(config.bot_vote_delay, Duration::from_millis(250));

        std::env::remove_var("VOTING_SECONDS");
        std::env::remove_var("SCORING_POLICY");
        std::env::remove_var("BOT_VOTE_DELAY_MS");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        std::env::set_var("MIN_PLAYERS", "lots");
        std::env::set_var("DEFAULT_ROUNDS", "   ");

        let config = GameConfig::from_env();
        assert_eq!(config.min_players, 4);
        assert_eq!(config.default_total_rounds, 3);

        std::env::remove_var("MIN_PLAYERS");
        std::env::remove_var("DEFAULT_ROUNDS");
    }

    #[test]
    #[serial]
    fn test_from_env_clamps_default_rounds() {
        std::env::set_var("DEFAULT_ROUNDS", "0");
        assert_eq!(GameConfig::from_env().default_total_rounds, 1);

        std::env::set_var("DEFAULT_ROUNDS", "50");
        std::env::set_var("MAX_ROUNDS", "6");
        let config = GameConfig::from_env();
        assert_eq!(config.max_total_rounds, 6);
        assert_eq!(config.default_total_rounds, 6);

        std::env::set_var("MAX_ROUNDS", "0");
        let config = GameConfig::from_env();
        assert_eq!(config.max_total_rounds, 1);
        assert_eq!(config.default_total_rounds, 1);

        std::env::remove_var("DEFAULT_ROUNDS");
        std::env::remove_var("MAX_ROUNDS");
    }

    #[test]
    #[serial]
    fn test_server_config_cors_list() {
        std::env::set_var("CORS_ORIGINS", "http://localhost:3000, https://acrophylia.app,");
        let config = ServerConfig::from_env();
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:3000", "https://acrophylia.app"]
        );
        std::env::remove_var("CORS_ORIGINS");
    }
}

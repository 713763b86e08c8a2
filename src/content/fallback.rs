//! Local content generation, used when no LLM is configured and as the
//! fallback for every failed provider call.

use super::{ContentProvider, ContentResult};
use crate::types::{ContentType, RoundContent};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use rand::seq::IndexedRandom;
use rand::Rng;

/// Letters that make playable acronyms (no Q, X, Z)
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPRSTUVWY";

const CATEGORIES: &[&str] = &[
    "Animals",
    "Space",
    "Technology",
    "Food",
    "Sports",
    "Music",
    "Movies",
    "Travel",
    "History",
    "Science",
    "Art",
    "Nature",
];

const MOVIE_TITLES: &[&str] = &[
    "The Last Horizon",
    "Whispers in the Dark",
    "Eternal Echoes",
    "Midnight Runners",
    "The Silent Guardian",
    "Beyond the Stars",
    "The Forgotten Path",
    "Shadows of Tomorrow",
    "The Unexpected Journey",
];

/// Number of letters for a round: 3 in round one, growing to 6
pub fn letter_count(round_no: u32) -> usize {
    (round_no as usize + 2).clamp(3, 6)
}

pub fn letters(round_no: u32) -> String {
    let mut rng = rand::rng();
    (0..letter_count(round_no))
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect()
}

/// Random date between 1800 and 2010, e.g. "January 1, 1900"
pub fn random_date() -> String {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(1800, 1, 1),
        NaiveDate::from_ymd_opt(2010, 12, 31),
    ) else {
        return "July 20, 1969".to_string();
    };
    let span = (end - start).num_days();
    let date = start + ChronoDuration::days(rand::rng().random_range(0..=span));
    date.format("%B %-d, %Y").to_string()
}

pub fn random_category() -> String {
    pick(CATEGORIES, "Random")
}

pub fn random_movie_title() -> String {
    pick(MOVIE_TITLES, "The Unexpected Journey")
}

fn pick(pool: &[&str], default: &str) -> String {
    pool.choose(&mut rand::rng())
        .copied()
        .unwrap_or(default)
        .to_string()
}

/// Fixed category for content types whose category is not generated
pub fn default_category(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Acronym => "Random",
        ContentType::Date => "Historical Event",
        ContentType::Movie => "Movie Plot",
    }
}

pub fn round_content(content_type: ContentType, round_no: u32) -> RoundContent {
    let (content, category) = match content_type {
        ContentType::Acronym => (letters(round_no), random_category()),
        ContentType::Date => (random_date(), default_category(content_type).to_string()),
        ContentType::Movie => (
            random_movie_title(),
            default_category(content_type).to_string(),
        ),
    };

    RoundContent {
        content_type,
        content,
        category,
    }
}

fn acronym_word(letter: char) -> String {
    let word = match letter.to_ascii_uppercase() {
        'A' => "Amazing",
        'B' => "Beautiful",
        'C' => "Creative",
        'D' => "Delightful",
        'E' => "Elegant",
        'F' => "Fantastic",
        'G' => "Great",
        'H' => "Happy",
        'I' => "Incredible",
        'J' => "Jolly",
        'K' => "Kind",
        'L' => "Lovely",
        'M' => "Magnificent",
        'N' => "Nice",
        'O' => "Outstanding",
        'P' => "Perfect",
        'Q' => "Quick",
        'R' => "Remarkable",
        'S' => "Super",
        'T' => "Terrific",
        'U' => "Unique",
        'V' => "Vibrant",
        'W' => "Wonderful",
        'X' => "Xcellent",
        'Y' => "Young",
        'Z' => "Zealous",
        other => return format!("{}ot", other),
    };
    word.to_string()
}

/// Deterministic bot answer for the given content
pub fn bot_submission(content_type: ContentType, content: &str) -> String {
    match content_type {
        ContentType::Acronym => content
            .chars()
            .filter(|c| c.is_alphanumeric())
            .map(acronym_word)
            .collect::<Vec<_>>()
            .join(" "),
        ContentType::Date => format!(
            "On {}, an unexpected discovery changed how historians viewed this period.",
            content
        ),
        ContentType::Movie => format!(
            "\"{}\" follows the journey of an unlikely hero who must overcome personal \
             challenges while saving their community from disaster.",
            content
        ),
    }
}

pub fn random_index(len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    rand::rng().random_range(0..len)
}

/// Offline provider built entirely from the local generators
#[derive(Debug, Default)]
pub struct StaticContentProvider;

#[async_trait]
impl ContentProvider for StaticContentProvider {
    async fn round_content(
        &self,
        content_type: ContentType,
        round_no: u32,
    ) -> ContentResult<RoundContent> {
        Ok(round_content(content_type, round_no))
    }

    async fn bot_submission(
        &self,
        content_type: ContentType,
        content: &str,
        _category: &str,
    ) -> ContentResult<String> {
        Ok(bot_submission(content_type, content))
    }

    async fn rank_submissions(
        &self,
        candidates: &[String],
        _category: &str,
    ) -> ContentResult<usize> {
        Ok(random_index(candidates.len()))
    }

    fn name(&self) -> &str {
        "static"
    }
}

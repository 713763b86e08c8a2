//! Content Provider: round prompts, bot answers and submission ranking.
//!
//! Providers are fallible and may hang. The `*_or_fallback` helpers are the
//! only way the game calls them: each call is bounded by a timeout, retried
//! once, and replaced by a local fallback when it still fails.

pub mod fallback;
mod llm;

use crate::llm::LlmError;
use crate::types::{ContentType, RoundContent};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub use fallback::StaticContentProvider;
pub use llm::LlmContentProvider;

pub type ContentResult<T> = Result<T, ContentError>;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Content request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unusable content: {0}")]
    Unusable(String),
}

#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Prompt for a round: the content players answer and its category
    async fn round_content(
        &self,
        content_type: ContentType,
        round_no: u32,
    ) -> ContentResult<RoundContent>;

    /// An answer a bot submits for the given round content
    async fn bot_submission(
        &self,
        content_type: ContentType,
        content: &str,
        category: &str,
    ) -> ContentResult<String>;

    /// Index of the preferred candidate
    async fn rank_submissions(&self, candidates: &[String], category: &str)
        -> ContentResult<usize>;

    fn name(&self) -> &str;
}

/// Run a provider call with a timeout, retrying once
async fn with_retry<T, F, Fut>(what: &str, timeout: Duration, mut call: F) -> ContentResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ContentResult<T>>,
{
    let mut last_error = ContentError::Timeout(timeout);

    for attempt in 1..=2 {
        match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                tracing::warn!("{} failed (attempt {}): {}", what, attempt, e);
                last_error = e;
            }
            Err(_) => {
                tracing::warn!("{} timed out (attempt {})", what, attempt);
                last_error = ContentError::Timeout(timeout);
            }
        }
    }

    Err(last_error)
}

pub async fn round_content_or_fallback(
    provider: &dyn ContentProvider,
    content_type: ContentType,
    round_no: u32,
    timeout: Duration,
) -> RoundContent {
    let result = with_retry("Round content", timeout, || async move {
        let content = provider.round_content(content_type, round_no).await?;
        if content.content.trim().is_empty() {
            return Err(ContentError::Unusable("empty round content".to_string()));
        }
        Ok(content)
    })
    .await;

    match result {
        Ok(mut content) => {
            content.content_type = content_type;
            if content.category.trim().is_empty() {
                content.category = fallback::default_category(content_type).to_string();
            }
            content
        }
        Err(e) => {
            tracing::warn!("Using fallback {:?} content: {}", content_type, e);
            fallback::round_content(content_type, round_no)
        }
    }
}

pub async fn bot_submission_or_fallback(
    provider: &dyn ContentProvider,
    content: &RoundContent,
    timeout: Duration,
) -> String {
    let result = with_retry("Bot submission", timeout, || async move {
        let text = provider
            .bot_submission(content.content_type, &content.content, &content.category)
            .await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ContentError::Unusable("empty bot submission".to_string()));
        }
        Ok(text)
    })
    .await;

    result.unwrap_or_else(|e| {
        tracing::warn!("Using fallback bot submission: {}", e);
        fallback::bot_submission(content.content_type, &content.content)
    })
}

/// Pick one of `candidates`; `None` only when there is nothing to pick
pub async fn choose_or_fallback(
    provider: &dyn ContentProvider,
    candidates: &[String],
    category: &str,
    timeout: Duration,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    let result = with_retry("Submission ranking", timeout, || async move {
        let index = provider.rank_submissions(candidates, category).await?;
        if index >= candidates.len() {
            return Err(ContentError::Unusable(format!(
                "index {} out of {} candidates",
                index,
                candidates.len()
            )));
        }
        Ok(index)
    })
    .await;

    Some(result.unwrap_or_else(|e| {
        tracing::warn!("Choosing a random submission instead: {}", e);
        fallback::random_index(candidates.len())
    }))
}

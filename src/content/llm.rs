use super::{fallback, ContentError, ContentProvider, ContentResult};
use crate::llm::{GenerateRequest, LlmConfig, LlmManager};
use crate::types::{ContentType, RoundContent};
use async_trait::async_trait;

/// Content Provider backed by the configured LLM providers
pub struct LlmContentProvider {
    manager: LlmManager,
    config: LlmConfig,
}

impl LlmContentProvider {
    pub fn new(manager: LlmManager, config: LlmConfig) -> Self {
        Self { manager, config }
    }

    async fn complete(&self, prompt: String) -> ContentResult<String> {
        let response = self
            .manager
            .generate(GenerateRequest::new(prompt, &self.config))
            .await?;
        let text = clean_line(&response.text);
        if text.is_empty() {
            return Err(ContentError::Unusable("blank completion".to_string()));
        }
        Ok(text)
    }
}

/// First non-empty line of a completion, without wrapping quotes
fn clean_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '*'))
        .trim()
        .to_string()
}

/// Parse a 1-based choice out of a completion like "2" or "Answer 2."
fn parse_choice(text: &str, len: usize) -> Option<usize> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let choice: usize = digits.parse().ok()?;
    (1..=len).contains(&choice).then(|| choice - 1)
}

fn submission_prompt(content_type: ContentType, content: &str, category: &str) -> String {
    match content_type {
        ContentType::Acronym => {
            let letters: Vec<String> = content.chars().map(|c| c.to_string()).collect();
            format!(
                "Generate a creative acronym phrase using the letters {} for the category \"{}\". \
                 Return only the phrase, no explanation.",
                letters.join(", "),
                category
            )
        }
        ContentType::Date => format!(
            "Create a fictional but plausible historical event that happened on \"{}\" \
             that sounds believable. Return only the event, no explanation.",
            content
        ),
        ContentType::Movie => format!(
            "Write a brief, creative movie plot summary (1-2 sentences) for a movie titled \
             \"{}\". Return only the plot summary, no explanation.",
            content
        ),
    }
}

fn ranking_prompt(candidates: &[String], category: &str) -> String {
    let list = candidates
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}. {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "These are answers in a party game round (category: \"{}\"):\n{}\n\n\
         Which answer is the funniest and most creative? Reply with its number only.",
        category, list
    )
}

#[async_trait]
impl ContentProvider for LlmContentProvider {
    async fn round_content(
        &self,
        content_type: ContentType,
        round_no: u32,
    ) -> ContentResult<RoundContent> {
        let (content, category) = match content_type {
            ContentType::Acronym => {
                let category = self
                    .complete(
                        "Generate a single-word category for an acronym game \
                         (e.g., \"Space\", \"Animals\", \"Tech\"). Return only the word, no explanation."
                            .to_string(),
                    )
                    .await?;
                (fallback::letters(round_no), category)
            }
            ContentType::Date => (
                fallback::random_date(),
                fallback::default_category(content_type).to_string(),
            ),
            ContentType::Movie => {
                let title = self
                    .complete(
                        "Generate a fictional but plausible movie title (3-6 words). \
                         Return only the title, no explanation."
                            .to_string(),
                    )
                    .await?;
                (title, fallback::default_category(content_type).to_string())
            }
        };

        Ok(RoundContent {
            content_type,
            content,
            category,
        })
    }

    async fn bot_submission(
        &self,
        content_type: ContentType,
        content: &str,
        category: &str,
    ) -> ContentResult<String> {
        self.complete(submission_prompt(content_type, content, category))
            .await
    }

    async fn rank_submissions(
        &self,
        candidates: &[String],
        category: &str,
    ) -> ContentResult<usize> {
        let response = self
            .manager
            .generate(GenerateRequest::new(
                ranking_prompt(candidates, category),
                &self.config,
            ))
            .await?;

        parse_choice(&response.text, candidates.len()).ok_or_else(|| {
            ContentError::Unusable(format!("no valid choice in {:?}", response.text))
        })
    }

    fn name(&self) -> &str {
        "llm"
    }
}

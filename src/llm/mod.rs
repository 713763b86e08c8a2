mod ollama;
mod openai;

use async_trait::async_trait;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Default instructions sent with every generation request
pub const GAME_SYSTEM_PROMPT: &str =
    "You are a creative assistant helping generate content for a party word game. \
     Answer with the requested text only, without quotes or explanation.";

/// Request for a single completion
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The prompt text
    pub prompt: String,
    /// System instructions (falls back to [`GAME_SYSTEM_PROMPT`])
    pub system: Option<String>,
    /// Maximum response length in tokens (provider-dependent)
    pub max_tokens: Option<u32>,
    /// Timeout for the request
    pub timeout: Duration,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, config: &LlmConfig) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: Some(config.default_max_tokens),
            timeout: config.default_timeout,
            temperature: Some(0.7),
        }
    }

    fn system_prompt(&self) -> &str {
        self.system.as_deref().unwrap_or(GAME_SYSTEM_PROMPT)
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The generated text
    pub text: String,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "openai", "ollama")
    pub provider: String,
    pub model: String,
    /// Tokens consumed (if available)
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
}

/// Trait that all LLM providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Ordered list of providers; earlier ones are preferred
pub struct LlmManager {
    pub providers: Vec<Box<dyn LlmProvider>>,
}

impl LlmManager {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// Ask each provider in turn and return the first usable answer
    pub async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let mut last_error =
            LlmError::ConfigError("No LLM providers configured".to_string());

        for provider in &self.providers {
            match provider.generate(request.clone()).await {
                Ok(response) if !response.text.trim().is_empty() => {
                    tracing::debug!(
                        "{} ({}) answered in {}ms",
                        response.metadata.provider,
                        response.metadata.model,
                        response.metadata.latency_ms
                    );
                    return Ok(response);
                }
                Ok(_) => {
                    tracing::warn!("Provider {} returned an empty answer", provider.name());
                    last_error = LlmError::ParseError(format!(
                        "{} returned an empty answer",
                        provider.name()
                    ));
                }
                Err(e) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub ollama_base_url: Option<String>,
    pub ollama_model: String,
    /// Default timeout for LLM requests
    pub default_timeout: Duration,
    /// Default max tokens for responses
    pub default_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: None,
            ollama_model: "llama3.2".to_string(),
            default_timeout: Duration::from_secs(8),
            default_max_tokens: 100,
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let trimmed = |key: &str| {
            std::env::var(key).ok().and_then(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        };
        let defaults = Self::default();

        Self {
            openai_api_key: trimmed("OPENAI_API_KEY"),
            openai_model: trimmed("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            ollama_base_url: trimmed("OLLAMA_BASE_URL"),
            ollama_model: trimmed("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            default_timeout: trimmed("LLM_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            default_max_tokens: trimmed("LLM_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_max_tokens),
        }
    }

    /// Build an LlmManager with all configured providers
    pub fn build_manager(&self) -> LlmResult<LlmManager> {
        let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();

        if let Some(api_key) = &self.openai_api_key {
            providers.push(Box::new(OpenAiProvider::new(
                api_key.clone(),
                self.openai_model.clone(),
            )));
        }

        if let Some(base_url) = &self.ollama_base_url {
            providers.push(Box::new(OllamaProvider::new(
                base_url.clone(),
                self.ollama_model.clone(),
            )));
        }

        if providers.is_empty() {
            return Err(LlmError::ConfigError(
                "No LLM providers configured. Set OPENAI_API_KEY or OLLAMA_BASE_URL".to_string(),
            ));
        }

        Ok(LlmManager::new(providers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CannedProvider {
        name: &'static str,
        answer: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(&self, _request: GenerateRequest) -> LlmResult<GenerateResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(text) => Ok(GenerateResponse {
                    text: text.to_string(),
                    metadata: ResponseMetadata {
                        provider: self.name.to_string(),
                        model: "canned".to_string(),
                        tokens_used: None,
                        latency_ms: 0,
                    },
                }),
                None => Err(LlmError::ApiError("down".to_string())),
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.ollama_model, "llama3.2");
        assert!(config.build_manager().is_err());
    }

    #[tokio::test]
    async fn test_manager_falls_through_to_next_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = LlmManager::new(vec![
            Box::new(CannedProvider {
                name: "broken",
                answer: None,
                calls: calls.clone(),
            }),
            Box::new(CannedProvider {
                name: "blank",
                answer: Some("   "),
                calls: calls.clone(),
            }),
            Box::new(CannedProvider {
                name: "working",
                answer: Some("Space"),
                calls: calls.clone(),
            }),
        ]);

        let response = manager
            .generate(GenerateRequest::new("category", &LlmConfig::default()))
            .await
            .unwrap();
        assert_eq!(response.text, "Space");
        assert_eq!(response.metadata.provider, "working");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_manager_reports_last_error() {
        let manager = LlmManager::new(vec![Box::new(CannedProvider {
            name: "broken",
            answer: None,
            calls: Arc::new(AtomicUsize::new(0)),
        })]);

        let result = manager
            .generate(GenerateRequest::new("category", &LlmConfig::default()))
            .await;
        assert!(matches!(result, Err(LlmError::ApiError(_))));
    }
}

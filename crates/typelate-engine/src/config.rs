//! Engine configuration.

/// Configuration for a translation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// API key for the hosted model provider.
    pub api_key: String,
    /// Model to use.
    pub model: String,
    /// Maximum tokens in a completion.
    pub max_tokens: u32,
    /// Schema-repair attempts after the first failed validation (0 disables
    /// repair). The engine makes at most `max_repair_attempts + 1` model
    /// calls per translation.
    pub max_repair_attempts: usize,
    /// Transport-level retries for retryable failures (timeouts, rate
    /// limits), handled inside the client with doubling backoff. Distinct
    /// from schema repair.
    pub transport_retries: u32,
    /// Character budget for conversation context included in prompts.
    pub context_budget: usize,
    /// Static instructions prepended to every request prompt.
    pub instructions: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            max_repair_attempts: 2,
            transport_retries: 2,
            context_budget: 4096,
            instructions: None,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = std::env::var("TYPELATE_API_KEY")
            .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
            .unwrap_or_default();

        let model = std::env::var("TYPELATE_MODEL").unwrap_or(defaults.model);

        let max_repair_attempts = std::env::var("TYPELATE_MAX_REPAIR_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_repair_attempts);

        let transport_retries = std::env::var("TYPELATE_TRANSPORT_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.transport_retries);

        Self {
            api_key,
            model,
            max_repair_attempts,
            transport_retries,
            ..defaults
        }
    }

    /// Check if the config can reach a hosted provider.
    pub fn is_valid(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Create a builder for configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for engine configuration.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    pub fn max_repair_attempts(mut self, attempts: usize) -> Self {
        self.config.max_repair_attempts = attempts;
        self
    }

    pub fn transport_retries(mut self, retries: u32) -> Self {
        self.config.transport_retries = retries;
        self
    }

    pub fn context_budget(mut self, chars: usize) -> Self {
        self.config.context_budget = chars;
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Some(text.into());
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalSettings,
    pub context: ContextConfig,
    pub router: RouterConfig,
    pub judge: JudgeConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Display name used in prompts ("the httpx repository").
    pub name: String,
    pub path: String,
    pub index_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub min_score: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Approximate token ceiling for assembled evidence.
    pub budget_tokens: usize,
    pub max_history_turns: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub enabled: bool,
    /// Empty string means "use llm.model".
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub enabled: bool,
    /// Empty string means "use llm.model".
    pub model: String,
    /// Scores at or below this trigger a retry.
    pub retry_threshold: u8,
    /// Scores at or above this are accepted without warning.
    pub accept_threshold: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Generate a "no evidence" answer instead of short-circuiting when
    /// retrieval comes back empty.
    pub allow_no_evidence: bool,
    /// Re-run retrieval before a retry generation instead of reusing the
    /// original evidence set.
    pub re_retrieve: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            name: "the indexed repository".into(),
            path: "./corpus".into(),
            index_path: "./data/index.json".into(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            api_key_env: "CANDOR_API_KEY".into(),
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.3,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_tokens: 3000,
            max_history_turns: 5,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: String::new(),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: String::new(),
            retry_threshold: 2,
            accept_threshold: 5,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            allow_no_evidence: false,
            re_retrieve: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalSettings::default(),
            context: ContextConfig::default(),
            router: RouterConfig::default(),
            judge: JudgeConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CANDOR_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CANDOR_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CANDOR_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("CANDOR_CORPUS_PATH") {
            self.corpus.path = v;
        }
        if let Ok(v) = std::env::var("CANDOR_INDEX_PATH") {
            self.corpus.index_path = v;
        }
    }

    /// Check cross-field consistency after load.
    ///
    /// # Errors
    ///
    /// Returns an error when thresholds or bounds are out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be at least 1".into()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(ConfigError::Invalid(
                "retrieval.min_score must be within [-1, 1]".into(),
            ));
        }
        if !(1..=6).contains(&self.judge.retry_threshold)
            || !(1..=6).contains(&self.judge.accept_threshold)
        {
            return Err(ConfigError::Invalid("judge thresholds must be within 1..=6".into()));
        }
        if self.judge.retry_threshold >= self.judge.accept_threshold {
            return Err(ConfigError::Invalid(
                "judge.retry_threshold must be below judge.accept_threshold".into(),
            ));
        }
        if self.context.max_history_turns == 0 {
            return Err(ConfigError::Invalid(
                "context.max_history_turns must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Router model, falling back to the main generation model.
    #[must_use]
    pub fn router_model(&self) -> &str {
        if self.router.model.is_empty() {
            &self.llm.model
        } else {
            &self.router.model
        }
    }

    /// Judge model, falling back to the main generation model.
    #[must_use]
    pub fn judge_model(&self) -> &str {
        if self.judge.model.is_empty() {
            &self.llm.model
        } else {
            &self.judge.model
        }
    }
}

//! Configuration management.
//!
//! Configuration is read once at startup from an optional TOML file layered
//! with `PAPER_DIGEST_*` environment variables (`__` separates sections, e.g.
//! `PAPER_DIGEST_PIPELINE__SCORE_THRESHOLD=60`). Secrets fall back to their
//! conventional variables (`LLM_API_KEY`, `TAVILY_API_KEY`, `BREVO_API_KEY`,
//! `WEBHOOK_URL`, ...). The resulting [`Config`] is immutable and threaded
//! through every pipeline stage.
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! topics = ["llm agents", "tool use"]
//! categories = ["cs.AI", "cs.CL"]
//! days_start = 7
//! days_end = 0
//!
//! [llm]
//! endpoint = "https://api.openai.com/v1"
//! filter_model = "gpt-4o-mini"
//! scorer_model = "gpt-4o-mini"
//! analyzer_model = "gpt-4o"
//!
//! [pipeline]
//! acceptance_criteria = "Papers about autonomous LLM agents"
//! score_threshold = 60
//! max_items = 5
//!
//! [notify.email]
//! recipients = ["me@example.com"]
//! sender_email = "digest@example.com"
//!
//! [notify.webhook]
//! url = "https://hooks.example.com/T000/B000"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "paper-digest.toml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PAPER_DIGEST";

/// Longest look-back window accepted for `search.days_start`
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// What to fetch
    #[serde(default)]
    pub search: SearchConfig,

    /// Completion API and models
    #[serde(default)]
    pub llm: LlmConfig,

    /// Filtering, scoring and selection
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Community feedback and full text
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Delivery channels
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Source fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Free-text topics; a paper matching any one is a candidate
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Category allow-list (empty admits all)
    #[serde(default)]
    pub categories: Vec<String>,

    /// Window start, in days before now
    #[serde(default = "default_days_start")]
    pub days_start: u32,

    /// Window end, in days before now
    #[serde(default)]
    pub days_end: u32,

    /// Per-request timeout for the preprint API
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            topics: default_topics(),
            categories: Vec::new(),
            days_start: default_days_start(),
            days_end: 0,
            timeout_secs: default_source_timeout(),
        }
    }
}

fn default_topics() -> Vec<String> {
    env_list("SEARCH_TOPICS").unwrap_or_else(|| vec!["machine learning".to_string()])
}

fn default_days_start() -> u32 {
    7
}

fn default_source_timeout() -> u64 {
    120
}

/// Completion API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_api_key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Cheap model used for batch filtering
    #[serde(default = "default_mini_model")]
    pub filter_model: String,

    /// Cheap model used for batch scoring
    #[serde(default = "default_mini_model")]
    pub scorer_model: String,

    /// Stronger model used for the final analysis
    #[serde(default = "default_full_model")]
    pub analyzer_model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Per-request timeout for completion calls
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Batch calls in flight at once within a stage
    #[serde(default = "default_llm_concurrency")]
    pub concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: default_llm_api_key(),
            filter_model: default_mini_model(),
            scorer_model: default_mini_model(),
            analyzer_model: default_full_model(),
            temperature: None,
            timeout_secs: default_llm_timeout(),
            concurrency: default_llm_concurrency(),
        }
    }
}

fn default_llm_endpoint() -> String {
    std::env::var("LLM_API_ENDPOINT").unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

fn default_llm_api_key() -> Option<String> {
    env_string("LLM_API_KEY")
}

fn default_mini_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_full_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_timeout() -> u64 {
    180
}

fn default_llm_concurrency() -> usize {
    4
}

/// Filter, score and selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// What the reader wants to see, in plain words
    #[serde(default = "default_criteria")]
    pub acceptance_criteria: String,

    #[serde(default = "default_filter_batch")]
    pub filter_batch_size: usize,

    #[serde(default = "default_scorer_batch")]
    pub scorer_batch_size: usize,

    /// Minimum score for selection, 1-100
    #[serde(default = "default_threshold")]
    pub score_threshold: u8,

    /// Maximum digest entries
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Score given when the scorer fails or omits a paper
    #[serde(default = "default_threshold")]
    pub neutral_score: u8,

    /// Papers enriched and analyzed concurrently
    #[serde(default = "default_paper_concurrency")]
    pub paper_concurrency: usize,

    /// Send a status notice when a run ends with nothing to digest
    #[serde(default = "default_true")]
    pub notify_on_empty: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            acceptance_criteria: default_criteria(),
            filter_batch_size: default_filter_batch(),
            scorer_batch_size: default_scorer_batch(),
            score_threshold: default_threshold(),
            max_items: default_max_items(),
            neutral_score: default_threshold(),
            paper_concurrency: default_paper_concurrency(),
            notify_on_empty: true,
        }
    }
}

fn default_criteria() -> String {
    env_string("ACCEPTANCE_CRITERIA").unwrap_or_else(|| {
        "Papers related to AI agents, LLMs, or autonomous systems".to_string()
    })
}

fn default_filter_batch() -> usize {
    20
}

fn default_scorer_batch() -> usize {
    10
}

fn default_threshold() -> u8 {
    50
}

fn default_max_items() -> usize {
    5
}

fn default_paper_concurrency() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// Enrichment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Tavily API key; community feedback is skipped without one
    #[serde(default = "default_tavily_key", skip_serializing_if = "Option::is_none")]
    pub tavily_api_key: Option<String>,

    #[serde(default = "default_tavily_endpoint")]
    pub tavily_endpoint: String,

    #[serde(default = "default_search_results")]
    pub max_search_results: usize,

    /// Cap on aggregated feedback text
    #[serde(default = "default_feedback_chars")]
    pub max_feedback_chars: usize,

    #[serde(default = "default_enrichment_timeout")]
    pub search_timeout_secs: u64,

    /// Download and extract PDFs
    #[serde(default = "default_true")]
    pub full_text: bool,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Cap on extracted text kept per paper
    #[serde(default = "default_full_text_chars")]
    pub max_full_text_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: default_tavily_key(),
            tavily_endpoint: default_tavily_endpoint(),
            max_search_results: default_search_results(),
            max_feedback_chars: default_feedback_chars(),
            search_timeout_secs: default_enrichment_timeout(),
            full_text: true,
            download_timeout_secs: default_download_timeout(),
            max_full_text_chars: default_full_text_chars(),
        }
    }
}

fn default_tavily_key() -> Option<String> {
    env_string("TAVILY_API_KEY")
}

fn default_tavily_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_results() -> usize {
    5
}

fn default_feedback_chars() -> usize {
    2000
}

fn default_enrichment_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    60
}

fn default_full_text_chars() -> usize {
    50_000
}

/// Notification channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Per-request timeout for delivery calls
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            email: EmailConfig::default(),
            webhook: WebhookConfig::default(),
            timeout_secs: default_enrichment_timeout(),
        }
    }
}

/// Email delivery through the Brevo transactional API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_recipients")]
    pub recipients: Vec<String>,

    #[serde(default = "default_brevo_key", skip_serializing_if = "Option::is_none")]
    pub brevo_api_key: Option<String>,

    #[serde(default = "default_sender_email", skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,

    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    #[serde(default = "default_brevo_endpoint")]
    pub endpoint: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            recipients: default_recipients(),
            brevo_api_key: default_brevo_key(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
            endpoint: default_brevo_endpoint(),
        }
    }
}

impl EmailConfig {
    /// Email is usable only with recipients, a key and a sender
    pub fn is_configured(&self) -> bool {
        !self.recipients.is_empty() && self.brevo_api_key.is_some() && self.sender_email.is_some()
    }
}

fn default_recipients() -> Vec<String> {
    env_list("EMAIL_ADDRESS_LIST").unwrap_or_default()
}

fn default_brevo_key() -> Option<String> {
    env_string("BREVO_API_KEY")
}

fn default_sender_email() -> Option<String> {
    env_string("BREVO_SENDER_EMAIL")
}

fn default_sender_name() -> String {
    env_string("BREVO_SENDER_NAME").unwrap_or_else(|| "Paper Digest".to_string())
}

fn default_brevo_endpoint() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

/// Generic JSON webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: default_webhook_url(),
        }
    }
}

impl WebhookConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

fn default_webhook_url() -> Option<String> {
    env_string("WEBHOOK_URL")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|v| split_list(&v))
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Check cross-field constraints the types cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.search.topics.iter().all(|t| t.trim().is_empty()) {
            return invalid("search.topics must contain at least one topic".to_string());
        }
        if self.search.days_start > MAX_WINDOW_DAYS {
            return invalid(format!(
                "search.days_start ({}) must be at most {}",
                self.search.days_start, MAX_WINDOW_DAYS
            ));
        }
        if self.search.days_start <= self.search.days_end {
            return invalid(format!(
                "search.days_start ({}) must be greater than search.days_end ({})",
                self.search.days_start, self.search.days_end
            ));
        }
        if self.pipeline.filter_batch_size == 0 || self.pipeline.scorer_batch_size == 0 {
            return invalid("batch sizes must be at least 1".to_string());
        }
        if self.llm.concurrency == 0 || self.pipeline.paper_concurrency == 0 {
            return invalid("concurrency limits must be at least 1".to_string());
        }
        for (name, score) in [
            ("pipeline.score_threshold", self.pipeline.score_threshold),
            ("pipeline.neutral_score", self.pipeline.neutral_score),
        ] {
            if !(1..=100).contains(&score) {
                return invalid(format!("{} must be between 1 and 100, got {}", name, score));
            }
        }
        if self.pipeline.acceptance_criteria.trim().is_empty() {
            return invalid("pipeline.acceptance_criteria must not be empty".to_string());
        }

        let mut urls = vec![
            ("llm.endpoint", self.llm.endpoint.as_str()),
            ("enrichment.tavily_endpoint", self.enrichment.tavily_endpoint.as_str()),
            ("notify.email.endpoint", self.notify.email.endpoint.as_str()),
        ];
        if let Some(webhook) = &self.notify.webhook.url {
            urls.push(("notify.webhook.url", webhook.as_str()));
        }
        for (name, value) in urls {
            url::Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{} is not a valid URL: {}", name, e)))?;
        }

        Ok(())
    }

    /// Number of usable notification channels
    pub fn channel_count(&self) -> usize {
        usize::from(self.notify.email.is_configured())
            + usize::from(self.notify.webhook.is_configured())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        let mut copy = self.clone();
        copy.llm.api_key = mask(&self.llm.api_key);
        copy.enrichment.tavily_api_key = mask(&self.enrichment.tavily_api_key);
        copy.notify.email.brevo_api_key = mask(&self.notify.email.brevo_api_key);
        copy.notify.webhook.url = mask(&self.notify.webhook.url);
        copy
    }

    /// Default configuration with every secret left out, for `init`
    pub fn template() -> Self {
        let mut config = Config::default();
        config.llm.api_key = None;
        config.enrichment.tavily_api_key = None;
        config.notify.email.brevo_api_key = None;
        config.notify.webhook.url = None;
        config
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Load configuration from an optional file plus environment overrides, then validate
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("search.topics")
                .with_list_parse_key("search.categories")
                .with_list_parse_key("notify.email.recipients"),
        )
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Find a configuration file in the default locations
///
/// Looks for `./paper-digest.toml`, then `<config dir>/paper-digest/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paper-digest").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("paper-digest.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::template();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.score_threshold, 50);
        assert_eq!(config.pipeline.max_items, 5);
        assert_eq!(config.search.days_start, 7);
    }

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[search]
topics = ["llm agents", "tool use"]
categories = ["cs.AI"]
days_start = 10
days_end = 3

[llm]
endpoint = "http://localhost:4000/v1"
analyzer_model = "big-model"

[pipeline]
acceptance_criteria = "Agents only"
score_threshold = 70
max_items = 3
notify_on_empty = false

[notify.webhook]
url = "https://hooks.example.com/abc"
"#,
        );

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.search.topics, vec!["llm agents", "tool use"]);
        assert_eq!(config.search.categories, vec!["cs.AI"]);
        assert_eq!(config.search.days_start, 10);
        assert_eq!(config.llm.analyzer_model, "big-model");
        assert_eq!(config.llm.filter_model, "gpt-4o-mini");
        assert_eq!(config.pipeline.score_threshold, 70);
        assert!(!config.pipeline.notify_on_empty);
        assert!(config.notify.webhook.is_configured());
        assert_eq!(config.channel_count(), 1);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = load_config(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "invalid = toml = content");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut config = Config::template();
        config.search.days_start = 2;
        config.search.days_end = 5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_huge_window() {
        let mut config = Config::template();
        config.search.days_start = u32::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.search.days_start = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_webhook_url_from_env_without_file() {
        std::env::set_var("WEBHOOK_URL", "https://hooks.example.com/env");
        let loaded = load_config(None);
        std::env::remove_var("WEBHOOK_URL");

        let config = loaded.unwrap();
        assert_eq!(
            config.notify.webhook.url.as_deref(),
            Some("https://hooks.example.com/env")
        );
        assert_eq!(config.channel_count(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = Config::template();
        config.pipeline.scorer_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_webhook_url() {
        let mut config = Config::template();
        config.notify.webhook.url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_email_requires_all_parts() {
        let mut email = EmailConfig {
            recipients: vec!["a@example.com".to_string()],
            brevo_api_key: Some("key".to_string()),
            sender_email: None,
            sender_name: default_sender_name(),
            endpoint: default_brevo_endpoint(),
        };
        assert!(!email.is_configured());
        email.sender_email = Some("digest@example.com".to_string());
        assert!(email.is_configured());
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = Config::template();
        config.llm.api_key = Some("sk-secret".to_string());
        let shown = config.redacted().to_toml().unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, ,b ,c"), vec!["a", "b", "c"]);
    }
}

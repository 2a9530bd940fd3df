use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use channel_harvester_core::batch::MAX_BATCH_SIZE;
use channel_harvester_core::embedding::RETRIEVAL_DOCUMENT;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    #[serde(default = "default_slack_base_url")]
    pub base_url: String,
    #[serde(default = "default_slack_token_env")]
    pub token_env: String,
    /// `limit` query parameter for history/replies pages.
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub join_before_harvest: bool,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            base_url: default_slack_base_url(),
            token_env: default_slack_token_env(),
            page_size: None,
            join_before_harvest: false,
        }
    }
}

fn default_slack_base_url() -> String {
    "https://slack.com/api".to_string()
}
fn default_slack_token_env() -> String {
    "SLACK_BOT_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarvestConfig {
    /// Pages fetched after the first one. The first page is always fetched.
    #[serde(default = "default_max_extra_pages")]
    pub max_extra_pages: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_size")]
    pub reply_concurrency: usize,
    #[serde(default = "default_max_reply_pages")]
    pub max_reply_pages: usize,
    #[serde(default = "default_datastore")]
    pub datastore: String,
    /// `random` or `stable`.
    #[serde(default = "default_id_strategy")]
    pub id_strategy: String,
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_extra_pages: default_max_extra_pages(),
            batch_size: default_batch_size(),
            reply_concurrency: default_batch_size(),
            max_reply_pages: default_max_reply_pages(),
            datastore: default_datastore(),
            id_strategy: default_id_strategy(),
            persist: true,
        }
    }
}

impl HarvestConfig {
    /// Reply fetches in flight per batch, never more than one batch's worth.
    pub fn effective_reply_concurrency(&self) -> usize {
        self.reply_concurrency.clamp(1, self.batch_size.max(1))
    }
}

fn default_max_extra_pages() -> usize {
    2
}
fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}
fn default_max_reply_pages() -> usize {
    1
}
fn default_datastore() -> String {
    "SampleObjects".to_string()
}
fn default_id_strategy() -> String {
    "random".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_embedding_token_env")]
    pub token_env: String,
    #[serde(default = "default_task_type")]
    pub task_type: String,
    /// Successful responses are appended here, one per line.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            endpoint: None,
            token_env: default_embedding_token_env(),
            task_type: default_task_type(),
            output_path: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_token_env() -> String {
    "EMBEDDING_ACCESS_TOKEN".to_string()
}
fn default_task_type() -> String {
    RETRIEVAL_DOCUMENT.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// Retry/backoff/timeout settings for one class of downstream call.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PolicySettings {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: default_backoff_ms(),
            timeout_secs: None,
        }
    }
}

impl PolicySettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_backoff_ms() -> u64 {
    1000
}

/// Default call policy plus per-operation overrides.
///
/// ```toml
/// [policy]
/// max_retries = 2
///
/// [policy.embed]
/// max_retries = 0
/// timeout_secs = 60
/// ```
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PolicyConfig {
    #[serde(flatten)]
    pub default: PolicySettings,
    #[serde(default)]
    pub history: Option<PolicySettings>,
    #[serde(default)]
    pub replies: Option<PolicySettings>,
    #[serde(default)]
    pub join: Option<PolicySettings>,
    #[serde(default)]
    pub store: Option<PolicySettings>,
    #[serde(default)]
    pub embed: Option<PolicySettings>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate harvest
    if config.harvest.batch_size == 0 || config.harvest.batch_size > MAX_BATCH_SIZE {
        anyhow::bail!("harvest.batch_size must be in 1..={}", MAX_BATCH_SIZE);
    }
    if config.harvest.reply_concurrency == 0 {
        anyhow::bail!("harvest.reply_concurrency must be >= 1");
    }
    if config.harvest.max_reply_pages == 0 {
        anyhow::bail!("harvest.max_reply_pages must be >= 1");
    }
    if config.harvest.datastore.trim().is_empty() {
        anyhow::bail!("harvest.datastore must not be empty");
    }
    match config.harvest.id_strategy.as_str() {
        "random" | "stable" => {}
        other => anyhow::bail!(
            "Unknown id strategy: '{}'. Must be random or stable.",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" => {}
        "http" => {
            if config.embedding.endpoint.as_deref().unwrap_or("").is_empty() {
                anyhow::bail!("embedding.endpoint must be specified when provider is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or http.",
            other
        ),
    }

    Ok(config)
}

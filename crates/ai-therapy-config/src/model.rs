//! Configuration schema for ai-therapy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root config for a therapy session run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TherapyConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub retry: RetryPolicyConfig,
}

/// Anthropic Messages API settings for the client model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaudeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_claude_api_url")]
    pub api_url: String,
    #[serde(default = "default_claude_model")]
    pub model: String,
    #[serde(default = "default_claude_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_claude_api_url(),
            model: default_claude_model(),
            max_tokens: default_claude_max_tokens(),
        }
    }
}

fn default_claude_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_claude_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_claude_max_tokens() -> u32 {
    1000
}

/// Local Ollama server hosting the therapist model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama2".to_string()
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_memory_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_base_url")]
    pub embedding_base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: default_memory_data_dir(),
            retention_days: default_retention_days(),
            openai_api_key: String::new(),
            embedding_model: default_embedding_model(),
            embedding_base_url: default_embedding_base_url(),
            batch_size: default_batch_size(),
        }
    }
}

impl MemoryConfig {
    /// Retention period as a duration.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }
}

fn default_true() -> bool {
    true
}

fn default_memory_data_dir() -> PathBuf {
    PathBuf::from("./memory_data")
}

fn default_retention_days() -> u32 {
    5
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_batch_size() -> usize {
    100
}

/// Dialogue loop and transcript settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_delay_between_messages_ms")]
    pub delay_between_messages_ms: u64,
    /// Transcript path; a timestamped name is chosen at startup when unset.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            delay_between_messages_ms: default_delay_between_messages_ms(),
            output_file: None,
        }
    }
}

impl ConversationConfig {
    /// Pause between consecutive messages.
    pub fn delay_between_messages(&self) -> Duration {
        Duration::from_millis(self.delay_between_messages_ms)
    }
}

fn default_max_rounds() -> u32 {
    100
}

fn default_delay_between_messages_ms() -> u64 {
    3000
}

/// Backoff tuning shared by every remote call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicyConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    120_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

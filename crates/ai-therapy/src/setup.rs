//! Builds runtime components from a loaded `TherapyConfig`.

use crate::clients::{ClaudeClient, OllamaClient};
use ai_therapy_config::{RetryPolicyConfig, TherapyConfig};
use ai_therapy_mcp::{MemoryReader, MemoryToolServer};
use ai_therapy_memory::{
    Embedder, FileMemoryStore, MemoryBank, MemoryError, OpenAiEmbeddingProvider, RemoteError,
    RetryConfig,
};
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Translate configured backoff tuning into executor settings.
pub fn retry_config(policy: &RetryPolicyConfig) -> RetryConfig {
    RetryConfig {
        max_retries: policy.max_retries,
        base_delay: Duration::from_millis(policy.base_delay_ms),
        max_delay: Duration::from_millis(policy.max_delay_ms),
        backoff_factor: policy.backoff_factor,
        ..RetryConfig::default()
    }
}

/// File store for the configured data directory and retention.
pub fn memory_store(config: &TherapyConfig) -> FileMemoryStore {
    FileMemoryStore::new(&config.memory.data_dir, config.memory.retention())
}

/// OpenAI-backed embedder with the configured model, endpoint and retries.
pub fn embedder(config: &TherapyConfig) -> Result<Embedder, RemoteError> {
    let provider = OpenAiEmbeddingProvider::new(config.memory.openai_api_key.clone())?
        .with_model(config.memory.embedding_model.clone())
        .with_base_url(config.memory.embedding_base_url.clone());
    Ok(Embedder::new(Arc::new(provider))
        .with_retry(retry_config(&config.retry))
        .with_batch_size(config.memory.batch_size))
}

/// Read-side MCP server over the configured store.
///
/// Search is keyword-only when no OpenAI key is configured.
pub fn memory_tool_server(config: &TherapyConfig) -> Result<MemoryToolServer, RemoteError> {
    let mut reader = MemoryReader::new(Arc::new(memory_store(config)));
    if config.memory.openai_api_key.is_empty() {
        info!("no OpenAI API key configured, memory search uses keywords only");
    } else {
        reader = reader.with_embedder(embedder(config)?);
    }
    Ok(MemoryToolServer::new(reader))
}

/// Open the memory bank, or `None` when memory is disabled.
pub async fn memory_bank(config: &TherapyConfig) -> Result<Option<Arc<MemoryBank>>, MemoryError> {
    if !config.memory.enabled {
        info!("memory system disabled");
        return Ok(None);
    }
    let bank = MemoryBank::open(Arc::new(memory_store(config)), embedder(config)?).await?;
    info!(
        "memory bank initialized (data_dir={}, retention_days={})",
        config.memory.data_dir.display(),
        config.memory.retention_days
    );
    Ok(Some(Arc::new(bank)))
}

/// Therapist client.
pub fn ollama_client(config: &TherapyConfig) -> Result<OllamaClient, RemoteError> {
    Ok(OllamaClient::new(config.ollama.url.clone(), config.ollama.model.clone())?
        .with_retry(retry_config(&config.retry)))
}

/// Client-role client.
pub fn claude_client(config: &TherapyConfig) -> Result<ClaudeClient, RemoteError> {
    Ok(
        ClaudeClient::new(config.claude.api_key.clone(), config.claude.api_url.clone())?
            .with_model(config.claude.model.clone())
            .with_max_tokens(config.claude.max_tokens)
            .with_retry(retry_config(&config.retry)),
    )
}

#[cfg(test)]
mod tests {
    use super::{memory_bank, memory_tool_server, retry_config};
    use ai_therapy_config::{RetryPolicyConfig, TherapyConfig};
use ai_therapy_mcp::{MemoryReader, MemoryToolServer};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn retry_policy_maps_to_executor_settings() {
        let retry = retry_config(&RetryPolicyConfig {
            max_retries: 5,
            base_delay_ms: 250,
            max_delay_ms: 1_000,
            backoff_factor: 3.0,
        });
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_secs(1));
        assert_eq!(retry.backoff_factor, 3.0);
        assert!(retry.is_retryable("status 503"));
    }

    #[tokio::test]
    async fn disabled_memory_opens_no_bank() {
        let mut config = TherapyConfig::default();
        config.memory.enabled = false;
        assert!(memory_bank(&config).await.expect("bank").is_none());
    }

    #[tokio::test]
    async fn enabled_memory_creates_data_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = TherapyConfig::default();
        config.memory.data_dir = temp.path().join("memories");
        config.memory.openai_api_key = "sk-test".to_string();
        let bank = memory_bank(&config).await.expect("bank");
        assert!(bank.is_some());
        assert!(config.memory.data_dir.is_dir());
    }

    #[test]
    fn tool_server_uses_semantic_search_only_with_a_key() {
        let mut config = TherapyConfig::default();
        config.memory.openai_api_key = String::new();
        let server = memory_tool_server(&config).expect("server");
        assert!(!server.reader().semantic_search_enabled());

        config.memory.openai_api_key = "sk-test".to_string();
        let server = memory_tool_server(&config).expect("server");
        assert!(server.reader().semantic_search_enabled());
    }
}

//! Environment variable overrides applied on top of the merged layers.

use crate::{ConfigError, TherapyConfig};
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

/// Apply every recognised, non-empty variable returned by `lookup`.
///
/// Returns the number of overrides applied.
pub(super) fn apply_env_overrides<F>(
    config: &mut TherapyConfig,
    lookup: F,
) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
    let mut applied = 0;
    let mut note = |key: &str| {
        debug!("applied env override (key={key})");
        applied += 1;
    };

    if let Some(value) = get("CLAUDE_API_KEY") {
        config.claude.api_key = value;
        note("CLAUDE_API_KEY");
    }
    if let Some(value) = get("CLAUDE_API_URL") {
        config.claude.api_url = value;
        note("CLAUDE_API_URL");
    }
    if let Some(value) = get("OLLAMA_URL") {
        config.ollama.url = value;
        note("OLLAMA_URL");
    }
    if let Some(value) = get("OLLAMA_MODEL") {
        config.ollama.model = value;
        note("OLLAMA_MODEL");
    }
    if let Some(value) = get("MEMORY_ENABLED") {
        config.memory.enabled = value == "true";
        note("MEMORY_ENABLED");
    }
    if let Some(value) = get("MEMORY_DATA_DIR") {
        config.memory.data_dir = PathBuf::from(value);
        note("MEMORY_DATA_DIR");
    }
    if let Some(value) = get("MEMORY_RETENTION_DAYS") {
        config.memory.retention_days = parse_number("MEMORY_RETENTION_DAYS", &value)?;
        note("MEMORY_RETENTION_DAYS");
    }
    if let Some(value) = get("OPENAI_API_KEY") {
        config.memory.openai_api_key = value;
        note("OPENAI_API_KEY");
    }
    if let Some(value) = get("MAX_ROUNDS") {
        config.conversation.max_rounds = parse_number("MAX_ROUNDS", &value)?;
        note("MAX_ROUNDS");
    }
    if let Some(value) = get("DELAY_BETWEEN_MSG") {
        let delay = parse_duration(&value)
            .ok_or_else(|| invalid_env("DELAY_BETWEEN_MSG", &format!("invalid duration {value:?}")))?;
        config.conversation.delay_between_messages_ms =
            u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        note("DELAY_BETWEEN_MSG");
    }
    if let Some(value) = get("OUTPUT_FILE") {
        config.conversation.output_file = Some(PathBuf::from(value));
        note("OUTPUT_FILE");
    }

    Ok(applied)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| invalid_env(key, &format!("invalid value {value:?}: {err}")))
}

fn invalid_env(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        path: format!("env:{key}"),
        message: message.to_string(),
    }
}

/// Parse durations such as `3s`, `500ms`, `1m30s` or `1.5h`.
///
/// Accepts the units `ns`, `us`, `µs`, `ms`, `s`, `m` and `h`; a bare `0`
/// is zero. Negative durations are rejected.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text == "0" {
        return Some(Duration::ZERO);
    }
    let mut rest = text.strip_prefix('+').unwrap_or(text);
    if rest.is_empty() {
        return None;
    }

    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        nanos += value * unit_nanos;
        rest = &rest[unit_len..];
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}

//! Command implementations

pub mod classify;
pub mod init;
pub mod normalize;
pub mod repair;
pub mod synthesize;
pub mod transform;

use anyhow::{Context, Result};
use sqlforge_core::Config;
use sqlforge_core::llm::{self, LLMProvider};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Literal text, `@path` for a file, or `-` for stdin
pub fn read_text_arg(value: &str) -> Result<String> {
    if value == "-" {
        return read_stdin();
    }
    match value.strip_prefix('@') {
        Some(path) => read_file(Path::new(path)),
        None => Ok(value.to_string()),
    }
}

pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
    Ok(text)
}

/// Destination schema file as JSON
pub fn read_schema(path: &Path) -> Result<serde_json::Value> {
    let text = read_file(path)?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Backend described by the config, checked for credentials
pub async fn backend(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider = llm::provider_from_config(config.backend.clone())
        .context("Failed to configure the generative backend")?;

    if !provider.is_available().await {
        anyhow::bail!(
            "backend '{}' is not usable: set ${}",
            provider.name(),
            config.backend.api_key_env.as_deref().unwrap_or("<api key>")
        );
    }
    tracing::debug!("Using {} model {}", provider.name(), provider.model());
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_text_arg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("err.txt");
        std::fs::write(&path, "Syntax error: x").unwrap();

        assert_eq!(read_text_arg("plain text").unwrap(), "plain text");
        assert_eq!(read_text_arg(&format!("@{}", path.display())).unwrap(), "Syntax error: x");
        assert!(read_text_arg("@/definitely/not/here.txt").is_err());
    }

    #[test]
    fn test_read_schema() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("schema.json");
        let bad = dir.path().join("bad.json");
        std::fs::write(&good, r#"{"fields": [{"name": "id", "type": "STRING"}]}"#).unwrap();
        std::fs::write(&bad, "fields: id").unwrap();

        assert!(read_schema(&good).unwrap()["fields"].is_array());
        let err = read_schema(&bad).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[tokio::test]
    async fn test_backend_without_key_is_rejected() {
        let mut config = Config::default();
        config.backend = sqlforge_core::llm::BackendConfig::openai("gpt-4o");
        config.backend.api_key_env = Some("SQLFORGE_TEST_UNSET_KEY_VARIABLE".to_string());

        let err = backend(&config).await.err().unwrap();
        assert!(err.to_string().contains("SQLFORGE_TEST_UNSET_KEY_VARIABLE"));
    }
}

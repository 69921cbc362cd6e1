//! Core functionality for sqlforge
//!
//! Synthesis and repair of warehouse transformation scripts through a
//! generative backend, plus the configuration the binary loads.

pub mod llm;
pub mod synthesis;

use anyhow::{Context, Result};
use llm::{BackendConfig, SamplingConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upper bound for a single backoff wait
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Commented starting point for `sqlforge.toml`
pub const EXAMPLE_CONFIG: &str = r#"# sqlforge configuration

[backend]
provider = "vertex"
base_url = "https://us-central1-aiplatform.googleapis.com/v1/projects/my-project/locations/us-central1/endpoints/openapi"
api_key_env = "VERTEX_ACCESS_TOKEN"
model = "google/gemini-2.0-flash-001"
timeout_secs = 120

[sampling]
temperature = 0.2
max_output_tokens = 8192
top_p = 0.95
top_k = 40

[repair]
max_attempts = 3
call_timeout_secs = 120
max_retries = 2
initial_backoff_ms = 500
"#;

/// How the caller-owned repair loop behaves
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepairPolicy {
    /// Validation runs, counting the first synthesized script
    pub max_attempts: u32,

    /// Deadline for one backend call
    pub call_timeout_secs: u64,

    /// Extra tries for a retryable backend failure
    pub max_retries: u32,

    pub initial_backoff_ms: u64,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, call_timeout_secs: 120, max_retries: 2, initial_backoff_ms: 500 }
    }
}

impl RepairPolicy {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Wait before retry number `retry` (0-based), doubling each time
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor)).min(MAX_BACKOFF)
    }
}

/// Configuration structure for sqlforge
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub sampling: SamplingConfig,
    pub repair: RepairPolicy,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&content).context("Failed to parse sqlforge config")?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize sqlforge config")?;

        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// File at `path` if given, defaults otherwise, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.backend.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.repair.max_attempts == 0 {
            anyhow::bail!("repair.max_attempts must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.sampling.temperature) {
            anyhow::bail!("sampling.temperature must be within 0.0..=2.0");
        }
        if self.sampling.max_output_tokens == 0 {
            anyhow::bail!("sampling.max_output_tokens must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend.provider, "ollama");
        assert_eq!(config.repair.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.backend.provider, "vertex");
        assert_eq!(config.backend.auth_header, "Authorization");
        assert_eq!(config.sampling, SamplingConfig::default());
        assert_eq!(config.repair, RepairPolicy::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[repair]\nmax_attempts = 5\n").unwrap();
        assert_eq!(config.repair.max_attempts, 5);
        assert_eq!(config.repair.max_retries, 2);
        assert_eq!(config.backend, BackendConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sqlforge.toml");

        let mut config = Config::default();
        config.backend = BackendConfig::openai("gpt-4o");
        config.repair.max_attempts = 7;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_error_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("absent.toml"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.repair.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RepairPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(40), MAX_BACKOFF);
    }
}

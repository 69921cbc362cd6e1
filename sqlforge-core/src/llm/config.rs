//! Backend connection settings
//!
//! Every supported service speaks the OpenAI-compatible chat completions
//! protocol; they differ only in base URL, authentication and model name.

use serde::{Deserialize, Serialize};

/// Environment variable that replaces the configured model
pub const MODEL_ENV: &str = "SQLFORGE_MODEL";

/// Connection settings for a generative backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: String,
    pub base_url: String,
    /// Environment variable holding the API key; `None` sends no auth header
    pub api_key_env: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub auth_header: String,
    pub auth_prefix: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::ollama("qwen2.5-coder:7b")
    }
}

impl BackendConfig {
    /// Gemini on Vertex AI through its OpenAI-compatible endpoint.
    /// The bearer token is read from `VERTEX_ACCESS_TOKEN`
    /// (e.g. `gcloud auth print-access-token`).
    pub fn vertex(project: &str, location: &str, model: &str) -> Self {
        let host = format!("https://{location}-aiplatform.googleapis.com");
        let endpoint = format!("{host}/v1/projects/{project}/locations/{location}");
        Self {
            provider: "vertex".to_string(),
            base_url: format!("{endpoint}/endpoints/openapi"),
            api_key_env: Some("VERTEX_ACCESS_TOKEN".to_string()),
            model: if model.contains('/') { model.to_string() } else { format!("google/{model}") },
            timeout_secs: 120,
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer".to_string(),
        }
    }

    /// Create config for OpenAI
    pub fn openai(model: &str) -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: model.to_string(),
            timeout_secs: 120,
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer".to_string(),
        }
    }

    /// Create config for a local Ollama server
    pub fn ollama(model: &str) -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            api_key_env: None,
            model: model.to_string(),
            timeout_secs: 300,
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer".to_string(),
        }
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
    }

    /// Header value for the configured key, if any
    pub fn auth_value(&self, api_key: &str) -> String {
        if self.auth_prefix.is_empty() {
            api_key.to_string()
        } else {
            format!("{} {}", self.auth_prefix, api_key)
        }
    }
}

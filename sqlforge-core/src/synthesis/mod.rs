//! Transformation script synthesis and repair
//!
//! Turns a (source, destination, schema) request into a single
//! `CREATE OR REPLACE TABLE` script through a generative backend, and
//! revises such a script given one warehouse diagnostic. Both operations are
//! one-shot; iteration belongs to the caller.

pub mod analysis;
pub mod classifier;
pub mod diff;
pub mod engine;
pub mod extractor;
pub mod normalizer;
pub mod prompts;
pub mod schema;
pub mod state;

pub use analysis::{DefaultedField, defaulted_fields};
pub use classifier::{DiagnosticDetails, ErrorCategory, ErrorDiagnosis, classify};
pub use diff::ScriptDiff;
pub use engine::{RepairOutcome, RepairService, SynthesisService};
pub use extractor::extract_script;
pub use normalizer::{
    NormalizationReport, RuleId, canonical_prefix, normalize, normalize_with_report,
};
pub use prompts::{PromptBuilder, RepairPromptBuilder};
pub use schema::{FieldMode, SchemaDescriptor, SchemaField, TransformationRequest};
pub use state::{Stage, StageTrace};

use thiserror::Error;

/// Diagnostic text carried in error messages is cut to this many characters
const ERROR_CONTEXT_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Invalid transformation request: {0}")]
    InvalidRequest(String),

    #[error("Invalid destination schema: {0}")]
    InvalidSchema(String),

    #[error("Script generation failed: {message}")]
    Generation {
        message: String,
        #[source]
        source: crate::llm::LLMError,
    },

    #[error("Script repair failed: {message}")]
    Repair {
        message: String,
        #[source]
        source: crate::llm::LLMError,
    },
}

impl SynthesisError {
    pub(crate) fn generation(
        request: &TransformationRequest,
        source: crate::llm::LLMError,
    ) -> Self {
        Self::Generation {
            message: format!(
                "{} -> {}: {}",
                request.source_ref, request.destination_ref, source
            ),
            source,
        }
    }

    pub(crate) fn repair(diagnostic: &str, source: crate::llm::LLMError) -> Self {
        Self::Repair {
            message: format!(
                "{} (diagnostic: {})",
                source,
                truncate(diagnostic, ERROR_CONTEXT_CHARS)
            ),
            source,
        }
    }

    /// Whether the underlying backend failure is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation { source, .. } | Self::Repair { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn backend_error(&self) -> Option<&crate::llm::LLMError> {
        match self {
            Self::Generation { source, .. } | Self::Repair { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

/// First `max` characters of `text`, with an ellipsis when cut
pub(crate) fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMError;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_repair_error_carries_diagnostic() {
        let diagnostic = "x".repeat(1000);
        let err = SynthesisError::repair(&diagnostic, LLMError::network("reset"));
        let text = err.to_string();
        assert!(text.starts_with("Script repair failed: Network error: reset"));
        assert!(text.len() < 400);
        assert!(err.is_retryable());
    }
}

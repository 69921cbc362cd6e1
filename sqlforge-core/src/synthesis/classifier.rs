//! Warehouse diagnostic classification

use serde::{Deserialize, Serialize};
use sql_patterns::diagnostic;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    MissingFieldReference,
    GenericSyntax,
    Unclassified,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingFieldReference => "missing field reference",
            Self::GenericSyntax => "syntax",
            Self::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// Secondary facts pulled from the diagnostic, all optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrecognized_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_error: Option<String>,
    /// `line:column` from a trailing `[at l:c]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl DiagnosticDetails {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDiagnosis {
    pub category: ErrorCategory,
    pub offending_field: Option<String>,
    pub raw_message: String,
    #[serde(default)]
    pub details: DiagnosticDetails,
}

/// Classify a diagnostic. Unmatched text is `Unclassified`, never an error.
pub fn classify(diagnostic_text: &str) -> ErrorDiagnosis {
    let details = DiagnosticDetails {
        invalid_field: diagnostic::capture(&diagnostic::INVALID_FIELD_NAME, diagnostic_text),
        unrecognized_name: diagnostic::capture(&diagnostic::UNRECOGNIZED_NAME, diagnostic_text),
        syntax_error: diagnostic::capture(&diagnostic::SYNTAX_ERROR, diagnostic_text),
        location: diagnostic::capture(&diagnostic::LOCATION, diagnostic_text),
    };

    let (category, offending_field) = match diagnostic::missing_field(diagnostic_text) {
        Some(field) => (ErrorCategory::MissingFieldReference, Some(field)),
        None if diagnostic::looks_like_syntax_error(diagnostic_text) => {
            (ErrorCategory::GenericSyntax, None)
        }
        None => (ErrorCategory::Unclassified, None),
    };

    ErrorDiagnosis { category, offending_field, raw_message: diagnostic_text.to_string(), details }
}

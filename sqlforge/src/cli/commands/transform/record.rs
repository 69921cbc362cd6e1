//! Run record for one transform invocation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlforge_core::synthesis::{DefaultedField, ErrorCategory};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

/// One validation of one candidate script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub number: u32,
    pub script: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    /// Destination fields this script fills with a literal placeholder
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted_fields: Vec<DefaultedField>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempts: Vec<AttemptRecord>,
    pub metadata: BTreeMap<String, String>,
}

impl RunRecord {
    pub fn new(metadata: BTreeMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: RunState::Running,
            created_at: now,
            updated_at: now,
            attempts: Vec::new(),
            metadata,
        }
    }

    pub fn push_attempt(&mut self, attempt: AttemptRecord) {
        self.attempts.push(attempt);
        self.touch();
    }

    pub fn finish(&mut self, state: RunState, reason: Option<String>) {
        self.state = state;
        if let Some(reason) = reason {
            self.metadata.insert("failure".to_string(), reason);
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Write as pretty JSON, replacing any previous version
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize run record")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write run record {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_record_is_running() {
        let record = RunRecord::new(BTreeMap::new());
        assert_eq!(record.state, RunState::Running);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_finish_records_failure_reason() {
        let mut record = RunRecord::new(BTreeMap::new());
        record.finish(RunState::Failed, Some("budget exhausted".to_string()));
        assert_eq!(record.metadata.get("failure").map(String::as_str), Some("budget exhausted"));
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_saved_json_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs").join("run.json");

        let metadata = BTreeMap::from([("source".to_string(), "p.d.s".to_string())]);
        let mut record = RunRecord::new(metadata);
        record.push_attempt(AttemptRecord {
            number: 1,
            script: "CREATE OR REPLACE TABLE `p.d.t` AS SELECT NULL AS title;".to_string(),
            passed: false,
            diagnostic: Some("Syntax error: x".to_string()),
            category: Some(ErrorCategory::GenericSyntax),
            defaulted_fields: vec![DefaultedField {
                path: "title".to_string(),
                default: "NULL".to_string(),
            }],
            finished_at: Utc::now(),
        });
        record.finish(RunState::Completed, None);
        record.save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["state"], "COMPLETED");
        assert_eq!(json["metadata"]["source"], "p.d.s");
        assert_eq!(json["attempts"][0]["category"], "GenericSyntax");
        assert_eq!(json["attempts"][0]["defaulted_fields"][0]["path"], "title");
        assert!(json["id"].as_str().is_some());
    }
}

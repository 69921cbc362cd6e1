//! Synthesis and repair services
//!
//! Each call makes exactly one backend round trip and keeps no state
//! between calls, so a service can be cloned into as many tasks as needed.
//! Retries, deadlines and repair loops are the caller's business.

use super::classifier::{ErrorDiagnosis, classify};
use super::diff::ScriptDiff;
use super::extractor::extract_script;
use super::normalizer::{NormalizationReport, RuleId, normalize_with_report};
use super::prompts::{PromptBuilder, RepairPromptBuilder};
use super::schema::{SchemaDescriptor, TransformationRequest};
use super::state::{Stage, StageTrace};
use super::{Result, SynthesisError, truncate};
use crate::llm::{LLMProvider, SamplingConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

const PREVIEW_CHARS: usize = 200;

/// Produces the first candidate script for a request
#[derive(Clone)]
pub struct SynthesisService {
    backend: Arc<dyn LLMProvider>,
    sampling: SamplingConfig,
    prompts: PromptBuilder,
}

impl SynthesisService {
    pub fn new(backend: Arc<dyn LLMProvider>, sampling: SamplingConfig) -> Self {
        Self { backend, sampling, prompts: PromptBuilder::new() }
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    /// Validate the inputs and synthesize a normalized script
    pub async fn synthesize(
        &self,
        source_ref: &str,
        destination_ref: &str,
        destination_schema: &serde_json::Value,
    ) -> Result<String> {
        let schema = SchemaDescriptor::from_json(destination_schema)?;
        let request = TransformationRequest::new(source_ref, destination_ref, schema)?;
        Ok(self.synthesize_request(&request).await?.script)
    }

    pub async fn synthesize_request(
        &self,
        request: &TransformationRequest,
    ) -> Result<NormalizationReport> {
        info!("Synthesizing {} -> {}", request.source_ref, request.destination_ref);
        let mut trace = StageTrace::new("synthesize", Stage::Draft);

        let prompt = self.prompts.build(request);
        let raw = match self.backend.generate(&prompt, &self.sampling).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Backend {} failed during synthesis: {}", self.backend.name(), e);
                trace.fail();
                return Err(SynthesisError::generation(request, e));
            }
        };
        debug!("Draft: {}", truncate(&raw, PREVIEW_CHARS));

        let report = finish(&mut trace, &raw, &request.destination_ref);
        info!("Synthesized {} chars for {}", report.script.len(), request.destination_ref);
        Ok(report)
    }
}

/// Result of one repair call
#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
    pub script: String,
    pub diagnosis: ErrorDiagnosis,
    pub normalization: Vec<RuleId>,
    pub diff: ScriptDiff,
}

/// Revises a failed script given the warehouse diagnostic
#[derive(Clone)]
pub struct RepairService {
    backend: Arc<dyn LLMProvider>,
    sampling: SamplingConfig,
    prompts: RepairPromptBuilder,
}

impl RepairService {
    pub fn new(backend: Arc<dyn LLMProvider>, sampling: SamplingConfig) -> Self {
        Self { backend, sampling, prompts: RepairPromptBuilder::new() }
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub async fn repair(&self, script: &str, diagnostic_text: &str) -> Result<String> {
        Ok(self.repair_with_report(script, diagnostic_text).await?.script)
    }

    pub async fn repair_with_report(
        &self,
        script: &str,
        diagnostic_text: &str,
    ) -> Result<RepairOutcome> {
        let mut trace = StageTrace::new("repair", Stage::Diagnosing);

        let diagnosis = classify(diagnostic_text);
        info!(
            "Repairing script after {} error{}",
            diagnosis.category,
            diagnosis.offending_field.as_deref().map(|f| format!(" on '{}'", f)).unwrap_or_default()
        );
        let destination = RepairPromptBuilder::recover_destination(script);
        let prompt = self.prompts.build(script, diagnostic_text, &diagnosis);
        trace.advance(Stage::Draft);

        let raw = match self.backend.generate(&prompt, &self.sampling).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Backend {} failed during repair: {}", self.backend.name(), e);
                trace.fail();
                return Err(SynthesisError::repair(diagnostic_text, e));
            }
        };
        debug!("Draft: {}", truncate(&raw, PREVIEW_CHARS));

        let report = finish(&mut trace, &raw, &destination);
        let diff = ScriptDiff::between(script, &report.script);
        info!(
            "Repaired script for {}: +{} -{} lines",
            destination, diff.lines_added, diff.lines_removed
        );

        Ok(RepairOutcome { script: report.script, diagnosis, normalization: report.applied, diff })
    }
}

/// Draft -> Extracted -> Normalized
fn finish(trace: &mut StageTrace, raw: &str, destination_ref: &str) -> NormalizationReport {
    let extracted = extract_script(raw);
    trace.advance(Stage::Extracted);
    debug!("Extracted {} of {} chars", extracted.len(), raw.len());

    let report = normalize_with_report(&extracted, destination_ref);
    trace.advance(Stage::Normalized);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMError;
    use crate::llm::mock::MockLLMProvider;
    use serde_json::json;
    use sql_patterns::statement::count_creations;

    fn synthesis(mock: &MockLLMProvider) -> SynthesisService {
        SynthesisService::new(Arc::new(mock.clone()), SamplingConfig::default())
    }

    fn repairer(mock: &MockLLMProvider) -> RepairService {
        RepairService::new(Arc::new(mock.clone()), SamplingConfig::default())
    }

    fn id_schema() -> serde_json::Value {
        json!({"fields": [{"name": "id", "type": "STRING"}]})
    }

    #[tokio::test]
    async fn test_synthesize_strips_fence_and_quotes_destination() {
        let mock = MockLLMProvider::replying(&[
            "```sql\nCREATE OR REPLACE TABLE proj.ds.dst AS SELECT id FROM src;\n```",
        ]);
        let script = synthesis(&mock)
            .synthesize("proj.ds.src", "proj.ds.dst", &id_schema())
            .await
            .unwrap();

        assert_eq!(script, "CREATE OR REPLACE TABLE `proj.ds.dst` AS SELECT id FROM src;");
        assert_eq!(mock.call_count(), 1);
        assert!(mock.prompts()[0].contains("`proj.ds.src`"));
    }

    #[tokio::test]
    async fn test_synthesize_output_has_one_creation_statement() {
        let mock = MockLLMProvider::replying(&[
            "Here is the SQL:\nSELECT id FROM `proj.ds.src`",
            "CREATE OR REPLACE TABLE `proj.ds.dst` AS SELECT 1 AS id;\n\
             CREATE OR REPLACE TABLE `proj.ds.dst` AS SELECT id FROM `proj.ds.src`;",
        ]);
        let service = synthesis(&mock);

        for _ in 0..2 {
            let script =
                service.synthesize("proj.ds.src", "proj.ds.dst", &id_schema()).await.unwrap();
            assert!(script.to_uppercase().starts_with("CREATE OR REPLACE TABLE"));
            assert_eq!(count_creations(&script), 1);
        }
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_backend() {
        let mock = MockLLMProvider::new();
        let service = synthesis(&mock);

        let err = service
            .synthesize("proj.ds.src", "proj.ds.dst", &json!({"fields": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidSchema(_)));

        let err = service.synthesize("", "proj.ds.dst", &id_schema()).await.unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidRequest(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_retried() {
        let mock = MockLLMProvider::new();
        mock.push_error(LLMError::rate_limit("quota", None));

        let err = synthesis(&mock)
            .synthesize("proj.ds.src", "proj.ds.dst", &id_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Generation { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("proj.ds.src -> proj.ds.dst"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_sampling_is_passed_unchanged() {
        let mock = MockLLMProvider::replying(&["SELECT 1"]);
        let sampling =
            SamplingConfig { temperature: 0.0, max_output_tokens: 1024, top_p: 0.5, top_k: 1 };
        let service = SynthesisService::new(Arc::new(mock.clone()), sampling);

        service.synthesize("a.b.s", "a.b.d", &id_schema()).await.unwrap();
        assert_eq!(mock.last_sampling(), Some(sampling));
        assert_eq!(service.sampling(), &sampling);
    }

    #[tokio::test]
    async fn test_repair_missing_field() {
        let failed = "CREATE OR REPLACE TABLE `proj.ds.dst` AS\nSELECT\n  \
                      ARRAY(SELECT c FROM UNNEST(colorFamilies) c) AS colorFamilies\n\
                      FROM `proj.ds.src`;";
        let error = "Invalid field reference 'colorFamilies'. Field does not exist [at 3:30]";
        let mock = MockLLMProvider::replying(&[
            "```sql\nCREATE OR REPLACE TABLE `proj.ds.dst` AS\nSELECT\n  \
             ARRAY(SELECT CAST('Default Color' AS STRING)) AS colorFamilies\n\
             FROM `proj.ds.src`;\n```",
        ]);

        let outcome = repairer(&mock).repair_with_report(failed, error).await.unwrap();

        assert_eq!(outcome.diagnosis.offending_field.as_deref(), Some("colorFamilies"));
        assert!(outcome.script.starts_with("CREATE OR REPLACE TABLE `proj.ds.dst` AS"));
        assert!(outcome.script.contains("'Default Color'"));
        assert_eq!((outcome.diff.lines_added, outcome.diff.lines_removed), (1, 1));
        assert!(mock.prompts()[0].contains("The field 'colorFamilies' does not exist"));
    }

    #[tokio::test]
    async fn test_repair_without_recoverable_destination() {
        let mock = MockLLMProvider::replying(&["SELECT 1 AS id"]);
        let script = repairer(&mock)
            .repair("SELECT id FROM", "Syntax error: Unexpected end of script")
            .await
            .unwrap();
        assert_eq!(script, "CREATE OR REPLACE TABLE `destination_table` AS\nSELECT 1 AS id;");
    }

    #[tokio::test]
    async fn test_repair_failure_carries_diagnostic() {
        let mock = MockLLMProvider::new();
        mock.push_error(LLMError::auth("bad token"));

        let err = repairer(&mock)
            .repair("CREATE OR REPLACE TABLE `a.b.c` AS SELECT x", "Unrecognized name: x [at 1:40]")
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::Repair { .. }));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Unrecognized name: x"));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let mock = MockLLMProvider::replying(&["SELECT a FROM s", "SELECT a FROM s"]);
        let service = synthesis(&mock);
        let other = service.clone();
        let schema = id_schema();

        let (first, second) = tokio::join!(
            service.synthesize("p.d.s", "p.d.one", &schema),
            other.synthesize("p.d.s", "p.d.two", &schema),
        );

        assert!(first.unwrap().starts_with("CREATE OR REPLACE TABLE `p.d.one` AS"));
        assert!(second.unwrap().starts_with("CREATE OR REPLACE TABLE `p.d.two` AS"));
        assert_eq!(mock.call_count(), 2);
    }
}

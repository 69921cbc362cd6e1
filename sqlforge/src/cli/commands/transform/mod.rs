//! Transform command: the caller-owned synthesize/validate/repair loop
//!
//! The core services make one backend call each and never loop. This
//! command owns the attempt budget, the per-call deadline and backoff, and
//! the run record.

pub mod record;
pub mod retry;
pub mod validator;

use super::{backend, read_schema};
use crate::cli::app::TransformArgs;
use anyhow::{Context, Result};
use record::{AttemptRecord, RunRecord, RunState};
use retry::with_retries;
use sqlforge_core::synthesis::{
    RepairService, SchemaDescriptor, SynthesisService, TransformationRequest, classify,
    defaulted_fields,
};
use sqlforge_core::{Config, RepairPolicy};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use validator::{CommandValidator, ScriptValidator, Validation};

/// Execute the transform command
pub async fn execute(args: TransformArgs, config: &Config) -> Result<()> {
    let schema = SchemaDescriptor::from_json(&read_schema(&args.schema)?)?;
    let request = TransformationRequest::new(&args.source, &args.destination, schema)?;

    let mut policy = config.repair;
    if let Some(max_attempts) = args.max_attempts {
        if max_attempts == 0 {
            anyhow::bail!("--max-attempts must be at least 1");
        }
        policy.max_attempts = max_attempts;
    }

    let backend = backend(config).await?;
    let metadata = BTreeMap::from([
        ("source".to_string(), request.source_ref.clone()),
        ("destination".to_string(), request.destination_ref.clone()),
        ("provider".to_string(), backend.name().to_string()),
        ("model".to_string(), backend.model().to_string()),
        ("validator".to_string(), args.validate_cmd.clone()),
    ]);
    let mut record = RunRecord::new(metadata);
    info!(
        run_id = %record.id,
        "Transforming {} -> {}", request.source_ref, request.destination_ref
    );

    let runner = TransformLoop::new(
        SynthesisService::new(backend.clone(), config.sampling),
        RepairService::new(backend, config.sampling),
        CommandValidator::new(args.validate_cmd),
        policy,
    );
    let script = runner.run(&request, &mut record, args.report.as_deref()).await?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", script))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} after {} attempt(s)", path.display(), record.attempts.len());
        }
        None => println!("{}", script),
    }
    Ok(())
}

pub struct TransformLoop<V> {
    synthesis: SynthesisService,
    repair: RepairService,
    validator: V,
    policy: RepairPolicy,
}

impl<V: ScriptValidator> TransformLoop<V> {
    pub fn new(
        synthesis: SynthesisService,
        repair: RepairService,
        validator: V,
        policy: RepairPolicy,
    ) -> Self {
        Self { synthesis, repair, validator, policy }
    }

    /// Returns the first script the validator accepts. `record` ends
    /// `COMPLETED` or `FAILED` and is written to `report` after every step.
    pub async fn run(
        &self,
        request: &TransformationRequest,
        record: &mut RunRecord,
        report: Option<&Path>,
    ) -> Result<String> {
        let result = self.drive(request, record, report).await;

        match &result {
            Ok(_) => record.finish(RunState::Completed, None),
            Err(e) => record.finish(RunState::Failed, Some(format!("{:#}", e))),
        }
        persist(record, report)?;
        result
    }

    async fn drive(
        &self,
        request: &TransformationRequest,
        record: &mut RunRecord,
        report: Option<&Path>,
    ) -> Result<String> {
        persist(record, report)?;

        let synthesis = &self.synthesis;
        let mut script = with_retries(&self.policy, "synthesize", move || async move {
            synthesis.synthesize_request(request).await.map(|r| r.script)
        })
        .await
        .context("Synthesis failed")?;

        for number in 1..=self.policy.max_attempts {
            let diagnostic = match self.validator.validate(&script).await? {
                Validation::Passed => {
                    record.push_attempt(attempt(number, &script, None, request));
                    persist(record, report)?;
                    info!("Attempt {} passed validation", number);
                    return Ok(script);
                }
                Validation::Failed { diagnostic } => diagnostic,
            };

            record.push_attempt(attempt(number, &script, Some(&diagnostic), request));
            persist(record, report)?;
            warn!(
                "Attempt {} of {} failed: {}",
                number,
                self.policy.max_attempts,
                first_line(&diagnostic)
            );

            if number == self.policy.max_attempts {
                anyhow::bail!(
                    "script still fails after {} attempt(s): {}",
                    number,
                    first_line(&diagnostic)
                );
            }

            let repair = &self.repair;
            let current = script.as_str();
            let error = diagnostic.as_str();
            script = with_retries(&self.policy, "repair", move || repair.repair(current, error))
                .await
                .with_context(|| format!("Repair after attempt {} failed", number))?;
        }

        anyhow::bail!("no validation attempts allowed")
    }
}

fn attempt(
    number: u32,
    script: &str,
    diagnostic: Option<&str>,
    request: &TransformationRequest,
) -> AttemptRecord {
    AttemptRecord {
        number,
        script: script.to_string(),
        passed: diagnostic.is_none(),
        diagnostic: diagnostic.map(str::to_string),
        category: diagnostic.map(|d| classify(d).category),
        defaulted_fields: defaulted_fields(script, &request.destination_schema),
        finished_at: chrono::Utc::now(),
    }
}

fn persist(record: &RunRecord, report: Option<&Path>) -> Result<()> {
    match report {
        Some(path) => record.save(path),
        None => Ok(()),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

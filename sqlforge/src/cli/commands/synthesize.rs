//! Synthesize command

use super::{backend, read_schema};
use crate::cli::app::SynthesizeArgs;
use anyhow::{Context, Result};
use sqlforge_core::Config;
use sqlforge_core::synthesis::{
    SchemaDescriptor, SynthesisService, TransformationRequest, defaulted_fields,
};
use tracing::info;

/// Execute the synthesize command
pub async fn execute(args: SynthesizeArgs, config: &Config) -> Result<()> {
    let schema = SchemaDescriptor::from_json(&read_schema(&args.schema)?)?;
    let request = TransformationRequest::new(&args.source, &args.destination, schema)?;

    let service = SynthesisService::new(backend(config).await?, config.sampling);
    let report = service
        .synthesize_request(&request)
        .await
        .with_context(|| format!("Failed to synthesize {}", request.destination_ref))?;

    println!("{}", report.script);

    if args.report {
        if report.was_canonical() {
            eprintln!("normalization: no changes");
        } else {
            let rules: Vec<&str> = report.applied.iter().map(|r| r.as_str()).collect();
            eprintln!("normalization: {}", rules.join(", "));
        }
        for field in defaulted_fields(&report.script, &request.destination_schema) {
            eprintln!("defaulted: {} = {}", field.path, field.default);
        }
    }
    info!("Synthesis finished for {}", request.destination_ref);
    Ok(())
}

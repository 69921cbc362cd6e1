use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sqlforge",
    version,
    about = "SQLForge - generate and repair BigQuery transformation scripts",
    long_about = "SQLForge asks a generative backend for a CREATE OR REPLACE TABLE script \
                  that maps a source table onto a destination schema, normalizes the result, \
                  and revises it from warehouse error messages."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a transformation script
    #[command(about = "Generate a transformation script for a source/destination pair")]
    Synthesize(SynthesizeArgs),

    /// Repair a failed script
    #[command(about = "Revise a script using the error the warehouse reported")]
    Repair(RepairArgs),

    /// Classify a warehouse error
    #[command(about = "Print the structured diagnosis of a warehouse error as JSON")]
    Classify(ClassifyArgs),

    /// Normalize a script without calling the backend
    #[command(about = "Apply the normalization rules to an existing script")]
    Normalize(NormalizeArgs),

    /// Synthesize, validate and repair until the script passes
    #[command(about = "Run the synthesize/validate/repair loop with an external validator")]
    Transform(TransformArgs),

    /// Write an example configuration file
    #[command(about = "Write a commented example sqlforge.toml")]
    Init(InitArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct SynthesizeArgs {
    /// Fully-qualified source table (project.dataset.table)
    #[arg(short, long)]
    pub source: String,

    /// Fully-qualified destination table (project.dataset.table)
    #[arg(short, long)]
    pub destination: String,

    /// JSON file with the destination schema
    #[arg(long)]
    pub schema: PathBuf,

    /// Also print which normalization rules fired and which fields were defaulted
    #[arg(long)]
    pub report: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RepairArgs {
    /// File holding the failed script
    #[arg(long)]
    pub script: PathBuf,

    /// Error text, `@file` to read it from a file, or `-` for stdin
    #[arg(short, long)]
    pub error: String,

    /// Print a unified diff against the failed script to stderr
    #[arg(long)]
    pub diff: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ClassifyArgs {
    /// Error text, `@file` to read it from a file, or `-` for stdin
    #[arg(short, long)]
    pub error: String,
}

#[derive(Parser, Debug, Clone)]
pub struct NormalizeArgs {
    /// Destination table the script must create
    #[arg(short, long)]
    pub destination: String,

    /// Script file; stdin when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Print the report (script and applied rules) as JSON
    #[arg(long)]
    pub report: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct TransformArgs {
    /// Fully-qualified source table (project.dataset.table)
    #[arg(short, long)]
    pub source: String,

    /// Fully-qualified destination table (project.dataset.table)
    #[arg(short, long)]
    pub destination: String,

    /// JSON file with the destination schema
    #[arg(long)]
    pub schema: PathBuf,

    /// Shell command that receives the script on stdin; non-zero exit means failure
    #[arg(long)]
    pub validate_cmd: String,

    /// Override repair.max_attempts from the config
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Write the run record as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the final script to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Where to write the file
    #[arg(default_value = "sqlforge.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

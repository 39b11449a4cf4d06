//! CLI argument parsing for the report workflow.
//!
//! The CLI is intentionally thin: it resolves configuration and wires the
//! provider and trace sink, so the pipeline itself stays reusable.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for report generation.
#[derive(Parser, Debug)]
#[command(
    name = "unirep",
    version,
    about = "LM-driven university selection report generator",
    after_help = "Commands:\n  generate --profile <path>   Generate a selection report for a student profile\n  extract --input <path>      Run the pattern tier of school-name extraction\n\nExamples:\n  unirep generate --profile student.txt --lm \"llm -m small\" --out report.md\n  unirep generate --profile-text \"GPA 3.9, robotics club\" --trace-log trace.jsonl\n  unirep extract --input schools.md",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Generate(GenerateArgs),
    Extract(ExtractArgs),
}

/// Generate command inputs for one report run.
#[derive(Parser, Debug)]
#[command(about = "Generate a university selection report from a student profile")]
pub struct GenerateArgs {
    /// Path to a student profile text file
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "profile_text",
        required_unless_present = "profile_text"
    )]
    pub profile: Option<PathBuf>,

    /// Inline student profile text
    #[arg(long, value_name = "TEXT")]
    pub profile_text: Option<String>,

    /// Path to a JSON report config
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// LM command override (prompt on stdin, response on stdout)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Output path for the Markdown report (printed to stdout when omitted)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Output path for the per-stage trace log (enables tracing)
    #[arg(long, value_name = "PATH")]
    pub trace_log: Option<PathBuf>,

    /// Emit verbose diagnostics
    #[arg(long)]
    pub verbose: bool,
}

/// Extract command inputs for standalone pattern-tier runs.
#[derive(Parser, Debug)]
#[command(about = "Run the pattern tier of school-name extraction on a text file")]
pub struct ExtractArgs {
    /// Path to a schools-report text file
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to a JSON report config
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit verbose diagnostics
    #[arg(long)]
    pub verbose: bool,
}

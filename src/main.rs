use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use uni_report::cli::{Command, ExtractArgs, GenerateArgs, RootArgs};
use uni_report::config::{self, ReportConfig};
use uni_report::extract::SchoolExtractor;
use uni_report::lm;
use uni_report::pipeline;
use uni_report::profile::ProfileRef;
use uni_report::trace::{JsonlSink, NoopSink, TraceSink};

fn main() -> Result<()> {
    let cli = RootArgs::parse();

    match cli.command {
        Command::Generate(args) => cmd_generate(args),
        Command::Extract(args) => cmd_extract(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "uni_report=debug" } else { "uni_report=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config_or_default(path: Option<&PathBuf>) -> Result<ReportConfig> {
    let config = match path {
        Some(path) => config::load_config(path)?,
        None => config::default_config(),
    };
    config::validate_config(&config)?;
    Ok(config)
}

fn cmd_generate(args: GenerateArgs) -> Result<()> {
    init_tracing(args.verbose);
    let config = load_config_or_default(args.config.as_ref())?;

    let provider =
        lm::resolve_provider(args.lm.as_deref(), &config).context("resolve LM provider")?;

    let reference = match (&args.profile, &args.profile_text) {
        (Some(path), _) => ProfileRef::File(path.clone()),
        (None, Some(text)) => ProfileRef::Inline(text.clone()),
        // clap enforces exactly one of the two.
        (None, None) => unreachable!("clap requires --profile or --profile-text"),
    };

    let trace_path = args
        .trace_log
        .clone()
        .or_else(|| config.trace_enabled.then(|| PathBuf::from("unirep.trace.jsonl")));
    let sink: Box<dyn TraceSink> = match &trace_path {
        Some(path) => Box::new(JsonlSink::new(path.clone())),
        None => Box::new(NoopSink),
    };

    let document = pipeline::run(&reference, &config, provider.as_ref(), sink.as_ref())?;
    let markdown = document.to_markdown();

    match &args.out {
        Some(path) => {
            fs::write(path, &markdown)
                .with_context(|| format!("write report {}", path.display()))?;
            eprintln!("Wrote report to {}", path.display());
        }
        None => print!("{markdown}"),
    }
    if let Some(path) = &trace_path {
        eprintln!("Wrote stage trace to {}", path.display());
    }
    Ok(())
}

fn cmd_extract(args: ExtractArgs) -> Result<()> {
    init_tracing(args.verbose);
    let config = load_config_or_default(args.config.as_ref())?;

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    let extractor = SchoolExtractor::from_config(&config)?;

    let candidates = extractor.pattern_candidates(&text);
    if candidates.is_empty() {
        eprintln!("No pattern-tier candidates found.");
        return Ok(());
    }
    for candidate in candidates {
        println!("{candidate}");
    }
    Ok(())
}

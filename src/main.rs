//! CLI entry point for the node-script security scanner.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use nodescan::{ScanConfig, ScanResult, Scanner, Severity};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "nodescan",
    version,
    about = "Pre-execution security triage for untrusted Python node scripts"
)]
struct Cli {
    /// Path to the script to scan
    path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Sandbox wall-clock budget in seconds
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Python interpreter used for the dynamic layer
    #[arg(long)]
    python: Option<PathBuf>,

    /// Skip the Bandit linter pass
    #[arg(long)]
    no_linter: bool,

    /// Skip the dynamic sandbox pass
    #[arg(long)]
    no_sandbox: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Report renderings. Rejected at argument-parse time, before any scan work
/// starts.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with_target(false)
        .init();

    let config = ScanConfig {
        sandbox_timeout: Duration::from_secs(cli.timeout),
        python_interpreter: cli.python,
        run_linter: !cli.no_linter,
        run_sandbox: !cli.no_sandbox,
    };

    let scanner = Scanner::with_config(config)?;
    let result = scanner.scan(&cli.path).await;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_report(&result),
    }

    if !result.secure {
        std::process::exit(1);
    }
    Ok(())
}

fn print_text_report(result: &ScanResult) {
    println!("{}", format!("Scan: {}", result.file.display()).bold());

    if result.issues.is_empty() {
        println!("  no issues found");
    }
    for issue in &result.issues {
        let severity = match issue.severity {
            Severity::High => issue.severity.to_string().red(),
            Severity::Medium => issue.severity.to_string().yellow(),
            Severity::Low => issue.severity.to_string().blue(),
        };
        println!("  [{severity}] {}", issue.detail);
    }

    let verdict = if result.secure {
        "SECURE".green()
    } else {
        "NOT SECURE".red()
    };
    println!();
    println!("Verdict: {}", verdict.bold());
}

//! CLI binary for the environment check.
//!
//! Prints the report on stdout and exits 0 when every counted category
//! passed, 1 otherwise.

use anyhow::{Context, Result};
use clap::Parser;
use doc_analyzer::envcheck::{run_all, SystemRunner};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Verify that an AI development environment is complete.
#[derive(Parser, Debug)]
#[command(
    name = "envcheck",
    version,
    about = "Verify Python, CUDA, AI/ML packages and developer tools",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Python interpreter used for version and package checks.
    #[arg(long, env = "ENVCHECK_PYTHON", default_value = "python3")]
    python: String,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let show_progress = !cli.no_progress && io::stderr().is_terminal();
    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Checking");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let report = run_all(&SystemRunner, &cli.python, |step| {
        if let Some(bar) = &spinner {
            bar.set_message(step.to_string());
        }
    });

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        print!("{}", report.render_text());
    }

    std::process::exit(report.exit_code());
}

//! CLI binary for doc-analyzer.
//!
//! Loads the model once, then either serves the browser UI or, when an input
//! is given on the command line, analyzes that one document and exits.

use anyhow::{Context, Result};
use clap::Parser;
use doc_analyzer::backend::{
    load_tokenizer, resolve_provider, ProviderModel, Qwen2VlProcessor, DEFAULT_MODEL,
};
use doc_analyzer::pipeline::inference::InferenceEngine;
use doc_analyzer::pipeline::input::is_url;
use doc_analyzer::{
    server, AnalysisRequest, AnalysisSource, Analyzer, AnalyzerConfig, AnchorEngine, SamplingParams,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the web UI on 0.0.0.0:7860
  doc-analyzer --tokenizer ./tokenizer.json

  # Point at a local vLLM / OpenAI-compatible server
  EDGEQUAKE_LLM_PROVIDER=openai OPENAI_BASE_URL=http://localhost:8000/v1 \
    doc-analyzer --model allenai/olmOCR-7B-0225-preview

  # Analyze one document and print the text
  doc-analyzer https://molmo.allenai.org/paper.pdf --page 2 --max-new-tokens 1000

ENVIRONMENT VARIABLES:
  EDGEQUAKE_LLM_PROVIDER  Provider (openai, ollama, anthropic, gemini, ...)
  EDGEQUAKE_MODEL         Model ID served by that provider
  OPENAI_API_KEY          Selects the openai provider when nothing else is set
  PDFIUM_LIB_PATH         Path to libpdfium; otherwise ./ then the system path
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Analyze PDF pages and images with a vision-language model.
#[derive(Parser, Debug)]
#[command(
    name = "doc-analyzer",
    version,
    about = "Analyze PDF pages and images with a vision-language model",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF/image path or URL to analyze once. Without it, the web UI is served.
    input: Option<String>,

    /// Address to bind.
    #[arg(long, env = "DOC_ANALYZER_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "DOC_ANALYZER_PORT", default_value_t = 7860)]
    port: u16,

    /// Qwen2-VL `tokenizer.json`.
    #[arg(long, env = "DOC_ANALYZER_TOKENIZER", default_value = "tokenizer.json")]
    tokenizer: PathBuf,

    /// Model ID (default: allenai/olmOCR-7B-0225-preview).
    #[arg(long, env = "DOC_ANALYZER_MODEL")]
    model: Option<String>,

    /// LLM provider serving the model. Auto-detected if not set.
    #[arg(long, env = "DOC_ANALYZER_PROVIDER")]
    provider: Option<String>,

    /// Retries per generation call on provider failure.
    #[arg(long, env = "DOC_ANALYZER_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Longest edge of rendered PDF pages in pixels.
    #[arg(long, env = "DOC_ANALYZER_TARGET_DIM", default_value_t = 1024)]
    target_dim: u32,

    /// Anchor text engine: pdfreport or pdftotext.
    #[arg(long, env = "DOC_ANALYZER_ANCHOR_ENGINE", default_value = "pdfreport")]
    anchor_engine: AnchorEngine,

    /// Character budget for anchor text.
    #[arg(long, env = "DOC_ANALYZER_ANCHOR_LENGTH", default_value_t = 4000)]
    anchor_length: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC_ANALYZER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Largest URL download accepted, in MiB.
    #[arg(long, env = "DOC_ANALYZER_MAX_DOWNLOAD_MB", default_value_t = 128)]
    max_download_mb: u64,

    /// Directory for per-request temp files (default: system temp dir).
    #[arg(long, env = "DOC_ANALYZER_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Page to analyze (one-shot mode, PDFs only).
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Sampling temperature (0.0–1.0).
    #[arg(long, env = "DOC_ANALYZER_TEMPERATURE", default_value_t = 0.8)]
    temperature: f32,

    /// Max generated tokens (10–5000).
    #[arg(long, env = "DOC_ANALYZER_MAX_NEW_TOKENS", default_value_t = 50)]
    max_new_tokens: usize,

    /// Sequences to generate (1–5); only the first is shown.
    #[arg(long, env = "DOC_ANALYZER_NUM_SEQUENCES", default_value_t = 1)]
    num_return_sequences: usize,

    /// Greedy decoding instead of sampling.
    #[arg(long)]
    greedy: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC_ANALYZER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC_ANALYZER_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info,tower_http=debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let sampling = SamplingParams::builder()
        .temperature(cli.temperature)
        .max_new_tokens(cli.max_new_tokens)
        .num_return_sequences(cli.num_return_sequences)
        .do_sample(!cli.greedy)
        .build()
        .context("Invalid sampling flags")?;

    let mut builder = AnalyzerConfig::builder()
        .target_longest_image_dim(cli.target_dim)
        .anchor_engine(cli.anchor_engine)
        .anchor_target_length(cli.anchor_length)
        .download_timeout_secs(cli.download_timeout)
        .max_download_bytes(cli.max_download_mb.saturating_mul(1024 * 1024))
        .default_sampling(sampling);
    if let Some(dir) = &cli.temp_dir {
        builder = builder.temp_root(dir);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Load the model session once ─────────────────────────────────────
    let spinner = (!cli.quiet).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Model");
        bar.set_message("Initializing the model…");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let tokenizer = load_tokenizer(&cli.tokenizer)
        .with_context(|| format!("Failed to load tokenizer from {}", cli.tokenizer.display()))?;
    let provider = resolve_provider(cli.provider.as_deref(), cli.model.as_deref())
        .context("Failed to initialise the model provider")?;
    let model_name = cli
        .model
        .clone()
        .or_else(|| std::env::var("EDGEQUAKE_MODEL").ok().filter(|m| !m.is_empty()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let model = ProviderModel::new(provider, Arc::clone(&tokenizer)).with_retries(cli.max_retries, 500);
    let processor = Qwen2VlProcessor::new(tokenizer);
    let engine = Arc::new(InferenceEngine::new(Arc::new(processor), Arc::new(model)));

    let analyzer = Analyzer::with_pdfium(config, engine).context("Failed to initialise pdfium")?;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    if !cli.quiet {
        eprintln!("{} Model loaded: {}", green("✔"), bold(&model_name));
    }

    // ── One-shot mode ───────────────────────────────────────────────────
    if let Some(input) = cli.input.as_deref() {
        let source = if is_url(input) {
            AnalysisSource::Url(input.to_string())
        } else {
            AnalysisSource::File(PathBuf::from(input))
        };
        let request = AnalysisRequest::new(source).page(cli.page).params(sampling);
        let outcome = analyzer.analyze(request).await;
        if outcome.is_error() {
            eprintln!("{} {}", red("✘"), outcome.text);
            std::process::exit(1);
        }
        println!("{}", outcome.text);
        return Ok(());
    }

    // ── Serve the UI ────────────────────────────────────────────────────
    let addr = SocketAddr::new(cli.host, cli.port);
    let app = server::router(Arc::new(analyzer), model_name);
    if !cli.quiet {
        eprintln!("{} Serving on {}", green("✔"), bold(&format!("http://{addr}")));
    }
    server::serve(app, addr)
        .await
        .with_context(|| format!("Server on {addr} failed"))?;

    Ok(())
}

//! CLI binary for factura-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the record as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use factura_extract::pipeline::{input, pdf};
use factura_extract::{
    extract_invoice, extract_to_file, inspect, ExtractionConfig, ExtractionProgressCallback,
    InvoiceRecord, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }

    fn elapsed(&self) -> String {
        dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, input: &str) {
        self.bar.set_prefix("Reading");
        self.bar.set_message(input.to_string());
    }

    fn on_text_extracted(&self, chars: usize, strategy: &str) {
        self.bar.println(format!(
            "  {} Text extracted  {:<8}  {}",
            green("✓"),
            dim(&format!("{chars:>6} chars")),
            dim(strategy),
        ));
    }

    fn on_model_request(&self, prompt_chars: usize) {
        self.bar.set_prefix("Extracting");
        self.bar
            .set_message(format!("waiting for model ({prompt_chars} prompt chars)…"));
    }

    fn on_model_response(&self, completion_chars: usize, completion_tokens: usize) {
        self.bar.println(format!(
            "  {} Model replied   {:<8}  {}",
            green("✓"),
            dim(&format!("{completion_chars:>6} chars")),
            dim(&format!("{completion_tokens} tokens")),
        ));
    }

    fn on_extraction_complete(&self, confidence: f64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Invoice extracted  confidence {}  {}",
            green("✔"),
            bold(&format!("{confidence:.2}")),
            self.elapsed()
        );
    }

    fn on_extraction_error(&self, error: &str) {
        self.bar.finish_and_clear();
        let first_line = error.lines().next().unwrap_or(error);
        eprintln!("{} {}  {}", red("✘"), red(first_line), self.elapsed());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract to stdout as JSON
  factura-extract factura.pdf

  # Write the record to a file
  factura-extract factura.pdf -o factura.json

  # Use a specific model
  factura-extract --provider openai --model gpt-4o-mini factura.pdf

  # Extract from a URL
  factura-extract https://example.com/facturas/FE-100.pdf

  # Show the text the model would see (no API key needed)
  factura-extract --text-only factura.pdf

  # Inspect PDF metadata (no API key needed)
  factura-extract --inspect-only factura.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default provider, model gpt-4o)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model used together with EDGEQUAKE_LLM_PROVIDER
  PDFIUM_LIB_PATH         libpdfium file or directory; pdf-extract is used without it
  RUST_LOG                Override the log filter (e.g. factura_extract=debug)
"#;

/// Extract structured data from Colombian electronic invoices.
#[derive(Parser, Debug)]
#[command(
    name = "factura-extract",
    version,
    about = "Extract structured JSON from Colombian electronic invoices (PDF) using an LLM",
    long_about = "Read the text layer of a Colombian electronic invoice (local file or URL), \
ask a chat model to fill a fixed JSON schema, and print the normalised record with a \
confidence score. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the JSON record to this file instead of stdout.
    #[arg(short, long, env = "FACTURA_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4o, gpt-4o-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "FACTURA_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "FACTURA_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Max tokens the model may generate (1–16000).
    #[arg(long, env = "FACTURA_MAX_TOKENS", default_value_t = 2000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FACTURA_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Minimum characters of extracted text before the model is called.
    #[arg(long, env = "FACTURA_MIN_TEXT_CHARS", default_value_t = 50)]
    min_text_chars: usize,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "FACTURA_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Keep dates exactly as the model returned them.
    #[arg(long, env = "FACTURA_NO_DATE_NORMALIZATION")]
    no_date_normalization: bool,

    /// Print the extracted PDF text only, no model call.
    #[arg(long, conflicts_with = "inspect_only")]
    text_only: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Single-line JSON on stdout.
    #[arg(long, env = "FACTURA_COMPACT")]
    compact: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "FACTURA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FACTURA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FACTURA_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FACTURA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO lines would fight with the spinner, so it gets errors only.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.text_only && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;
        print_json(&meta, cli.compact)?;
        return Ok(());
    }

    // ── Text-only mode ───────────────────────────────────────────────────
    if cli.text_only {
        let resolved = input::resolve_input(
            &cli.input,
            cli.download_timeout,
            ExtractionConfig::default().max_file_size,
        )
        .await
        .context("Failed to open input")?;
        let extracted = pdf::extract_text(resolved.path())
            .await
            .context("Text extraction failed")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(extracted.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !extracted.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        if !cli.quiet {
            eprintln!(
                "{} chars via {}",
                extracted.chars(),
                extracted.strategy
            );
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let result = match cli.output {
        Some(ref output_path) => extract_to_file(&cli.input, output_path, &config).await,
        None => extract_invoice(&cli.input, &config).await,
    };

    let record = match result {
        Ok(record) => record,
        Err(e) => {
            if let Some(raw) = e.model_output() {
                if cli.verbose {
                    eprintln!("{}\n{}", dim("── model output ──"), raw);
                }
            }
            return Err(e).context("Extraction failed");
        }
    };

    match cli.output {
        Some(ref output_path) => {
            if !cli.quiet {
                eprintln!("   → {}", bold(&output_path.display().to_string()));
            }
        }
        None => print_json(&record, cli.compact)?,
    }

    if !cli.quiet && !show_progress {
        summarize(&record);
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn summarize(record: &InvoiceRecord) {
    eprintln!(
        "Invoice {}  {} items  confidence {:.2}",
        record.number.as_deref().unwrap_or("(no number)"),
        record.items.len(),
        record.confidence_score
    );
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .min_text_chars(cli.min_text_chars)
        .normalize_dates(!cli.no_date_normalization)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        if prompt.trim().is_empty() {
            anyhow::bail!("System prompt file {:?} is empty", path);
        }
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

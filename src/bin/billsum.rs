//! CLI binary for billsum.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, wires the OCR engine, summarizers and SQLite store, and
//! prints results.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use billsum::error::PageError;
use billsum::pipeline::fetch::is_url;
use billsum::{
    Feedback, Input, LlmSummarizer, OcrEngine, PdfExtractor, Pipeline, PipelineConfig,
    ProcessOutcome, Rating, SqliteSummaryStore, SummarizerKind, SummarizerSet, SummaryRequest,
    SummaryStore, TogetherSummarizer, VisionOcr,
};
use clap::{Args, Parser, Subcommand};
use image::DynamicImage;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarize a bill by URL with the default model
  billsum summarize https://legislature.example.gov/bills/hb12.pdf \
      --prompt "Summarize this bill for a general audience."

  # Every model at once, prompt read from a file, JSON output
  billsum summarize hb12.pdf --prompt-file prompt.txt --model all --json

  # Keep one identity across re-uploads of the same bill
  billsum summarize ./downloads/hb12-v3.pdf --base-name "HB 12" --prompt "..."

  # Rate a summary
  billsum feedback hb12.pdf_1718000000 --rating dislike --comment "missed section 4"

MODELS:
  Selector     Provider     Model
  ─────────    ─────────    ─────────────────────────────────────────────
  gpt4         openai       gpt-3.5-turbo
  gpt4mini     openai       gpt-4o-mini (default)
  togetherai   together     meta-llama/Llama-3.3-70B-Instruct-Turbo-Free

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI key (gpt4, gpt4mini, and the default OCR engine)
  TOGETHERAI_API_KEY      Together AI key (togetherai)
  BILLSUM_OCR_PROVIDER    Vision provider for scanned PDFs (default: openai)
  BILLSUM_OCR_MODEL       Vision model for scanned PDFs (default: gpt-4.1-nano)
  BILLSUM_PDFIUM_DIR      Directory containing libpdfium
  BILLSUM_DB              Summary database file (default: billsum.db)
  RUST_LOG                Overrides --verbose / --quiet log filtering
"#;

/// Summarize legislative documents with cached LLM summaries.
#[derive(Parser, Debug)]
#[command(
    name = "billsum",
    version,
    about = "Summarize PDF, HTML and text documents with cached, deduplicated LLM summaries",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite file holding summaries.
    #[arg(long, global = true, env = "BILLSUM_DB", default_value = "billsum.db")]
    db: PathBuf,

    /// User partition for lookups and writes.
    #[arg(long, global = true, env = "BILLSUM_USER", default_value = "local")]
    user: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BILLSUM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "BILLSUM_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a document and summarize it (served from cache when possible).
    Summarize(SummarizeArgs),
    /// Rate an existing summary.
    Feedback(FeedbackArgs),
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// HTTP/HTTPS URL or local file (.pdf, .html, .htm, .txt).
    input: String,

    /// Instructions for the summarizer.
    #[arg(short, long, env = "BILLSUM_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the prompt from a file.
    #[arg(long, env = "BILLSUM_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// gpt4, gpt4mini, togetherai, or all.
    #[arg(short, long, env = "BILLSUM_MODEL", default_value = "gpt4mini")]
    model: String,

    /// Display name stored with the record.
    #[arg(long, env = "BILLSUM_DISPLAY_NAME", default_value = "")]
    display_name: String,

    /// Pre-existing link to the stored document, kept on the record.
    #[arg(long, env = "BILLSUM_FILE_URL")]
    file_url: Option<String>,

    /// Document identity override (default: derived from URL or filename).
    #[arg(long, env = "BILLSUM_BASE_NAME")]
    base_name: Option<String>,

    /// Output ProcessOutcome JSON instead of plain text.
    #[arg(long, env = "BILLSUM_JSON")]
    json: bool,

    /// Together AI API key.
    #[arg(long, env = "TOGETHERAI_API_KEY", hide_env_values = true)]
    togetherai_api_key: Option<String>,

    /// Vision provider used to OCR scanned PDFs.
    #[arg(long, env = "BILLSUM_OCR_PROVIDER", default_value = "openai")]
    ocr_provider: String,

    /// Vision model used to OCR scanned PDFs.
    #[arg(long, env = "BILLSUM_OCR_MODEL", default_value = "gpt-4.1-nano")]
    ocr_model: String,

    /// Pages OCR'd concurrently (default: available parallelism).
    #[arg(short, long, env = "BILLSUM_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Retries per page on OCR failure.
    #[arg(long, env = "BILLSUM_OCR_MAX_RETRIES", default_value_t = 2)]
    ocr_max_retries: u32,

    /// Token budget for summarizer input (GPT-2 BPE).
    #[arg(long, env = "BILLSUM_MAX_INPUT_TOKENS", default_value_t = 4000)]
    max_input_tokens: usize,

    /// Summarizer temperature (0.0–2.0).
    #[arg(long, env = "BILLSUM_TEMPERATURE", default_value_t = 0.5)]
    temperature: f32,

    /// Maximum summary tokens.
    #[arg(long, env = "BILLSUM_MAX_OUTPUT_TOKENS", default_value_t = 1500)]
    max_output_tokens: usize,

    /// HTTP fetch timeout in seconds.
    #[arg(long, env = "BILLSUM_FETCH_TIMEOUT", default_value_t = 120)]
    fetch_timeout: u64,

    /// Directory containing libpdfium (default: system library path).
    #[arg(long, env = "BILLSUM_PDFIUM_DIR")]
    pdfium_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FeedbackArgs {
    /// Id printed by `billsum summarize`.
    summary_id: String,

    #[arg(long, value_enum)]
    rating: Rating,

    #[arg(long)]
    comment: Option<String>,
}

/// Stand-in engine when no vision provider could be built.
struct OcrUnavailable(String);

#[async_trait]
impl OcrEngine for OcrUnavailable {
    async fn recognize(&self, page_num: usize, _image: &DynamicImage) -> Result<String, PageError> {
        Err(PageError::OcrFailed {
            page: page_num,
            retries: 0,
            detail: self.0.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
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

    let store = SqliteSummaryStore::connect(&cli.db)
        .await
        .with_context(|| format!("Failed to open summary store {}", cli.db.display()))?;

    let result = match &cli.command {
        Command::Summarize(args) => run_summarize(&cli, args, &store).await,
        Command::Feedback(args) => run_feedback(&cli, args, &store).await,
    };
    store.close().await;
    result
}

async fn run_feedback(cli: &Cli, args: &FeedbackArgs, store: &SqliteSummaryStore) -> Result<()> {
    store
        .record_feedback(
            &cli.user,
            &args.summary_id,
            Feedback {
                rating: args.rating,
                comment: args.comment.clone(),
            },
        )
        .await
        .context("Failed to record feedback")?;
    if !cli.quiet {
        eprintln!("{} {} on {}", green("✔"), args.rating, bold(&args.summary_id));
    }
    Ok(())
}

async fn run_summarize(cli: &Cli, args: &SummarizeArgs, store: &SqliteSummaryStore) -> Result<()> {
    let prompt = read_prompt(args).await?;
    let kinds = parse_models(&args.model)?;
    let config = build_config(args)?;

    let ocr: Arc<dyn OcrEngine> = match VisionOcr::from_provider_name(
        &args.ocr_provider,
        &args.ocr_model,
        config.ocr_max_retries,
        config.ocr_retry_backoff_ms,
    ) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            warn!("OCR disabled: {}", e);
            Arc::new(OcrUnavailable(e.to_string()))
        }
    };
    let pdf = PdfExtractor::from_config(&config, ocr);
    let summarizers = build_summarizers(args);
    let store: Arc<dyn SummaryStore> = Arc::new(store.clone());
    let pipeline = Pipeline::new(config, pdf, summarizers, store)?;

    let input = read_input(&args.input).await?;
    let mut request = SummaryRequest::new(input, kinds[0], prompt, cli.user.clone())
        .display_name(args.display_name.clone());
    if let Some(url) = &args.file_url {
        request = request.file_url(url.clone());
    }
    if let Some(name) = &args.base_name {
        request = request.base_name(name.clone());
    }

    let outcomes: BTreeMap<SummarizerKind, ProcessOutcome> = if kinds.len() == 1 {
        let outcome = pipeline.process_input(&request).await;
        BTreeMap::from([(outcome.model(), outcome)])
    } else {
        pipeline.process_models(&request, &kinds).await
    };

    if args.json {
        let json = if outcomes.len() == 1 {
            serde_json::to_string_pretty(outcomes.values().next().context("no outcome")?)
        } else {
            serde_json::to_string_pretty(&outcomes)
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_outcomes(&outcomes, cli.quiet);
    }

    if outcomes.values().all(|o| o.error().is_some()) {
        bail!("No summary could be produced");
    }
    Ok(())
}

fn print_outcomes(outcomes: &BTreeMap<SummarizerKind, ProcessOutcome>, quiet: bool) {
    let many = outcomes.len() > 1;
    for outcome in outcomes.values() {
        match outcome {
            ProcessOutcome::Summary(r) => {
                if many {
                    println!("## {}", r.model);
                }
                println!("{}", r.summary);
                if many {
                    println!();
                }
                if !quiet {
                    eprintln!(
                        "{} {}  {}",
                        green("✔"),
                        bold(&r.summary_id),
                        dim(if r.cached { "(cached)" } else { "(new)" })
                    );
                }
            }
            ProcessOutcome::Failed { error, model } => {
                eprintln!("{} {}: {}", red("✘"), model, red(error));
            }
        }
    }
}

async fn read_prompt(args: &SummarizeArgs) -> Result<String> {
    match (&args.prompt, &args.prompt_file) {
        (Some(p), _) => Ok(p.clone()),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path)),
        // The pipeline rejects the empty prompt with its own message.
        (None, None) => Ok(String::new()),
    }
}

fn parse_models(selection: &str) -> Result<Vec<SummarizerKind>> {
    if selection.eq_ignore_ascii_case("all") {
        return Ok(SummarizerKind::ALL.to_vec());
    }
    let kind: SummarizerKind = selection.parse()?;
    Ok(vec![kind])
}

async fn read_input(raw: &str) -> Result<Input> {
    if is_url(raw) {
        return Ok(Input::url(raw));
    }
    let path = Path::new(raw);
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| raw.to_string());
    Ok(Input::upload(name, data))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &SummarizeArgs) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .max_input_tokens(args.max_input_tokens)
        .temperature(args.temperature)
        .max_output_tokens(args.max_output_tokens)
        .ocr_max_retries(args.ocr_max_retries)
        .fetch_timeout_secs(args.fetch_timeout);
    if let Some(n) = args.concurrency {
        builder = builder.ocr_concurrency(n);
    }
    if let Some(dir) = &args.pdfium_dir {
        builder = builder.pdfium_library_dir(dir);
    }
    Ok(builder.build()?)
}

fn build_summarizers(args: &SummarizeArgs) -> SummarizerSet {
    let mut set = SummarizerSet::new();

    let openai_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    if !openai_key.trim().is_empty() {
        for kind in [SummarizerKind::Gpt4, SummarizerKind::Gpt4Mini] {
            match LlmSummarizer::for_kind(kind) {
                Ok(s) => set = set.with(kind, Arc::new(s)),
                Err(e) => warn!("{} unavailable: {}", kind, e),
            }
        }
    }

    if let Some(key) = &args.togetherai_api_key {
        match TogetherSummarizer::for_kind(key.clone()) {
            Ok(s) => set = set.with(SummarizerKind::TogetherAi, Arc::new(s)),
            Err(e) => warn!("togetherai unavailable: {}", e),
        }
    }

    set
}

//! # billsum
//!
//! Extract text from legislative documents (PDF, HTML or plain text, by URL
//! or upload) and produce cached, deduplicated LLM summaries.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL / upload
//!  │
//!  ├─ 1. Fetch      single GET, classify by header → suffix → %PDF- magic
//!  ├─ 2. Extract    PDF: native text layer, else parallel per-page OCR
//!  │                HTML: visible text, script/style dropped
//!  ├─ 3. Normalize  ASCII-only, collapsed whitespace; blank check (100 chars)
//!  ├─ 4. Dedup      (base name, model, prompt) lookup in the summary store
//!  ├─ 5. Summarize  GPT-2 token budget, then OpenAI / Together AI
//!  ├─ 6. Annotate   effective date recovered from the full text
//!  └─ 7. Persist    new record, id `{base}_{unix seconds}`
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use billsum::{
//!     Input, MemorySummaryStore, PdfExtractor, Pipeline, PipelineConfig, SummarizerKind,
//!     SummarizerSet, SummaryRequest, TogetherSummarizer, VisionOcr,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let ocr = VisionOcr::from_provider_name("openai", "gpt-4.1-nano", 2, 500)?;
//!     let pdf = PdfExtractor::from_config(&config, Arc::new(ocr));
//!     let summarizers = SummarizerSet::new().with(
//!         SummarizerKind::TogetherAi,
//!         Arc::new(TogetherSummarizer::for_kind(std::env::var("TOGETHERAI_API_KEY")?)?),
//!     );
//!     let pipeline = Pipeline::new(config, pdf, summarizers, Arc::new(MemorySummaryStore::new()))?;
//!
//!     let request = SummaryRequest::new(
//!         Input::url("https://example.gov/bills/hb12.pdf"),
//!         SummarizerKind::TogetherAi,
//!         "Summarize this bill for a general audience.",
//!         "user-1",
//!     );
//!     let response = pipeline.try_process(&request).await?;
//!     println!("{}", response.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `billsum` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod store;
pub mod summarize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationOptions, PipelineConfig, PipelineConfigBuilder, SummarizerKind};
pub use error::{ExtractError, FetchError, PageError, ProviderError, StoreError, SummaryError};
pub use output::{ContentKind, ExtractionResult, ProcessOutcome, SummaryResponse};
pub use pipeline::fetch::Input;
pub use pipeline::ocr::{OcrEngine, VisionOcr};
pub use pipeline::pdf::PdfExtractor;
pub use process::{Pipeline, SummaryRequest};
pub use store::{
    Feedback, MemorySummaryStore, Rating, SqliteSummaryStore, SummaryRecord, SummaryStore,
};
pub use summarize::{LlmSummarizer, Summarizer, SummarizerSet, TogetherSummarizer};

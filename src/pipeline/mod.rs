//! Pipeline stages for document extraction and summary preparation.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! is testable on its own and the I/O-bound ones sit behind a trait.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ pdf / html ──▶ normalize ──▶ (summarize) ──▶ postprocess
//!            │
//!            └─ pdf: native text layer, else render ──▶ encode ──▶ ocr (parallel)
//! ```
//!
//! 1. [`fetch`]    : resolve a URL or upload to bytes + [`ContentKind`](crate::output::ContentKind)
//! 2. [`pdf`]      : native text layer first, OCR fan-out when it is blank
//! 3. [`render`]   : rasterise pages via pdfium (blocking; run off the async pool)
//! 4. [`encode`]   : PNG + base64 for the vision OCR request
//! 5. [`ocr`]      : per-page transcription with retry/backoff
//! 6. [`html`]     : visible text from markup; charset-aware byte decoding
//! 7. [`normalize`]: ASCII/whitespace normalisation, blank check, token truncation
//! 8. [`postprocess`]: effective-date annotation of the finished summary

pub mod encode;
pub mod fetch;
pub mod html;
pub mod normalize;
pub mod ocr;
pub mod pdf;
pub mod postprocess;
pub mod render;

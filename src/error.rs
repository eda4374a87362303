//! Error types for the billsum library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SummaryError`] is **terminal**: the request cannot produce a summary
//!   (unsupported input, fetch failure, blank document, provider rejected the
//!   call, store write failed). The orchestrator turns it into an
//!   `{error, model}` outcome and never retries it.
//!
//! * [`PageError`] is **non-fatal**: a single page could not be rendered or
//!   OCR'd. It is logged and the page contributes an empty string; the
//!   aggregate blank check decides whether the document is usable.
//!
//! `SummaryError` is composed of one sub-enum per collaborator so that each
//! seam (fetcher, extractor, provider, store) returns only the failures it
//! can actually produce.

use crate::output::ContentKind;
use thiserror::Error;

/// All terminal errors returned by the billsum library.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The content type (header, suffix or upload extension) is not PDF, HTML or text.
    #[error("Unsupported content type '{detail}'. Please supply a PDF, HTML or plain-text document.")]
    UnsupportedType { detail: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Empty or whitespace-only prompt; rejected before any network call.
    #[error("Please enter a prompt or generate one from the sample prompts.")]
    MissingPrompt,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (task panicked, tokenizer unavailable, …).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures while retrieving a remote document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("HTTP error {status} fetching '{url}'")]
    HttpStatus { url: String, status: u16 },

    /// Transport-level failure (DNS, TLS, timeout, truncated body).
    #[error("Failed to fetch '{url}': {reason}")]
    Network { url: String, reason: String },

    /// Search-engine cache proxies never serve the original document.
    #[error("Cached search-engine links are not supported: '{url}'. Use the original document URL.")]
    CacheLinkUnsupported { url: String },

    /// Not an absolute http(s) URL.
    #[error("Invalid URL '{url}': expected an absolute http:// or https:// URL")]
    InvalidUrl { url: String },
}

/// Failures while turning bytes into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Fewer than the blank threshold of non-whitespace characters survived extraction.
    #[error("No readable text found in {kind} document (blank_{kind})")]
    BlankDocument { kind: ContentKind },

    /// The document structure could not be parsed by any extraction tier.
    #[error("Failed to parse {kind} document: {detail}")]
    ParseError { kind: ContentKind, detail: String },

    /// Zero-byte upload.
    #[error("Empty {kind} file '{name}'")]
    EmptyInput { kind: ContentKind, name: String },

    /// The page rasteriser library could not be loaded, so OCR is impossible.
    #[error("PDF rasteriser unavailable: {0}\nSet BILLSUM_PDFIUM_DIR to the directory containing libpdfium.")]
    RasterizerUnavailable(String),
}

/// Failures reported by a summarization backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication rejected (HTTP 401 / invalid API key).
    ///
    /// Kept apart from [`ProviderError::Http`] so callers can surface a
    /// configuration problem instead of a transient outage.
    #[error("Invalid {provider} API key provided.")]
    InvalidCredentials { provider: String },

    /// Non-2xx response from a JSON HTTP provider.
    #[error("{provider} API error: HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// Anything else: malformed response, transport error, SDK failure.
    #[error("Unexpected error generating summary with {provider}: {detail}")]
    Unexpected { provider: String, detail: String },

    /// No backend was registered for the requested model selector.
    #[error("Summarizer '{selector}' is not configured.\n{hint}")]
    NotConfigured { selector: String, hint: String },
}

/// Failures reported by the summary store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The summary was generated but could not be recorded.
    #[error("Failed to save summary '{summary_id}': {detail}")]
    WriteFailed { summary_id: String, detail: String },

    /// The dedup lookup could not be executed.
    #[error("Summary lookup failed: {0}")]
    QueryFailed(String),

    /// The store could not be opened, created or migrated.
    #[error("Failed to open summary store: {0}")]
    Open(String),

    /// A stored value could not be decoded.
    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    /// A record with this id already exists for the user.
    #[error("Summary id '{summary_id}' already exists")]
    IdConflict { summary_id: String },

    /// Feedback was submitted for a record that does not exist.
    #[error("Summary '{summary_id}' not found")]
    NotFound { summary_id: String },
}

/// A non-fatal error for a single page of the OCR fallback.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// OCR call failed after retries.
    #[error("Page {page}: OCR failed after {retries} retries: {detail}")]
    OcrFailed {
        page: usize,
        retries: u32,
        detail: String,
    },
}

impl SummaryError {
    /// True when the failure stems from provider authentication.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(
            self,
            SummaryError::Provider(ProviderError::InvalidCredentials { .. })
        )
    }
}

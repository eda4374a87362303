//! Result types produced by extraction and by the orchestrator.
//!
//! [`ExtractionResult`] is the hand-off between the extract stage and the
//! rest of the pipeline; [`ProcessOutcome`] is what callers of
//! [`crate::process::Pipeline::process_input`] receive and serialises to the
//! `{model, summary, input_data, file_url, summary_id} | {error, model}` shape.

use crate::config::SummarizerKind;
use crate::error::SummaryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detected type of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Html,
    Text,
    /// Classification never succeeded.
    None,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf",
            ContentKind::Html => "html",
            ContentKind::Text => "text",
            ContentKind::None => "none",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one extraction attempt.
///
/// Fields are private so that a failed result can never carry text.
#[derive(Debug)]
pub struct ExtractionResult {
    text: String,
    content_type: ContentKind,
    error: Option<SummaryError>,
}

impl ExtractionResult {
    pub fn success(text: String, content_type: ContentKind) -> Self {
        Self {
            text,
            content_type,
            error: None,
        }
    }

    pub fn failure(content_type: ContentKind, error: impl Into<SummaryError>) -> Self {
        Self {
            text: String::new(),
            content_type,
            error: Some(error.into()),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn content_type(&self) -> ContentKind {
        self.content_type
    }

    pub fn error(&self) -> Option<&SummaryError> {
        self.error.as_ref()
    }

    /// Split into `(text, kind)` or the extraction error.
    pub fn into_result(self) -> Result<(String, ContentKind), SummaryError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok((self.text, self.content_type)),
        }
    }
}

/// A successful summary, freshly generated or served from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub model: SummarizerKind,
    pub summary: String,
    /// The URL for remote inputs, the base name for uploads.
    pub input_data: String,
    pub file_url: Option<String>,
    pub summary_id: String,
    /// True when the summary came from the store without a provider call.
    #[serde(default)]
    pub cached: bool,
}

/// What the orchestrator returns for one (input, model) request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Summary(SummaryResponse),
    Failed { error: String, model: SummarizerKind },
}

impl ProcessOutcome {
    pub fn model(&self) -> SummarizerKind {
        match self {
            ProcessOutcome::Summary(r) => r.model,
            ProcessOutcome::Failed { model, .. } => *model,
        }
    }

    pub fn summary(&self) -> Option<&SummaryResponse> {
        match self {
            ProcessOutcome::Summary(r) => Some(r),
            ProcessOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ProcessOutcome::Summary(_) => None,
            ProcessOutcome::Failed { error, .. } => Some(error),
        }
    }
}

//! Request orchestration: extract, deduplicate, summarise, persist.
//!
//! One call to [`Pipeline::process_input`] runs this state machine:
//!
//! ```text
//! CLASSIFY → EXTRACT → NORMALIZE → DEDUP_LOOKUP ─┬─ hit  → RETURN (stored record, verbatim)
//!                                                └─ miss → TRUNCATE → SUMMARIZE
//!                                                          → POSTPROCESS → PERSIST → RETURN
//! ```
//!
//! Any failure ends the request as `{error, model}`; nothing is cached for a
//! failed request and the orchestrator never retries.
//!
//! The dedup key is `(base_name, model, custom_prompt)` within the user's
//! partition. Two concurrent requests for a never-seen key may both miss and
//! both write; each write gets its own id, so the race only ever produces
//! duplicate (equally correct) records.

use crate::config::{PipelineConfig, SummarizerKind};
use crate::error::{ExtractError, StoreError, SummaryError};
use crate::output::{ContentKind, ExtractionResult, ProcessOutcome, SummaryResponse};
use crate::pipeline::fetch::{classify_filename, Fetcher, Input};
use crate::pipeline::html::{decode_text, extract_text};
use crate::pipeline::normalize::{is_blank, normalize, Truncator};
use crate::pipeline::pdf::PdfExtractor;
use crate::pipeline::postprocess::annotate_effective_date;
use crate::store::{find_cached, Feedback, NewSummary, SummaryRecord, SummaryStore};
use crate::summarize::{validate_prompt, Summarizer, SummarizerSet};
use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Ids tried per write: `{base}_{secs}`, `{base}_{secs+1}`, …
const MAX_ID_ATTEMPTS: i64 = 8;

/// One summarisation request.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub input: Input,
    pub model: SummarizerKind,
    pub custom_prompt: String,
    pub user_id: String,
    pub display_name: String,
    pub file_url: Option<String>,
    /// Replaces the identity derived from the URL or filename.
    pub override_base_name: Option<String>,
}

impl SummaryRequest {
    pub fn new(
        input: Input,
        model: SummarizerKind,
        custom_prompt: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            input,
            model,
            custom_prompt: custom_prompt.into(),
            user_id: user_id.into(),
            display_name: String::new(),
            file_url: None,
            override_base_name: None,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn file_url(mut self, url: impl Into<String>) -> Self {
        self.file_url = Some(url.into());
        self
    }

    pub fn base_name(mut self, name: impl Into<String>) -> Self {
        self.override_base_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: SummarizerKind) -> Self {
        self.model = model;
        self
    }

    /// Document identity: the override when non-blank, else derived from the input.
    pub fn resolved_base_name(&self) -> String {
        match &self.override_base_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.input.base_name(),
        }
    }
}

/// The extraction → summary pipeline with its collaborators.
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Fetcher,
    pdf: PdfExtractor,
    truncator: Truncator,
    summarizers: SummarizerSet,
    store: Arc<dyn SummaryStore>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("pdf", &self.pdf)
            .field("summarizers", &self.summarizers)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        pdf: PdfExtractor,
        summarizers: SummarizerSet,
        store: Arc<dyn SummaryStore>,
    ) -> Result<Self, SummaryError> {
        let fetcher = Fetcher::new(config.fetch_timeout_secs)?;
        let truncator = Truncator::gpt2()?;
        Ok(Self {
            config,
            fetcher,
            pdf,
            truncator,
            summarizers,
            store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SummaryStore> {
        &self.store
    }

    // ── CLASSIFY + EXTRACT ───────────────────────────────────────────────

    /// Resolve the input and extract its text.
    pub async fn extract(&self, input: &Input) -> ExtractionResult {
        match self.try_extract(input).await {
            Ok((text, kind)) => ExtractionResult::success(text, kind),
            Err((kind, e)) => ExtractionResult::failure(kind, e),
        }
    }

    async fn try_extract(&self, input: &Input) -> Result<(String, ContentKind), (ContentKind, SummaryError)> {
        let start = Instant::now();
        let (kind, bytes, content_type) = match input {
            Input::Url(url) => {
                let doc = self
                    .fetcher
                    .fetch(url)
                    .await
                    .map_err(|e| (ContentKind::None, e))?;
                (doc.kind, doc.bytes, doc.content_type)
            }
            Input::Bytes { name, data } => {
                let kind = classify_filename(name).ok_or_else(|| {
                    (
                        ContentKind::None,
                        SummaryError::UnsupportedType {
                            detail: name.clone(),
                        },
                    )
                })?;
                if data.is_empty() {
                    return Err((
                        kind,
                        ExtractError::EmptyInput {
                            kind,
                            name: name.clone(),
                        }
                        .into(),
                    ));
                }
                (kind, data.clone(), None)
            }
        };
        info!("Classified input as {} ({} bytes)", kind, bytes.len());

        let text = self
            .extract_bytes(kind, &bytes, content_type.as_deref())
            .await
            .map_err(|e| (kind, e.into()))?;
        debug!(
            "Extracted {} chars of {} in {}ms",
            text.len(),
            kind,
            start.elapsed().as_millis()
        );
        Ok((text, kind))
    }

    async fn extract_bytes(
        &self,
        kind: ContentKind,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<String, ExtractError> {
        let text = match kind {
            ContentKind::Pdf => return self.pdf.extract(bytes).await,
            ContentKind::Html => extract_text(&decode_text(bytes, content_type)),
            ContentKind::Text => decode_text(bytes, content_type).trim().to_string(),
            ContentKind::None => {
                return Err(ExtractError::ParseError {
                    kind,
                    detail: "unclassified content".to_string(),
                })
            }
        };
        if is_blank(&text) {
            return Err(ExtractError::BlankDocument { kind });
        }
        Ok(text)
    }

    /// Extract and normalise; a document that normalises to blank is rejected.
    async fn prepare(&self, input: &Input) -> Result<(String, ContentKind), SummaryError> {
        let (text, kind) = self.extract(input).await.into_result()?;
        let normalized = normalize(&text);
        if is_blank(&normalized) {
            warn!("{} document is blank after normalisation", kind);
            return Err(ExtractError::BlankDocument { kind }.into());
        }
        Ok((normalized, kind))
    }

    // ── Request entry points ─────────────────────────────────────────────

    /// Run one request end to end.
    pub async fn process_input(&self, request: &SummaryRequest) -> ProcessOutcome {
        match self.try_process(request).await {
            Ok(response) => ProcessOutcome::Summary(response),
            Err(e) => {
                error!("Request for {} failed: {}", request.model, e);
                ProcessOutcome::Failed {
                    error: e.to_string(),
                    model: request.model,
                }
            }
        }
    }

    /// [`Pipeline::process_input`] with the typed error.
    pub async fn try_process(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummaryError> {
        validate_prompt(&request.custom_prompt)?;
        let summarizer = self.summarizers.get(request.model)?;
        let (text, _kind) = self.prepare(&request.input).await?;
        self.summarize_prepared(request, request.model, summarizer.as_ref(), &text)
            .await
    }

    /// Extract once, then summarise with every model in `kinds` concurrently.
    ///
    /// Each model runs its own dedup lookup and write; one model failing does
    /// not affect the others.
    pub async fn process_models(
        &self,
        request: &SummaryRequest,
        kinds: &[SummarizerKind],
    ) -> BTreeMap<SummarizerKind, ProcessOutcome> {
        let failed_all = |message: String| {
            kinds
                .iter()
                .map(|&model| {
                    (
                        model,
                        ProcessOutcome::Failed {
                            error: message.clone(),
                            model,
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>()
        };

        if let Err(e) = validate_prompt(&request.custom_prompt) {
            return failed_all(e.to_string());
        }
        let text = match self.prepare(&request.input).await {
            Ok((text, _)) => text,
            Err(e) => {
                error!("Extraction failed: {}", e);
                return failed_all(e.to_string());
            }
        };

        let runs = kinds.iter().map(|&model| {
            let text = &text;
            async move {
                let result = match self.summarizers.get(model) {
                    Ok(summarizer) => {
                        self.summarize_prepared(request, model, summarizer.as_ref(), text)
                            .await
                    }
                    Err(e) => Err(e.into()),
                };
                let outcome = match result {
                    Ok(response) => ProcessOutcome::Summary(response),
                    Err(e) => {
                        error!("Request for {} failed: {}", model, e);
                        ProcessOutcome::Failed {
                            error: e.to_string(),
                            model,
                        }
                    }
                };
                (model, outcome)
            }
        });
        join_all(runs).await.into_iter().collect()
    }

    /// Attach user feedback to a stored summary.
    pub async fn record_feedback(
        &self,
        user_id: &str,
        summary_id: &str,
        feedback: Feedback,
    ) -> Result<(), SummaryError> {
        self.store
            .record_feedback(user_id, summary_id, feedback)
            .await?;
        info!("Recorded feedback on {}", summary_id);
        Ok(())
    }

    // ── DEDUP_LOOKUP → TRUNCATE → SUMMARIZE → POSTPROCESS → PERSIST ──────

    async fn summarize_prepared(
        &self,
        request: &SummaryRequest,
        model: SummarizerKind,
        summarizer: &dyn Summarizer,
        normalized: &str,
    ) -> Result<SummaryResponse, SummaryError> {
        let base_name = request.resolved_base_name();

        let existing = self
            .store
            .find(&request.user_id, &base_name, model)
            .await?;
        if let Some(hit) = find_cached(&existing, &request.custom_prompt) {
            info!("Cache hit for ({}, {}): {}", base_name, model, hit.summary_id);
            return Ok(response_from(hit, true));
        }
        info!("Cache miss for ({}, {}); generating", base_name, model);

        let bounded = self
            .truncator
            .truncate(normalized, self.config.max_input_tokens);
        let summary = summarizer
            .summarize(&bounded, &request.custom_prompt, &self.config.generation)
            .await?;
        let summary = annotate_effective_date(&summary, normalized);

        let record = self
            .persist(NewSummary {
                summary_id: String::new(),
                user_id: request.user_id.clone(),
                display_name: request.display_name.clone(),
                base_name: base_name.clone(),
                model,
                custom_prompt: request.custom_prompt.clone(),
                summary,
                input_data: request.input.input_ref(&base_name),
                file_url: request.file_url.clone(),
            })
            .await?;
        info!("Saved summary {}", record.summary_id);
        Ok(response_from(&record, false))
    }

    async fn persist(&self, mut new: NewSummary) -> Result<SummaryRecord, SummaryError> {
        let secs = Utc::now().timestamp();
        for offset in 0..MAX_ID_ATTEMPTS {
            new.summary_id = mint_summary_id(&new.base_name, secs + offset);
            match self.store.create(new.clone()).await {
                Ok(record) => return Ok(record),
                Err(StoreError::IdConflict { summary_id }) => {
                    debug!("Summary id {} taken; trying the next second", summary_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::WriteFailed {
            summary_id: new.summary_id,
            detail: format!("no free summary id after {MAX_ID_ATTEMPTS} attempts"),
        }
        .into())
    }
}

/// `{base_name}_{unix_seconds}`.
pub fn mint_summary_id(base_name: &str, unix_secs: i64) -> String {
    format!("{base_name}_{unix_secs}")
}

fn response_from(record: &SummaryRecord, cached: bool) -> SummaryResponse {
    SummaryResponse {
        model: record.model,
        summary: record.summary.clone(),
        input_data: record.input_data.clone(),
        file_url: record.file_url.clone(),
        summary_id: record.summary_id.clone(),
        cached,
    }
}

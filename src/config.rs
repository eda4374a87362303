//! Configuration types for document summarisation.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Credentials are deliberately absent: the
//! caller constructs provider handles and injects them into the
//! [`crate::process::Pipeline`].
//!
//! [`SummarizerKind`] is the public model selector. The static
//! [`SUMMARIZER_TABLE`] maps each selector to the provider and vendor model id
//! that actually serve it, so vendor strings never leak into request routing.

use crate::error::SummaryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Sampling options shared by every summarization backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature. Default: 0.5.
    pub temperature: f32,
    /// Maximum tokens the provider may generate. Default: 1500.
    pub max_output_tokens: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_output_tokens: 1500,
        }
    }
}

/// Configuration for the extraction and summarisation pipeline.
///
/// # Example
/// ```rust
/// use billsum::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_input_tokens(3000)
///     .ocr_concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_input_tokens, 3000);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Token budget for the text sent to the summarizer. Default: 4000.
    ///
    /// Counted with the GPT-2 BPE; the prefix is kept.
    pub max_input_tokens: usize,

    /// Temperature / output-token policy handed to every backend.
    pub generation: GenerationOptions,

    /// Number of pages OCR'd concurrently. Default: available parallelism.
    pub ocr_concurrency: usize,

    /// Retry attempts for a failed page OCR call. Default: 2.
    pub ocr_max_retries: u32,

    /// Initial OCR retry delay in milliseconds, doubled per attempt. Default: 500.
    pub ocr_retry_backoff_ms: u64,

    /// Longest edge of a rendered page in pixels. Default: 2000.
    ///
    /// Caps memory for oversized pages independently of their physical size.
    pub max_rendered_pixels: u32,

    /// Timeout for fetching a remote document, in seconds. Default: 120.
    pub fetch_timeout_secs: u64,

    /// Directory containing the pdfium shared library.
    /// If None, the system library search path is used.
    pub pdfium_library_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: 4000,
            generation: GenerationOptions::default(),
            ocr_concurrency: default_parallelism(),
            ocr_max_retries: 2,
            ocr_retry_backoff_ms: 500,
            max_rendered_pixels: 2000,
            fetch_timeout_secs: 120,
            pdfium_library_dir: None,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_input_tokens(mut self, n: usize) -> Self {
        self.config.max_input_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.generation.max_output_tokens = n;
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn ocr_max_retries(mut self, n: u32) -> Self {
        self.config.ocr_max_retries = n;
        self
    }

    pub fn ocr_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.ocr_retry_backoff_ms = ms;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn pdfium_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, SummaryError> {
        let c = &self.config;
        if c.max_input_tokens == 0 {
            return Err(SummaryError::InvalidConfig(
                "max_input_tokens must be ≥ 1".into(),
            ));
        }
        if c.generation.max_output_tokens == 0 {
            return Err(SummaryError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.fetch_timeout_secs == 0 {
            return Err(SummaryError::InvalidConfig(
                "fetch_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Model selection ──────────────────────────────────────────────────────

/// Public model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SummarizerKind {
    #[serde(rename = "gpt4")]
    Gpt4,
    #[serde(rename = "gpt4mini")]
    Gpt4Mini,
    #[serde(rename = "togetherai")]
    TogetherAi,
}

/// Backend family serving a [`SummarizerKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// OpenAI chat completions via edgequake-llm.
    OpenAi,
    /// Together AI JSON chat-completions endpoint.
    Together,
}

/// One row of [`SUMMARIZER_TABLE`].
#[derive(Debug, Clone, Copy)]
pub struct SummarizerEntry {
    pub kind: SummarizerKind,
    pub selector: &'static str,
    pub family: ProviderFamily,
    pub model_id: &'static str,
}

/// Selector → provider + vendor model id.
pub const SUMMARIZER_TABLE: &[SummarizerEntry] = &[
    SummarizerEntry {
        kind: SummarizerKind::Gpt4,
        selector: "gpt4",
        family: ProviderFamily::OpenAi,
        model_id: "gpt-3.5-turbo",
    },
    SummarizerEntry {
        kind: SummarizerKind::Gpt4Mini,
        selector: "gpt4mini",
        family: ProviderFamily::OpenAi,
        model_id: "gpt-4o-mini",
    },
    SummarizerEntry {
        kind: SummarizerKind::TogetherAi,
        selector: "togetherai",
        family: ProviderFamily::Together,
        model_id: "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free",
    },
];

impl SummarizerKind {
    pub const ALL: [SummarizerKind; 3] = [
        SummarizerKind::Gpt4,
        SummarizerKind::Gpt4Mini,
        SummarizerKind::TogetherAi,
    ];

    pub fn entry(&self) -> &'static SummarizerEntry {
        // Every variant has exactly one row.
        SUMMARIZER_TABLE
            .iter()
            .find(|s| s.kind == *self)
            .unwrap_or(&SUMMARIZER_TABLE[0])
    }

    pub fn selector(&self) -> &'static str {
        self.entry().selector
    }

    pub fn model_id(&self) -> &'static str {
        self.entry().model_id
    }

    pub fn family(&self) -> ProviderFamily {
        self.entry().family
    }
}

impl fmt::Display for SummarizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl FromStr for SummarizerKind {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpt4" => Ok(SummarizerKind::Gpt4),
            "gpt4mini" | "gpt4-mini" | "openai" => Ok(SummarizerKind::Gpt4Mini),
            "togetherai" | "together" => Ok(SummarizerKind::TogetherAi),
            other => Err(SummaryError::InvalidConfig(format!(
                "Unsupported model selection '{other}'. Use 'gpt4', 'gpt4mini' or 'togetherai'."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let c = PipelineConfig::default();
        assert_eq!(c.max_input_tokens, 4000);
        assert_eq!(c.generation.temperature, 0.5);
        assert_eq!(c.generation.max_output_tokens, 1500);
        assert!(c.ocr_concurrency >= 1);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = PipelineConfig::builder()
            .temperature(9.0)
            .ocr_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.generation.temperature, 2.0);
        assert_eq!(c.ocr_concurrency, 1);

        let err = PipelineConfig::builder().max_input_tokens(0).build();
        assert!(matches!(err, Err(SummaryError::InvalidConfig(_))));
    }

    #[test]
    fn selector_aliases() {
        assert_eq!("GPT4".parse::<SummarizerKind>().unwrap(), SummarizerKind::Gpt4);
        assert_eq!(
            "openai".parse::<SummarizerKind>().unwrap(),
            SummarizerKind::Gpt4Mini
        );
        assert_eq!(
            "togetherai".parse::<SummarizerKind>().unwrap(),
            SummarizerKind::TogetherAi
        );
        assert!("claude".parse::<SummarizerKind>().is_err());
    }

    #[test]
    fn table_covers_every_kind() {
        for kind in SummarizerKind::ALL {
            assert_eq!(kind.entry().kind, kind);
        }
        assert_eq!(SummarizerKind::Gpt4Mini.model_id(), "gpt-4o-mini");
        assert_eq!(SummarizerKind::TogetherAi.family(), ProviderFamily::Together);
    }

    #[test]
    fn kind_serialises_as_selector() {
        assert_eq!(
            serde_json::to_string(&SummarizerKind::Gpt4Mini).unwrap(),
            "\"gpt4mini\""
        );
    }
}

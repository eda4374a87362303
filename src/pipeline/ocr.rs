//! Page OCR: transcribe a rendered page image to plain text.
//!
//! [`OcrEngine`] is the seam the PDF extractor fans out over. The shipped
//! engine, [`VisionOcr`], sends each page to a vision-capable chat model via
//! edgequake-llm and retries transient failures with exponential backoff
//! (`backoff_ms * 2^attempt`): with 500 ms base and 2 retries a page waits at
//! most 500 ms → 1 s before giving up.

use crate::error::{PageError, ProviderError};
use crate::pipeline::encode::encode_page;
use crate::prompts::OCR_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Recognises the text on one page image.
///
/// `page_num` is 1-based and only used for logging and error reporting.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, page_num: usize, image: &DynamicImage) -> Result<String, PageError>;
}

/// OCR through a vision LLM.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    max_retries: u32,
    backoff_ms: u64,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            provider,
            max_retries,
            backoff_ms,
        }
    }

    /// Build an engine from a named edgequake-llm provider and model.
    ///
    /// The provider reads its own API key from the environment
    /// (`OPENAI_API_KEY`, …).
    pub fn from_provider_name(
        provider_name: &str,
        model: &str,
        max_retries: u32,
        backoff_ms: u64,
    ) -> Result<Self, ProviderError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            ProviderError::NotConfigured {
                selector: format!("ocr:{provider_name}"),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, max_retries, backoff_ms))
    }
}

impl std::fmt::Debug for VisionOcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionOcr")
            .field("max_retries", &self.max_retries)
            .field("backoff_ms", &self.backoff_ms)
            .finish_non_exhaustive()
    }
}

fn ocr_options() -> CompletionOptions {
    CompletionOptions {
        temperature: Some(0.0),
        max_tokens: Some(4096),
        ..Default::default()
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn recognize(&self, page_num: usize, image: &DynamicImage) -> Result<String, PageError> {
        let start = Instant::now();
        let image_data = encode_page(image).map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("Image encoding failed: {}", e),
        })?;

        // The image carries the content; the user text stays empty.
        let messages = vec![
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let options = ocr_options();

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {}: OCR retry {}/{} after {}ms",
                    page_num, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Page {}: OCR {} input tokens, {} output tokens, {:?}",
                        page_num,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Page {}: OCR attempt {} failed: {}", page_num, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(PageError::OcrFailed {
            page: page_num,
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

//! Two-tier PDF text extraction.
//!
//! 1. **Native pass**: read the embedded text layer with `pdf-extract`. If at
//!    least [`BLANK_THRESHOLD`](crate::pipeline::normalize::BLANK_THRESHOLD)
//!    non-whitespace characters come back, that text is the result and OCR
//!    never runs.
//! 2. **OCR fallback**: when the native text is blank or the parser failed,
//!    every page is rasterised and sent to the [`OcrEngine`] concurrently
//!    (`buffer_unordered`, bounded by the configured concurrency). Results are
//!    re-sorted by page index before joining, so completion order never
//!    affects the output.
//!
//! A page that fails to render or OCR contributes an empty string; only the
//! blank check on the merged text decides whether the document is usable.
//!
//! Both `pdf-extract` and pdfium are blocking (and `pdf-extract` may panic on
//! malformed input), so each tier runs inside `spawn_blocking`. A panic in the
//! native pass surfaces as a `ParseError` and triggers the fallback.

use crate::config::PipelineConfig;
use crate::error::ExtractError;
use crate::output::ContentKind;
use crate::pipeline::normalize::is_blank;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reads the embedded text layer of a PDF.
pub trait TextLayer: Send + Sync {
    fn extract(&self, pdf: &[u8]) -> Result<String, ExtractError>;
}

/// Text layer backed by the pure-Rust `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractLayer;

impl TextLayer for PdfExtractLayer {
    fn extract(&self, pdf: &[u8]) -> Result<String, ExtractError> {
        pdf_extract::extract_text_from_mem(pdf).map_err(|e| ExtractError::ParseError {
            kind: ContentKind::Pdf,
            detail: e.to_string(),
        })
    }
}

/// Native-first PDF extractor with a parallel OCR fallback.
#[derive(Clone)]
pub struct PdfExtractor {
    text_layer: Arc<dyn TextLayer>,
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: Arc<dyn OcrEngine>,
    concurrency: usize,
}

impl std::fmt::Debug for PdfExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExtractor")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl PdfExtractor {
    pub fn new(
        text_layer: Arc<dyn TextLayer>,
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: Arc<dyn OcrEngine>,
        concurrency: usize,
    ) -> Self {
        Self {
            text_layer,
            rasterizer,
            ocr,
            concurrency: concurrency.max(1),
        }
    }

    /// `pdf-extract` text layer plus pdfium rasterisation, sized from `config`.
    pub fn from_config(config: &PipelineConfig, ocr: Arc<dyn OcrEngine>) -> Self {
        Self::new(
            Arc::new(PdfExtractLayer),
            Arc::new(PdfiumRasterizer::new(
                config.max_rendered_pixels,
                config.pdfium_library_dir.clone(),
            )),
            ocr,
            config.ocr_concurrency,
        )
    }

    /// Extract text from PDF bytes.
    ///
    /// # Errors
    /// - [`ExtractError::BlankDocument`] when neither tier found enough text
    /// - [`ExtractError::ParseError`] / [`ExtractError::RasterizerUnavailable`]
    ///   when the native pass produced nothing and the document could not be
    ///   opened for rendering either
    pub async fn extract(&self, pdf: &[u8]) -> Result<String, ExtractError> {
        let data = Arc::new(pdf.to_vec());

        match self.native_pass(Arc::clone(&data)).await {
            Ok(text) if !is_blank(&text) => {
                info!("Native text layer: {} chars", text.len());
                return Ok(text);
            }
            Ok(_) => info!("Native text layer is blank; falling back to OCR"),
            Err(e) => warn!("Native text extraction failed ({}); falling back to OCR", e),
        }

        let text = self.ocr_pass(data).await?;
        if is_blank(&text) {
            return Err(ExtractError::BlankDocument {
                kind: ContentKind::Pdf,
            });
        }
        Ok(text)
    }

    async fn native_pass(&self, data: Arc<Vec<u8>>) -> Result<String, ExtractError> {
        let layer = Arc::clone(&self.text_layer);
        tokio::task::spawn_blocking(move || layer.extract(&data))
            .await
            .map_err(|e| ExtractError::ParseError {
                kind: ContentKind::Pdf,
                detail: format!("text layer task panicked: {}", e),
            })?
    }

    async fn ocr_pass(&self, data: Arc<Vec<u8>>) -> Result<String, ExtractError> {
        let render_start = Instant::now();
        let rasterizer = Arc::clone(&self.rasterizer);
        let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(&data))
            .await
            .map_err(|e| ExtractError::ParseError {
                kind: ContentKind::Pdf,
                detail: format!("render task panicked: {}", e),
            })??;
        info!(
            "Rendered {} pages in {}ms",
            pages.len(),
            render_start.elapsed().as_millis()
        );

        let ocr_start = Instant::now();
        let mut results: Vec<(usize, String)> =
            stream::iter(pages.into_iter().enumerate().map(|(idx, page)| {
                let ocr = Arc::clone(&self.ocr);
                async move {
                    let page_num = idx + 1;
                    let text = match page {
                        Ok(image) => match ocr.recognize(page_num, &image).await {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("{}", e);
                                String::new()
                            }
                        },
                        Err(e) => {
                            warn!("{}", e);
                            String::new()
                        }
                    };
                    (idx, text)
                }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        // Completion order is arbitrary.
        results.sort_by_key(|(idx, _)| *idx);
        debug!(
            "OCR of {} pages finished in {}ms",
            results.len(),
            ocr_start.elapsed().as_millis()
        );

        Ok(results
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

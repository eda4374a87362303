//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! Rendering is synchronous and CPU-bound; [`crate::pipeline::pdf`] always
//! calls a [`PageRasterizer`] from `tokio::task::spawn_blocking` so Tokio
//! worker threads never stall on pdfium.
//!
//! `max_rendered_pixels` caps the longest edge of each bitmap regardless of
//! the page's physical size, which bounds memory on oversized scans.

use crate::error::{ExtractError, PageError};
use crate::output::ContentKind;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Renders every page of a PDF.
///
/// The outer `Result` fails when the document as a whole cannot be opened;
/// a failure on one page is reported in that page's slot and the rest still
/// render.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<Result<DynamicImage, PageError>>, ExtractError>;
}

/// pdfium-backed rasteriser.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_pixels: u32,
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(max_pixels: u32, library_dir: Option<PathBuf>) -> Self {
        Self {
            max_pixels,
            library_dir,
        }
    }

    fn bind(&self) -> Result<Pdfium, ExtractError> {
        match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map(Pdfium::new)
        .map_err(|e| ExtractError::RasterizerUnavailable(e.to_string()))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<Result<DynamicImage, PageError>>, ExtractError> {
        let pdfium = self.bind()?;

        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(|e| {
            let detail = format!("{:?}", e);
            if detail.contains("Password") || detail.contains("password") {
                ExtractError::ParseError {
                    kind: ContentKind::Pdf,
                    detail: "document is password protected".to_string(),
                }
            } else {
                ExtractError::ParseError {
                    kind: ContentKind::Pdf,
                    detail,
                }
            }
        })?;

        let pages = document.pages();
        info!("PDF loaded for OCR: {} pages", pages.len());

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let images = pages
            .iter()
            .enumerate()
            .map(|(idx, page)| {
                let page_num = idx + 1;
                page.render_with_config(&render_config)
                    .map(|bitmap| {
                        let image = bitmap.as_image();
                        debug!(
                            "Rendered page {} → {}x{} px",
                            page_num,
                            image.width(),
                            image.height()
                        );
                        image
                    })
                    .map_err(|e| PageError::RenderFailed {
                        page: page_num,
                        detail: format!("{:?}", e),
                    })
            })
            .collect();

        Ok(images)
    }
}

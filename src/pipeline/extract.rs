//! Document extraction: raw text and embedded images from one PDF.
//!
//! [`DocumentSource`] is blocking; the batch driver calls it inside
//! `tokio::task::spawn_blocking` because pdfium keeps thread-local state and
//! is CPU-bound. Tests substitute a stub source that never touches pdfium.

use crate::error::DocumentError;
use crate::pipeline::input::check_pdf_magic;
use crate::pipeline::pdfium::PdfiumLibrary;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Images found on one page, PNG-encoded, in page-object order.
#[derive(Debug, Clone, Default)]
pub struct PageImages {
    /// 1-indexed page number.
    pub page: usize,
    pub images: Vec<Vec<u8>>,
}

/// Everything pulled out of a PDF before language detection.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    /// Text of every page, joined with newlines.
    pub text: String,
    /// One entry per page, including pages without images.
    pub pages: Vec<PageImages>,
}

impl RawDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn image_count(&self) -> usize {
        self.pages.iter().map(|p| p.images.len()).sum()
    }
}

/// Produces a [`RawDocument`] from a file on disk.
pub trait DocumentSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<RawDocument, DocumentError>;
}

/// The pdfium-backed source used in production.
#[derive(Debug, Clone)]
pub struct PdfiumSource {
    library: PdfiumLibrary,
    password: Option<String>,
}

impl PdfiumSource {
    pub fn new(library: PdfiumLibrary) -> Self {
        Self {
            library,
            password: None,
        }
    }

    /// Password tried on every document.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl DocumentSource for PdfiumSource {
    fn extract(&self, path: &Path) -> Result<RawDocument, DocumentError> {
        check_pdf_magic(path)?;

        let read_err = |detail: String| DocumentError::Read {
            path: path.to_path_buf(),
            detail,
        };

        let pdfium = self
            .library
            .bind()
            .map_err(|e| read_err(format!("pdfium unavailable: {e}")))?;

        let document = pdfium
            .load_pdf_from_file(path, self.password.as_deref())
            .map_err(|e| {
                let detail = format!("{:?}", e);
                if detail.contains("Password") || detail.contains("password") {
                    read_err("document is encrypted".into())
                } else {
                    read_err(detail)
                }
            })?;

        let mut texts = Vec::new();
        let mut pages = Vec::new();

        for (idx, page) in document.pages().iter().enumerate() {
            let page_no = idx + 1;
            match page.text() {
                Ok(text) => texts.push(text.all()),
                Err(e) => warn!("{}: page {} has no readable text: {:?}", path.display(), page_no, e),
            }

            let mut images = Vec::new();
            for object in page.objects().iter() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };
                let encoded = image_object
                    .get_raw_image()
                    .map_err(|e| format!("{:?}", e))
                    .and_then(|img| encode_png(&img));
                match encoded {
                    Ok(bytes) => images.push(bytes),
                    Err(e) => warn!(
                        "{}: skipping undecodable image on page {}: {}",
                        path.display(),
                        page_no,
                        e
                    ),
                }
            }

            pages.push(PageImages {
                page: page_no,
                images,
            });
        }

        let raw = RawDocument {
            text: texts.join("\n"),
            pages,
        };
        debug!(
            "{}: {} pages, {} images, {} chars",
            path.display(),
            raw.page_count(),
            raw.image_count(),
            raw.text.chars().count()
        );
        Ok(raw)
    }
}

/// PNG-encode a decoded image.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

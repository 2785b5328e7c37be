//! Pipeline stages for PDF-to-CSV batch processing.
//!
//! Each submodule implements one step; the batch driver in
//! [`crate::batch`] strings them together per document.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ images ──▶ llm ──▶ aggregate ──▶ export
//! (dir)     (pdfium)    (PNG)     (JSON)   (route)       (CSV)
//! ```
//!
//! 1. [`input`]    : list the directory's PDFs in sorted order
//! 2. [`pdfium`]   : find and bind the pdfium shared library once per run
//! 3. [`extract`]  : text and embedded images; blocking, run in `spawn_blocking`
//! 4. [`images`]   : write each image under a randomized name
//! 5. [`llm`]      : schema-constrained extraction with retry/backoff; the
//!    only stage with network I/O
//! 6. [`aggregate`]: append metadata and route to the output collections
//! 7. [`export`]   : union headers, binary encoding, atomic CSV writes

pub mod aggregate;
pub mod export;
pub mod extract;
pub mod images;
pub mod input;
pub mod llm;
pub mod pdfium;

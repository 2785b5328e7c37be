//! Error types for the edgequake-pdf2csv library.
//!
//! Three error types reflect three failure scopes:
//!
//! * [`Pdf2CsvError`]: **Fatal** for the run or for one output file: the API
//!   key is missing, pdfium cannot be loaded, the input directory is
//!   unreadable, or a CSV file could not be written. Returned as
//!   `Err(Pdf2CsvError)` from [`crate::batch::run_batch`] and collected per
//!   file in [`crate::pipeline::export::ExportReport`].
//!
//! * [`DocumentError`]: **Non-fatal**: one document (or one of its images)
//!   failed. Stored inside [`crate::output::DocumentResult`]; the batch moves
//!   on to the next file.
//!
//! * [`ExtractionError`]: what an [`crate::pipeline::llm::StructuredExtractor`]
//!   returns. The batch driver wraps it into [`DocumentError::Extraction`]
//!   together with the offending path.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the edgequake-pdf2csv library.
///
/// Per-document failures use [`DocumentError`] and never surface here.
#[derive(Debug, Error)]
pub enum Pdf2CsvError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The AI service API key is not set.
    #[error("Missing API key: environment variable '{var}' is not set or empty.\nTry: export {var}=<your key> (or add it to .env)")]
    Configuration { var: String },

    /// The configured provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The input directory could not be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the pdf2csv binary or in the working directory.\n\
  • Install pdfium into a system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write one of the CSV outputs.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every output file the run attempted to write failed.
    #[error("None of the {attempted} output files could be written.\nFirst error: {first_error}")]
    NoOutputWritten {
        attempted: usize,
        first_error: String,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document or image.
///
/// `Read` and `Extraction` drop the document from every output; `ImageWrite`
/// only drops that image.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum DocumentError {
    /// The file is not a PDF, is corrupt, encrypted or unreadable.
    #[error("{path}: cannot read document: {detail}")]
    Read { path: PathBuf, detail: String },

    /// Structured extraction failed after all retries.
    #[error("{path}: structured extraction failed: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: ExtractionError,
    },

    /// One extracted image could not be written.
    #[error("{path}: failed to write image: {detail}")]
    ImageWrite { path: PathBuf, detail: String },
}

impl DocumentError {
    /// Whether this error removed the document from the outputs.
    pub fn is_document_fatal(&self) -> bool {
        !matches!(self, DocumentError::ImageWrite { .. })
    }
}

/// Failure of the external structured-extraction service.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ExtractionError {
    /// The service could not be reached or rejected the request.
    #[error("service unavailable after {retries} retries: {detail}")]
    Unavailable { retries: u32, detail: String },

    /// The call did not complete within the configured timeout.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered, but not with a JSON object.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },
}

//! # edgequake-pdf2csv
//!
//! Turn a folder of PDF reports into CSV tables using a Large Language Model.
//!
//! ## What it does
//!
//! Every PDF in a directory is read with pdfium, classified as Arabic or
//! English from its text, stripped of its embedded images, and sent to an LLM
//! together with a field schema in the document's own language. The model's
//! answers become rows in three files:
//!
//! | File | Rows |
//! |------|------|
//! | `arabic_data.csv`  | Arabic documents, Arabic field names |
//! | `english_data.csv` | English documents, English field names |
//! | `binary_data.csv`  | every document, each value reduced to `0` / `1` |
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory
//!  │
//!  ├─ 1. Discover  sorted *.pdf, non-recursive
//!  ├─ 2. Extract   text + images via pdfium (spawn_blocking)
//!  ├─ 3. Detect    arabic | english by Unicode range
//!  ├─ 4. Images    PNG files with random 8-char ids
//!  ├─ 5. Schema    random (or fixed) subset of 20 localized fields
//!  ├─ 6. LLM       schema-constrained JSON, retried with backoff
//!  ├─ 7. Route     + metadata → language collection + binary pool
//!  └─ 8. Export    three CSV files, each written atomically
//! ```
//!
//! A document that cannot be read or whose extraction fails is logged and
//! left out; the batch continues with the next file.
//!
//! ## Building analysis
//!
//! [`run_buildings`] walks a `data/<city>/<category>/<type>/<building>/تقارير/`
//! tree of building reports instead. Each report yields a row in
//! `building_data/buildings.csv` and a few model-generated improvement
//! suggestions in `ai_suggestions/suggestions.csv`; see [`building`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2csv::{run_batch, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Requires GEMINI_API_KEY in the environment.
//!     let config = BatchConfig::builder()
//!         .input_dir("reports")
//!         .output_dir("output")
//!         .build()?;
//!     let output = run_batch(&config).await?;
//!     eprintln!(
//!         "{} processed, {} skipped, {} failed",
//!         output.stats.processed, output.stats.skipped, output.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2csv` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2csv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod building;
pub mod config;
pub mod error;
pub mod language;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{inspect, run_batch, run_batch_sync};
pub use building::{
    building_status, run_buildings, run_buildings_sync, BuildingAnalyst, BuildingOutput,
    BuildingStatus,
};
pub use config::{BatchConfig, BatchConfigBuilder};
pub use error::{DocumentError, ExtractionError, Pdf2CsvError};
pub use language::{detect_language, Language};
pub use output::{
    BatchOutput, BatchStats, DocumentMetadata, DocumentResult, DocumentSummary, ExtractionRecord,
    FieldValue, ImageRecord, WrittenFile,
};
pub use pipeline::extract::{DocumentSource, PageImages, RawDocument};
pub use pipeline::llm::StructuredExtractor;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{FieldDef, FieldKind, FieldSchema, SchemaMode};

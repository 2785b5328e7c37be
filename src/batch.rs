//! Batch driver: discover PDFs, process each one, export the CSV files.
//!
//! Documents are processed one at a time in sorted path order. A document
//! that cannot be read or whose extraction fails is recorded in its
//! [`DocumentResult`] and contributes nothing to the outputs; the run moves on.
//! Only configuration problems and a total output failure end the run with
//! an error.

use crate::config::{BatchConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::{DocumentError, Pdf2CsvError};
use crate::language::{detect_language, Language};
use crate::output::{BatchOutput, BatchStats, DocumentMetadata, DocumentResult, DocumentSummary};
use crate::pipeline::aggregate::Aggregator;
use crate::pipeline::export::export_all;
use crate::pipeline::extract::{DocumentSource, PdfiumSource, RawDocument};
use crate::pipeline::images::persist_images;
use crate::pipeline::input::discover_pdfs;
use crate::pipeline::llm::{LlmExtractor, StructuredExtractor};
use crate::pipeline::pdfium::PdfiumLibrary;
use crate::schema::generate_schema;
use edgequake_llm::{LLMProvider, ProviderFactory};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Process every PDF in `config.input_dir` and write the CSV outputs.
///
/// # Returns
/// `Ok(BatchOutput)` when the run completed, even if some documents were
/// skipped or failed (see `output.stats` and each `DocumentResult`).
///
/// # Errors
/// Returns `Err(Pdf2CsvError)` only for fatal errors:
/// - API key missing or provider cannot be built
/// - Input directory unreadable
/// - pdfium cannot be loaded
/// - Every attempted output file failed to write
pub async fn run_batch(config: &BatchConfig) -> Result<BatchOutput, Pdf2CsvError> {
    let total_start = Instant::now();

    // ── Step 1: Extractor (API key check happens here) ──────────────────
    let extractor = resolve_extractor(config)?;

    // ── Step 2: Discover input ───────────────────────────────────────────
    let pdfs = discover_pdfs(&config.input_dir)?;
    if pdfs.is_empty() {
        info!("No PDF files found in {}", config.input_dir.display());
        return Ok(BatchOutput {
            documents: Vec::new(),
            written: Vec::new(),
            output_failures: Vec::new(),
            stats: BatchStats::default(),
        });
    }
    info!(
        "Found {} PDF(s) in {}",
        pdfs.len(),
        config.input_dir.display()
    );

    // ── Step 3: Document source ──────────────────────────────────────────
    let source = resolve_source(config)?;

    // ── Step 4: Process documents ────────────────────────────────────────
    let mut rng = run_rng(config);
    let mut aggregator = Aggregator::new();
    let mut documents = Vec::with_capacity(pdfs.len());
    let mut stats = BatchStats {
        discovered: pdfs.len(),
        ..Default::default()
    };

    let total = pdfs.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    for (i, path) in pdfs.iter().enumerate() {
        let index = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(path, index, total);
        }
        info!("Processing {}/{}: {}", index, total, path.display());

        let result = process_document(
            path,
            &source,
            extractor.as_ref(),
            config,
            &mut rng,
            &mut aggregator,
        )
        .await;

        record_stats(&mut stats, &result);
        match &result.error {
            None => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_complete(path, index, total);
                }
            }
            Some(e) => {
                warn!("{}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_error(path, index, total, &e.to_string());
                }
            }
        }
        documents.push(result);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.processed);
    }

    // ── Step 5: Export ───────────────────────────────────────────────────
    let report = export_all(&aggregator, &config.output_dir).await;
    if report.written.is_empty() && !report.failed.is_empty() {
        return Err(Pdf2CsvError::NoOutputWritten {
            attempted: report.attempted(),
            first_error: report.failed[0].to_string(),
        });
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Batch complete: {}/{} processed, {} skipped, {} failed, {}ms",
        stats.processed, stats.discovered, stats.skipped, stats.failed, stats.total_duration_ms
    );

    let output_failures = report
        .failed
        .iter()
        .map(|e| match e {
            Pdf2CsvError::OutputWriteFailed { path, .. } => (path.clone(), e.to_string()),
            other => (config.output_dir.clone(), other.to_string()),
        })
        .collect();

    Ok(BatchOutput {
        documents,
        written: report.written,
        output_failures,
        stats,
    })
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(config: &BatchConfig) -> Result<BatchOutput, Pdf2CsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2CsvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config))
}

/// Summarise every PDF in `config.input_dir` without calling the model.
///
/// Needs no API key and writes nothing.
pub async fn inspect(config: &BatchConfig) -> Result<Vec<DocumentSummary>, Pdf2CsvError> {
    let pdfs = discover_pdfs(&config.input_dir)?;
    if pdfs.is_empty() {
        return Ok(Vec::new());
    }
    let source = resolve_source(config)?;

    let mut summaries = Vec::with_capacity(pdfs.len());
    for path in pdfs {
        let file_size_bytes = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        let extracted = extract_blocking(&source, &path).await;
        let summary = match extracted {
            Ok(raw) => DocumentSummary {
                file_size_bytes,
                page_count: raw.page_count(),
                image_count: raw.image_count(),
                text_chars: raw.text.chars().count(),
                language: Some(detect_language(&raw.text)),
                error: None,
                path,
            },
            Err(e) => DocumentSummary {
                file_size_bytes,
                page_count: 0,
                image_count: 0,
                text_chars: 0,
                language: None,
                error: Some(e.to_string()),
                path,
            },
        };
        summaries.push(summary);
    }
    Ok(summaries)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run one document through extract → detect → images → schema → model →
/// aggregate. Never returns an error; failures land in `DocumentResult`.
async fn process_document(
    path: &Path,
    source: &Arc<dyn DocumentSource>,
    extractor: &dyn StructuredExtractor,
    config: &BatchConfig,
    rng: &mut StdRng,
    aggregator: &mut Aggregator,
) -> DocumentResult {
    let start = Instant::now();
    let mut result = DocumentResult {
        path: path.to_path_buf(),
        language: None,
        images: Vec::new(),
        warnings: Vec::new(),
        error: None,
        duration_ms: 0,
    };

    let outcome = async {
        let size_bytes = tokio::fs::metadata(path)
            .await
            .map_err(|e| DocumentError::Read {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
            .len();

        let raw = extract_blocking(source, path).await?;
        let language = detect_language(&raw.text);
        result.language = Some(language);
        info!(
            "{}: {} pages, {} images, detected {}",
            path.display(),
            raw.page_count(),
            raw.image_count(),
            language
        );

        let persisted = persist_images(path, &raw.pages, &config.images_dir, rng).await;
        result.images = persisted.images;
        result.warnings = persisted.failures;

        let schema = generate_schema(language, config.schema_mode, rng);
        debug!("{}: schema with {} fields", path.display(), schema.len());

        let record = extractor
            .extract_structured(&raw.text, &schema, language)
            .await
            .map_err(|source| DocumentError::Extraction {
                path: path.to_path_buf(),
                source,
            })?;

        let meta = DocumentMetadata {
            pdf_filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            language,
            image_paths: result.images.iter().map(|i| i.path.clone()).collect(),
            processing_timestamp: chrono::Utc::now().to_rfc3339(),
            document_size_mb: size_bytes as f64 / BYTES_PER_MB,
        };
        aggregator.route(record, &meta);
        Ok::<(), DocumentError>(())
    }
    .await;

    result.error = outcome.err();
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

/// The run's single RNG: seeded when `config.seed` is set.
pub(crate) fn run_rng(config: &BatchConfig) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Run a blocking [`DocumentSource::extract`] off the async workers.
pub(crate) async fn extract_blocking(
    source: &Arc<dyn DocumentSource>,
    path: &Path,
) -> Result<RawDocument, DocumentError> {
    let source = Arc::clone(source);
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || source.extract(&owned))
        .await
        .map_err(|e| DocumentError::Read {
            path: path.to_path_buf(),
            detail: format!("extraction task panicked: {e}"),
        })?
}

fn record_stats(stats: &mut BatchStats, result: &DocumentResult) {
    match &result.error {
        None => stats.processed += 1,
        Some(DocumentError::Read { .. }) => stats.skipped += 1,
        Some(_) => stats.failed += 1,
    }
    if result.is_success() {
        match result.language {
            Some(Language::Arabic) => stats.arabic_documents += 1,
            Some(Language::English) => stats.english_documents += 1,
            None => {}
        }
    }
    stats.images_written += result.images.len();
    stats.images_failed += result
        .warnings
        .iter()
        .filter(|w| matches!(w, DocumentError::ImageWrite { .. }))
        .count();
}

pub(crate) fn resolve_source(config: &BatchConfig) -> Result<Arc<dyn DocumentSource>, Pdf2CsvError> {
    if let Some(ref source) = config.source {
        return Ok(Arc::clone(source));
    }
    let library = PdfiumLibrary::locate()?;
    let source = match config.password {
        Some(ref password) => PdfiumSource::new(library).with_password(password.clone()),
        None => PdfiumSource::new(library),
    };
    Ok(Arc::new(source))
}

fn resolve_extractor(config: &BatchConfig) -> Result<Arc<dyn StructuredExtractor>, Pdf2CsvError> {
    if let Some(ref extractor) = config.extractor {
        return Ok(Arc::clone(extractor));
    }
    check_api_key(&config.api_key_env)?;
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmExtractor::new(provider, config)))
}

/// Fail fast when the API key variable is unset or blank.
pub fn check_api_key(var: &str) -> Result<(), Pdf2CsvError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(Pdf2CsvError::Configuration {
            var: var.to_string(),
        }),
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2CsvError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2CsvError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Named provider + model** (`config.provider_name`), model defaulting
///    to [`DEFAULT_MODEL`].
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 3. **Default**: [`DEFAULT_PROVIDER`] with `config.model` or
///    [`DEFAULT_MODEL`].
///
/// An injected extractor bypasses this entirely.
pub(crate) fn resolve_provider(config: &BatchConfig) -> Result<Arc<dyn LLMProvider>, Pdf2CsvError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    create_provider(DEFAULT_PROVIDER, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ImageRecord;
    use std::path::PathBuf;

    fn result(error: Option<DocumentError>, language: Option<Language>, images: usize) -> DocumentResult {
        DocumentResult {
            path: PathBuf::from("a.pdf"),
            language,
            images: (0..images)
                .map(|i| ImageRecord {
                    document: PathBuf::from("a.pdf"),
                    page: 1,
                    index: i + 1,
                    id: "abcdefgh".into(),
                    path: PathBuf::from(format!("img{i}.png")),
                })
                .collect(),
            warnings: vec![DocumentError::ImageWrite {
                path: PathBuf::from("x.png"),
                detail: "disk full".into(),
            }],
            error,
            duration_ms: 0,
        }
    }

    #[test]
    fn stats_distinguish_skipped_from_failed() {
        let mut stats = BatchStats::default();
        record_stats(&mut stats, &result(None, Some(Language::Arabic), 2));
        record_stats(
            &mut stats,
            &result(
                Some(DocumentError::Read {
                    path: PathBuf::from("b.pdf"),
                    detail: "not a PDF".into(),
                }),
                None,
                0,
            ),
        );
        record_stats(
            &mut stats,
            &result(
                Some(DocumentError::Extraction {
                    path: PathBuf::from("c.pdf"),
                    source: crate::error::ExtractionError::Timeout { secs: 60 },
                }),
                Some(Language::English),
                1,
            ),
        );

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.arabic_documents, 1);
        assert_eq!(stats.english_documents, 0);
        assert_eq!(stats.images_written, 3);
        assert_eq!(stats.images_failed, 3);
    }

    #[test]
    fn blank_api_key_is_a_configuration_error() {
        let var = "PDF2CSV_TEST_BLANK_KEY";
        std::env::set_var(var, "   ");
        let err = check_api_key(var).unwrap_err();
        assert!(matches!(err, Pdf2CsvError::Configuration { .. }));
        assert!(err.to_string().contains(var));
        std::env::remove_var(var);
    }

    #[test]
    fn unset_api_key_is_a_configuration_error() {
        assert!(check_api_key("PDF2CSV_TEST_SURELY_UNSET_KEY").is_err());
    }
}

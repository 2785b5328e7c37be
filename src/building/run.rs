//! Building analysis driver: scan the data tree, analyze each report, write
//! the building and suggestion files.
//!
//! Reports are processed one at a time in scan order. Each building gets a
//! random 12-character id, its images land in `building_images_dir/<id>/`,
//! and its row goes to `buildings.csv`. A report the model cannot analyze
//! still gets a row, built from its location with the condition marked
//! unspecified. Suggestions that fail leave the building without any.

use crate::batch::{check_api_key, extract_blocking, resolve_provider, resolve_source, run_rng};
use crate::building::analyst::BuildingAnalyst;
use crate::building::fields::{
    building_info_schema, suggestion_record, suggestion_schema, BuildingContext, BUILDING_ID_LEN,
};
use crate::building::scan::{scan_data_dir, BuildingSource};
use crate::config::BatchConfig;
use crate::error::{DocumentError, ExtractionError, Pdf2CsvError};
use crate::output::{ExtractionRecord, ImageRecord, WrittenFile};
use crate::pipeline::export::{render_language_csv, write_atomic, ExportReport};
use crate::pipeline::extract::DocumentSource;
use crate::pipeline::images::{persist_images, random_token};
use crate::pipeline::llm::LlmExtractor;
use crate::schema::FieldSchema;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const BUILDINGS_CSV: &str = "buildings.csv";
pub const BUILDINGS_JSON: &str = "buildings_detailed.json";
pub const SUGGESTIONS_CSV: &str = "suggestions.csv";
pub const SUGGESTIONS_JSON: &str = "suggestions_detailed.json";

/// Outcome of analyzing one building report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingResult {
    pub source: BuildingSource,
    pub building_id: String,
    pub images: Vec<ImageRecord>,
    /// Non-fatal problems (failed image writes).
    pub warnings: Vec<DocumentError>,
    /// Set when the report could not be read; such a building has no row.
    pub error: Option<DocumentError>,
    /// Why the building row is a fallback, when it is one.
    pub info_error: Option<ExtractionError>,
    /// Why the building has no suggestions, when the call failed.
    pub suggestion_error: Option<ExtractionError>,
    pub suggestions: usize,
    pub duration_ms: u64,
}

impl BuildingResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Run-level counters for building analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingStats {
    /// Reports found under the data directory.
    pub discovered: usize,
    /// Buildings that got a row, fallback rows included.
    pub analyzed: usize,
    /// Rows built without the model's answer.
    pub fallbacks: usize,
    /// Reports that could not be read.
    pub skipped: usize,
    pub suggestions: usize,
    pub images_written: usize,
    pub images_failed: usize,
    pub total_duration_ms: u64,
}

/// Everything a building run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingOutput {
    pub buildings: Vec<BuildingResult>,
    /// Files successfully written.
    pub written: Vec<WrittenFile>,
    /// Files that failed, with the error message.
    pub output_failures: Vec<(PathBuf, String)>,
    pub stats: BuildingStats,
}

/// Rows gathered during a run, in processing order.
#[derive(Debug, Default)]
struct Collected {
    buildings: Vec<ExtractionRecord>,
    suggestions: Vec<ExtractionRecord>,
}

/// Analyze every building report under `config.input_dir`.
///
/// # Errors
/// Returns `Err(Pdf2CsvError)` only for fatal errors:
/// - API key missing or provider cannot be built
/// - Data directory unreadable
/// - pdfium cannot be loaded
/// - Every attempted output file failed to write
pub async fn run_buildings(config: &BatchConfig) -> Result<BuildingOutput, Pdf2CsvError> {
    let total_start = Instant::now();

    let analyst = resolve_analyst(config)?;

    let reports = scan_data_dir(&config.input_dir)?;
    if reports.is_empty() {
        info!("No building reports found under {}", config.input_dir.display());
        return Ok(BuildingOutput::default());
    }
    info!(
        "Found {} building report(s) under {}",
        reports.len(),
        config.input_dir.display()
    );

    let source = resolve_source(config)?;
    let mut rng = run_rng(config);
    let info_schema = building_info_schema();
    let suggestion_schema = suggestion_schema();

    let mut collected = Collected::default();
    let mut buildings = Vec::with_capacity(reports.len());
    let mut stats = BuildingStats {
        discovered: reports.len(),
        ..Default::default()
    };

    let total = reports.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    for (i, report) in reports.into_iter().enumerate() {
        let index = i + 1;
        let path = report.pdf_path.clone();
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(&path, index, total);
        }
        info!("Building {}/{}: {}", index, total, report.building_name);

        let result = analyze_building(
            report,
            &source,
            analyst.as_ref(),
            (&info_schema, &suggestion_schema),
            config,
            &mut rng,
            &mut collected,
        )
        .await;

        record_stats(&mut stats, &result);
        match &result.error {
            None => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_complete(&path, index, total);
                }
            }
            Some(e) => {
                warn!("{}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_error(&path, index, total, &e.to_string());
                }
            }
        }
        buildings.push(result);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.analyzed);
    }

    let report = export_buildings(&collected, config).await;
    if report.written.is_empty() && !report.failed.is_empty() {
        return Err(Pdf2CsvError::NoOutputWritten {
            attempted: report.attempted(),
            first_error: report.failed[0].to_string(),
        });
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Building analysis complete: {}/{} analyzed ({} fallback), {} skipped, {} suggestions, {}ms",
        stats.analyzed,
        stats.discovered,
        stats.fallbacks,
        stats.skipped,
        stats.suggestions,
        stats.total_duration_ms
    );

    let output_failures = report
        .failed
        .iter()
        .map(|e| match e {
            Pdf2CsvError::OutputWriteFailed { path, .. } => (path.clone(), e.to_string()),
            other => (config.building_data_dir.clone(), other.to_string()),
        })
        .collect();

    Ok(BuildingOutput {
        buildings,
        written: report.written,
        output_failures,
        stats,
    })
}

/// Synchronous wrapper around [`run_buildings`].
pub fn run_buildings_sync(config: &BatchConfig) -> Result<BuildingOutput, Pdf2CsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2CsvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_buildings(config))
}

/// Read one report, write its images, ask for its fields and suggestions.
/// Never returns an error; failures land in `BuildingResult`.
async fn analyze_building(
    report: BuildingSource,
    source: &Arc<dyn DocumentSource>,
    analyst: &dyn BuildingAnalyst,
    (info_schema, suggestion_schema): (&FieldSchema, &FieldSchema),
    config: &BatchConfig,
    rng: &mut StdRng,
    collected: &mut Collected,
) -> BuildingResult {
    let start = Instant::now();
    let context = BuildingContext::new(random_token(rng, BUILDING_ID_LEN), report);
    let path = context.source.pdf_path.clone();
    let mut result = BuildingResult {
        source: context.source.clone(),
        building_id: context.building_id.clone(),
        images: Vec::new(),
        warnings: Vec::new(),
        error: None,
        info_error: None,
        suggestion_error: None,
        suggestions: 0,
        duration_ms: 0,
    };

    let raw = match extract_blocking(source, &path).await {
        Ok(raw) => raw,
        Err(e) => {
            result.error = Some(e);
            result.duration_ms = start.elapsed().as_millis() as u64;
            return result;
        }
    };

    let images_dir = config.building_images_dir.join(&context.building_id);
    let persisted = persist_images(&path, &raw.pages, &images_dir, rng).await;
    result.images = persisted.images;
    result.warnings = persisted.failures;
    info!(
        "Building {}: {} image(s) written",
        context.building_id,
        result.images.len()
    );

    let info = match analyst.building_info(&raw.text, &context, info_schema).await {
        Ok(info) => info,
        Err(e) => {
            warn!(
                "Building {}: analysis failed, using fallback row: {}",
                context.building_id, e
            );
            result.info_error = Some(e);
            context.fallback_record(info_schema)
        }
    };

    let image_paths: Vec<String> = result
        .images
        .iter()
        .map(|i| i.path.display().to_string())
        .collect();
    let building = context.building_record(&info, &image_paths, &chrono::Utc::now().to_rfc3339());

    match analyst.suggestions(&building, suggestion_schema).await {
        Ok(suggestions) => {
            let generated = chrono::Utc::now().to_rfc3339();
            for suggestion in &suggestions {
                let suggestion_id = random_token(rng, BUILDING_ID_LEN);
                collected.suggestions.push(suggestion_record(
                    &context.building_id,
                    &suggestion_id,
                    suggestion,
                    &generated,
                ));
            }
            result.suggestions = suggestions.len();
            info!(
                "Building {}: {} suggestion(s)",
                context.building_id, result.suggestions
            );
        }
        Err(e) => {
            warn!("Building {}: no suggestions: {}", context.building_id, e);
            result.suggestion_error = Some(e);
        }
    }

    collected.buildings.push(building);
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

fn record_stats(stats: &mut BuildingStats, result: &BuildingResult) {
    if result.is_success() {
        stats.analyzed += 1;
        if result.info_error.is_some() {
            stats.fallbacks += 1;
        }
    } else {
        stats.skipped += 1;
    }
    stats.suggestions += result.suggestions;
    stats.images_written += result.images.len();
    stats.images_failed += result
        .warnings
        .iter()
        .filter(|w| matches!(w, DocumentError::ImageWrite { .. }))
        .count();
}

fn resolve_analyst(config: &BatchConfig) -> Result<Arc<dyn BuildingAnalyst>, Pdf2CsvError> {
    if let Some(ref analyst) = config.analyst {
        return Ok(Arc::clone(analyst));
    }
    check_api_key(&config.api_key_env)?;
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmExtractor::new(provider, config)))
}

/// Render `records` as a pretty JSON array.
pub fn render_json(records: &[ExtractionRecord]) -> Result<Vec<u8>, serde_json::Error> {
    let rows: Vec<serde_json::Value> = records.iter().map(ExtractionRecord::to_json).collect();
    serde_json::to_vec_pretty(&rows)
}

/// Write the non-empty collections as CSV plus detailed JSON.
async fn export_buildings(collected: &Collected, config: &BatchConfig) -> ExportReport {
    let mut report = ExportReport::default();

    let jobs: [(&Path, &str, &str, &[ExtractionRecord]); 2] = [
        (
            config.building_data_dir.as_path(),
            BUILDINGS_CSV,
            BUILDINGS_JSON,
            collected.buildings.as_slice(),
        ),
        (
            config.suggestions_dir.as_path(),
            SUGGESTIONS_CSV,
            SUGGESTIONS_JSON,
            collected.suggestions.as_slice(),
        ),
    ];

    for (dir, csv_name, json_name, records) in jobs {
        if records.is_empty() {
            continue;
        }
        let csv_path = dir.join(csv_name);
        let rendered = render_language_csv(records).map_err(|e| e.to_string());
        write_one(&mut report, csv_path, rendered, records.len()).await;

        let json_path = dir.join(json_name);
        let rendered = render_json(records).map_err(|e| e.to_string());
        write_one(&mut report, json_path, rendered, records.len()).await;
    }
    report
}

async fn write_one(
    report: &mut ExportReport,
    path: PathBuf,
    rendered: Result<Vec<u8>, String>,
    rows: usize,
) {
    let result = match rendered {
        Ok(bytes) => write_atomic(&path, &bytes).await,
        Err(e) => Err(Pdf2CsvError::OutputWriteFailed {
            path: path.clone(),
            source: io::Error::other(e),
        }),
    };
    match result {
        Ok(()) => {
            info!("Wrote {} rows to {}", rows, path.display());
            report.written.push(WrittenFile { path, rows });
        }
        Err(e) => {
            warn!("{}", e);
            report.failed.push(e);
        }
    }
}

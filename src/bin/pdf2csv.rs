//! CLI binary for edgequake-pdf2csv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BatchConfig` and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2csv::{
    building_status, inspect, run_batch, run_buildings, BatchConfig, BatchOutput,
    BatchProgressCallback, BuildingOutput, BuildingStatus, DocumentSummary, ProgressCallback,
    SchemaMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch and a log line per
/// document.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the document in flight.
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Processing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} PDF(s)…"))
        ));
    }

    fn on_document_start(&self, path: &Path, _index: usize, _total: usize) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(file_name(path));
    }

    fn on_document_complete(&self, path: &Path, index: usize, total: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            file_name(path),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, path: &Path, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs();

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            file_name(path),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} PDF(s) processed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} PDF(s) processed  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every PDF in the current directory
  pdf2csv

  # Process a folder, write CSVs elsewhere
  pdf2csv reports/ --output-dir results/

  # Same 20 columns for every document, reproducible run
  pdf2csv reports/ --schema fixed --seed 42

  # Use another provider
  pdf2csv reports/ --provider openai --model gpt-4.1-nano --api-key-env OPENAI_API_KEY

  # List PDFs with page/image counts and language (no API key needed)
  pdf2csv --inspect-only reports/

  # Analyze building reports under data/<city>/<category>/<type>/<building>/تقارير/
  pdf2csv --buildings

  # What building analysis has written so far
  pdf2csv --building-status

OUTPUTS:
  output/arabic_data.csv    Arabic documents, Arabic field names
  output/english_data.csv   English documents, English field names
  output/binary_data.csv    every document, values reduced to 0/1
  extracted_images/         {pdf}_page_{n}_img_{k}_{id}.png

  With --buildings:
  building_data/buildings.csv          one row per building (+ buildings_detailed.json)
  ai_suggestions/suggestions.csv       one row per suggestion (+ suggestions_detailed.json)
  building_images/{building_id}/       the report's images

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (required by default)
  EDGEQUAKE_LLM_PROVIDER  Override provider when set with EDGEQUAKE_MODEL
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. RUST_LOG=edgequake_pdf2csv=debug

  A .env file in the working directory is loaded before anything else.
"#;

/// Extract structured CSV data from a folder of PDF reports using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2csv",
    version,
    about = "Extract structured CSV data from a folder of PDF reports using an LLM",
    long_about = "Scan a directory for PDF files, detect each document's language (Arabic or \
English), extract its text and embedded images, ask an LLM to fill a field schema, and write \
arabic_data.csv, english_data.csv and binary_data.csv.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the PDFs (not searched recursively).
    /// Default: `.`, or `data` with --buildings.
    #[arg(env = "PDF2CSV_INPUT_DIR")]
    dir: Option<PathBuf>,

    /// Directory receiving the CSV files.
    #[arg(long, env = "PDF2CSV_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Directory receiving extracted images.
    #[arg(long, env = "PDF2CSV_IMAGES_DIR", default_value = "extracted_images")]
    images_dir: PathBuf,

    /// Building analysis: directory receiving one image folder per building.
    #[arg(long, env = "PDF2CSV_BUILDING_IMAGES_DIR", default_value = "building_images")]
    building_images_dir: PathBuf,

    /// Building analysis: directory receiving buildings.csv.
    #[arg(long, env = "PDF2CSV_BUILDING_DATA_DIR", default_value = "building_data")]
    building_data_dir: PathBuf,

    /// Building analysis: directory receiving suggestions.csv.
    #[arg(long, env = "PDF2CSV_SUGGESTIONS_DIR", default_value = "ai_suggestions")]
    suggestions_dir: PathBuf,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "PDF2CSV_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID. Default: gemini-2.0-flash.
    #[arg(long, env = "PDF2CSV_MODEL")]
    model: Option<String>,

    /// Environment variable that must hold the API key.
    #[arg(long, env = "PDF2CSV_API_KEY_ENV", default_value = "GEMINI_API_KEY")]
    api_key_env: String,

    /// Schema per document: random subset or the fixed full field list.
    #[arg(long, env = "PDF2CSV_SCHEMA", value_enum, default_value = "random")]
    schema: SchemaArg,

    /// Minimum fields in a random schema.
    #[arg(long, env = "PDF2CSV_MIN_FIELDS", default_value_t = 8)]
    min_fields: usize,

    /// Maximum fields in a random schema.
    #[arg(long, env = "PDF2CSV_MAX_FIELDS", default_value_t = 12)]
    max_fields: usize,

    /// Seed for schema selection and image ids.
    #[arg(long, env = "PDF2CSV_SEED")]
    seed: Option<u64>,

    /// Characters of document text sent to the model.
    #[arg(long, env = "PDF2CSV_MAX_TEXT_CHARS", default_value_t = 5000)]
    max_text_chars: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2CSV_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per document.
    #[arg(long, env = "PDF2CSV_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Retries per document on LLM failure.
    #[arg(long, env = "PDF2CSV_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2CSV_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2CSV_PASSWORD")]
    password: Option<String>,

    /// List PDFs with page count, image count and language; no extraction.
    #[arg(long, conflicts_with_all = ["buildings", "building_status"])]
    inspect_only: bool,

    /// Analyze building reports instead of flat PDFs.
    #[arg(long, conflicts_with = "building_status")]
    buildings: bool,

    /// Report what building analysis has written so far; no extraction.
    #[arg(long)]
    building_status: bool,

    /// Print the run result (or inspect listing) as JSON on stdout.
    #[arg(long, env = "PDF2CSV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2CSV_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SchemaArg {
    Random,
    Fixed,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && !cli.inspect_only
        && !cli.building_status;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Building status ──────────────────────────────────────────────────
    if cli.building_status {
        let status = building_status(&config);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&status).context("Failed to serialise status")?
            );
        } else {
            print_building_status(&config, &status);
        }
        return Ok(());
    }

    // ── Building analysis ────────────────────────────────────────────────
    if cli.buildings {
        let output = run_buildings(&config)
            .await
            .context("Building analysis failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else if !cli.quiet {
            print_building_summary(&config, &output);
        }
        return Ok(());
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summaries = inspect(&config).await.context("Failed to inspect PDFs")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summaries).context("Failed to serialise listing")?
            );
        } else {
            print_inspection(&config.input_dir, &summaries);
        }
        return Ok(());
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let output = run_batch(&config).await.context("Batch failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        print_summary(&config.input_dir, &output);
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let schema_mode = match cli.schema {
        SchemaArg::Random => SchemaMode::Randomized {
            min_fields: cli.min_fields,
            max_fields: cli.max_fields,
        },
        SchemaArg::Fixed => SchemaMode::Fixed,
    };

    let default_dir = if cli.buildings { "data" } else { "." };
    let dir = cli.dir.clone().unwrap_or_else(|| PathBuf::from(default_dir));

    let mut builder = BatchConfig::builder()
        .input_dir(dir)
        .output_dir(&cli.output_dir)
        .images_dir(&cli.images_dir)
        .building_images_dir(&cli.building_images_dir)
        .building_data_dir(&cli.building_data_dir)
        .suggestions_dir(&cli.suggestions_dir)
        .api_key_env(&cli.api_key_env)
        .schema_mode(schema_mode)
        .max_text_chars(cli.max_text_chars)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_inspection(dir: &Path, summaries: &[DocumentSummary]) {
    if summaries.is_empty() {
        println!("No PDF files found in {}", dir.display());
        return;
    }
    println!(
        "{:<40} {:>6} {:>7} {:>9} {:>9} {:>9}",
        "File", "Pages", "Images", "Chars", "Size KB", "Language"
    );
    for s in summaries {
        let name = file_name(&s.path);
        match (&s.error, s.language) {
            (Some(e), _) => println!("{:<40} {}", name, red(e)),
            (None, language) => println!(
                "{:<40} {:>6} {:>7} {:>9} {:>9} {:>9}",
                name,
                s.page_count,
                s.image_count,
                s.text_chars,
                s.file_size_bytes / 1024,
                language.map(|l| l.as_str()).unwrap_or("-"),
            ),
        }
    }
}

fn print_summary(dir: &Path, output: &BatchOutput) {
    let stats = &output.stats;
    if stats.discovered == 0 {
        eprintln!("No PDF files found in {}", dir.display());
        return;
    }

    eprintln!(
        "{}  {}/{} processed  ({} skipped, {} failed)  {}ms",
        if stats.skipped + stats.failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.processed,
        stats.discovered,
        stats.skipped,
        stats.failed,
        stats.total_duration_ms,
    );
    eprintln!(
        "   {} arabic  /  {} english, {} images written{}",
        stats.arabic_documents,
        stats.english_documents,
        stats.images_written,
        if stats.images_failed > 0 {
            format!(", {} failed", red(&stats.images_failed.to_string()))
        } else {
            String::new()
        },
    );
    for file in &output.written {
        eprintln!(
            "   {} {}  {}",
            green("→"),
            bold(&file.path.display().to_string()),
            dim(&format!("{} rows", file.rows)),
        );
    }
    for (path, err) in &output.output_failures {
        eprintln!("   {} {}  {}", red("✗"), path.display(), red(err));
    }
    if output.written.is_empty() && output.output_failures.is_empty() {
        eprintln!("   {}", dim("No records extracted; no CSV written."));
    }
}

fn print_building_summary(config: &BatchConfig, output: &BuildingOutput) {
    let stats = &output.stats;
    if stats.discovered == 0 {
        eprintln!("No building reports found under {}", config.input_dir.display());
        return;
    }

    eprintln!(
        "{}  {}/{} buildings analyzed  ({} fallback, {} skipped)  {}ms",
        if stats.skipped + stats.fallbacks == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.analyzed,
        stats.discovered,
        stats.fallbacks,
        stats.skipped,
        stats.total_duration_ms,
    );
    eprintln!(
        "   {} suggestions, {} images written{}",
        stats.suggestions,
        stats.images_written,
        if stats.images_failed > 0 {
            format!(", {} failed", red(&stats.images_failed.to_string()))
        } else {
            String::new()
        },
    );
    eprintln!(
        "   {} {}",
        dim("images in"),
        config.building_images_dir.display()
    );
    for file in &output.written {
        eprintln!(
            "   {} {}  {}",
            green("→"),
            bold(&file.path.display().to_string()),
            dim(&format!("{} rows", file.rows)),
        );
    }
    for (path, err) in &output.output_failures {
        eprintln!("   {} {}  {}", red("✗"), path.display(), red(err));
    }
}

fn print_building_status(config: &BatchConfig, status: &BuildingStatus) {
    println!("{}", bold("Building analysis status"));
    println!("  Buildings processed: {}", status.buildings.len());
    println!("  Images extracted:    {}", status.images);
    for id in status.buildings.iter().take(5) {
        println!("    {}", dim(id));
    }
    if status.buildings.len() > 5 {
        println!("    {}", dim(&format!("... and {} more", status.buildings.len() - 5)));
    }

    for (dir, files) in [
        (&config.building_data_dir, &status.data_files),
        (&config.suggestions_dir, &status.suggestion_files),
    ] {
        println!("  {}:", dir.display());
        if files.is_empty() {
            println!("    {}", dim("(none)"));
        }
        for f in files {
            println!("    {:<32} {:>10} bytes", f.name, f.size_bytes);
        }
    }
}

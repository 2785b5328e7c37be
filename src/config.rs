//! Configuration types for a batch run.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The builder clamps numeric knobs to sane ranges and
//! `build()` rejects combinations that cannot work.

use crate::building::BuildingAnalyst;
use crate::error::Pdf2CsvError;
use crate::pipeline::export::{ARABIC_CSV, BINARY_CSV, ENGLISH_CSV};
use crate::pipeline::extract::DocumentSource;
use crate::pipeline::llm::StructuredExtractor;
use crate::progress::ProgressCallback;
use crate::schema::{pool_size, SchemaMode};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is named.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Environment variable holding the AI service API key.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Configuration for a batch run.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2csv::{BatchConfig, SchemaMode};
///
/// let config = BatchConfig::builder()
///     .input_dir("reports")
///     .schema_mode(SchemaMode::Fixed)
///     .seed(42)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Directory scanned (non-recursively) for `*.pdf`. Default: `.`.
    pub input_dir: PathBuf,

    /// Directory receiving the three CSV files. Default: `output`.
    pub output_dir: PathBuf,

    /// Directory receiving extracted images. Default: `extracted_images`.
    pub images_dir: PathBuf,

    /// Building analysis: one image directory per building id inside it.
    /// Default: `building_images`.
    pub building_images_dir: PathBuf,

    /// Building analysis: `buildings.csv` and its JSON. Default: `building_data`.
    pub building_data_dir: PathBuf,

    /// Building analysis: `suggestions.csv` and its JSON. Default: `ai_suggestions`.
    pub suggestions_dir: PathBuf,

    /// Per-document schema generation. Default: randomized, 8–12 fields.
    pub schema_mode: SchemaMode,

    /// Seed for schema selection and image ids. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// LLM provider name (e.g. "gemini", "openai"). Default: [`DEFAULT_PROVIDER`].
    pub provider_name: Option<String>,

    /// LLM model identifier. Default: [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Environment variable that must hold the API key. Default: [`DEFAULT_API_KEY_ENV`].
    ///
    /// Checked before any document is touched. Ignored when `extractor` is set.
    pub api_key_env: String,

    /// Pre-constructed extractor. Takes precedence over provider resolution.
    pub extractor: Option<Arc<dyn StructuredExtractor>>,

    /// Pre-constructed building analyst. Takes precedence over provider
    /// resolution in building analysis.
    pub analyst: Option<Arc<dyn BuildingAnalyst>>,

    /// Pre-constructed document source. Default: pdfium.
    pub source: Option<Arc<dyn DocumentSource>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per response. Default: 2048.
    pub max_tokens: usize,

    /// Retries per document on a failed extraction call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Characters of document text sent to the model. Default: 5000.
    pub max_text_chars: usize,

    /// User password tried on every PDF. Default: none.
    pub password: Option<String>,

    /// Optional progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("output"),
            images_dir: PathBuf::from("extracted_images"),
            building_images_dir: PathBuf::from("building_images"),
            building_data_dir: PathBuf::from("building_data"),
            suggestions_dir: PathBuf::from("ai_suggestions"),
            schema_mode: SchemaMode::default(),
            seed: None,
            provider_name: None,
            model: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            extractor: None,
            analyst: None,
            source: None,
            temperature: 0.1,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            max_text_chars: 5000,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("images_dir", &self.images_dir)
            .field("building_images_dir", &self.building_images_dir)
            .field("building_data_dir", &self.building_data_dir)
            .field("suggestions_dir", &self.suggestions_dir)
            .field("schema_mode", &self.schema_mode)
            .field("seed", &self.seed)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("api_key_env", &self.api_key_env)
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn StructuredExtractor>"))
            .field("analyst", &self.analyst.as_ref().map(|_| "<dyn BuildingAnalyst>"))
            .field("source", &self.source.as_ref().map(|_| "<dyn DocumentSource>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_text_chars", &self.max_text_chars)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path of the Arabic CSV.
    pub fn arabic_csv_path(&self) -> PathBuf {
        self.output_dir.join(ARABIC_CSV)
    }

    /// Path of the English CSV.
    pub fn english_csv_path(&self) -> PathBuf {
        self.output_dir.join(ENGLISH_CSV)
    }

    /// Path of the binary CSV.
    pub fn binary_csv_path(&self) -> PathBuf {
        self.output_dir.join(BINARY_CSV)
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn building_images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.building_images_dir = dir.into();
        self
    }

    pub fn building_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.building_data_dir = dir.into();
        self
    }

    pub fn suggestions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.suggestions_dir = dir.into();
        self
    }

    pub fn schema_mode(mut self, mode: SchemaMode) -> Self {
        self.config.schema_mode = mode;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn StructuredExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn analyst(mut self, analyst: Arc<dyn BuildingAnalyst>) -> Self {
        self.config.analyst = Some(analyst);
        self
    }

    pub fn source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.config.source = Some(source);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_text_chars(mut self, n: usize) -> Self {
        self.config.max_text_chars = n;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, Pdf2CsvError> {
        let c = &self.config;
        if let SchemaMode::Randomized {
            min_fields,
            max_fields,
        } = c.schema_mode
        {
            if min_fields == 0 {
                return Err(Pdf2CsvError::InvalidConfig(
                    "Schema needs at least one field (min_fields ≥ 1)".into(),
                ));
            }
            if min_fields > max_fields {
                return Err(Pdf2CsvError::InvalidConfig(format!(
                    "min_fields ({min_fields}) must be ≤ max_fields ({max_fields})"
                )));
            }
            let pool = pool_size();
            if max_fields > pool {
                return Err(Pdf2CsvError::InvalidConfig(format!(
                    "max_fields ({max_fields}) exceeds the {pool} candidate fields"
                )));
            }
        }
        if c.max_text_chars == 0 {
            return Err(Pdf2CsvError::InvalidConfig(
                "max_text_chars must be ≥ 1".into(),
            ));
        }
        if c.output_dir == c.images_dir {
            return Err(Pdf2CsvError::InvalidConfig(
                "output_dir and images_dir must differ".into(),
            ));
        }
        if c.building_images_dir == c.building_data_dir
            || c.building_images_dir == c.suggestions_dir
        {
            return Err(Pdf2CsvError::InvalidConfig(
                "building_images_dir must differ from building_data_dir and suggestions_dir".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BatchConfig::default();
        assert_eq!(c.input_dir, PathBuf::from("."));
        assert_eq!(c.api_key_env, "GEMINI_API_KEY");
        assert_eq!(c.max_text_chars, 5000);
        assert_eq!(c.english_csv_path(), PathBuf::from("output/english_data.csv"));
        assert_eq!(c.binary_csv_path(), PathBuf::from("output/binary_data.csv"));
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = BatchConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn inverted_field_bounds_rejected() {
        let err = BatchConfig::builder()
            .schema_mode(SchemaMode::Randomized {
                min_fields: 10,
                max_fields: 5,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("min_fields"));
    }

    #[test]
    fn field_bounds_above_pool_rejected() {
        for (min_fields, max_fields) in [(25, 30), (8, 21), (21, 21)] {
            let err = BatchConfig::builder()
                .schema_mode(SchemaMode::Randomized {
                    min_fields,
                    max_fields,
                })
                .build()
                .unwrap_err();
            assert!(matches!(err, Pdf2CsvError::InvalidConfig(_)));
            assert!(err.to_string().contains("max_fields"));
        }

        let whole_pool = BatchConfig::builder()
            .schema_mode(SchemaMode::Randomized {
                min_fields: 20,
                max_fields: 20,
            })
            .build();
        assert!(whole_pool.is_ok());
    }

    #[test]
    fn zero_min_fields_rejected() {
        assert!(BatchConfig::builder()
            .schema_mode(SchemaMode::Randomized {
                min_fields: 0,
                max_fields: 5,
            })
            .build()
            .is_err());
    }

    #[test]
    fn building_defaults_and_dir_clash() {
        let c = BatchConfig::default();
        assert_eq!(c.building_images_dir, PathBuf::from("building_images"));
        assert_eq!(c.building_data_dir, PathBuf::from("building_data"));
        assert_eq!(c.suggestions_dir, PathBuf::from("ai_suggestions"));

        assert!(BatchConfig::builder()
            .building_images_dir("shared")
            .suggestions_dir("shared")
            .build()
            .is_err());
    }

    #[test]
    fn shared_output_and_image_dirs_rejected() {
        assert!(BatchConfig::builder()
            .output_dir("out")
            .images_dir("out")
            .build()
            .is_err());
    }

    #[test]
    fn debug_hides_injected_extractor() {
        let s = format!("{:?}", BatchConfig::default());
        assert!(s.contains("BatchConfig"));
        assert!(s.contains("extractor: None"));

        let with_pw = BatchConfig::builder().password("hunter2").build().unwrap();
        assert!(!format!("{:?}", with_pw).contains("hunter2"));
    }
}

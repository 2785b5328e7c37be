//! Record and result types produced by a batch run.

use crate::error::DocumentError;
use crate::language::Language;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A single extracted value.
///
/// Records are dynamic (their fields come from a per-document schema), so
/// each value carries its own kind instead of living in a typed struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Render for a CSV cell. `Null` renders empty; whole numbers drop the
    /// fractional part.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Null => String::new(),
        }
    }
}

impl FieldValue {
    /// Plain JSON form: strings, numbers (whole numbers as integers), ISO
    /// dates and `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serde_json::Value::from(*n as i64)
            }
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            FieldValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cell())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<usize> for FieldValue {
    fn from(n: usize) -> Self {
        FieldValue::Number(n as f64)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One document's structured fields, in schema order followed by metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    fields: IndexMap<String, FieldValue>,
}

impl ExtractionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field. An overwritten field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ExtractionRecord {
    /// The record as a flat JSON object, fields in order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, FieldValue)> for ExtractionRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// An image written to the images directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Source PDF.
    pub document: PathBuf,
    /// 1-indexed page number.
    pub page: usize,
    /// 1-indexed position within the page.
    pub index: usize,
    /// Random 8-character alphanumeric suffix.
    pub id: String,
    pub path: PathBuf,
}

/// Metadata appended to every record before routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub pdf_filename: String,
    pub language: Language,
    pub image_paths: Vec<PathBuf>,
    /// RFC 3339 processing timestamp.
    pub processing_timestamp: String,
    /// File size in MiB, rounded to 2 decimals.
    pub document_size_mb: f64,
}

impl DocumentMetadata {
    pub fn image_count(&self) -> usize {
        self.image_paths.len()
    }
}

/// Outcome of processing one PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub path: PathBuf,
    /// `None` when the document could not be read.
    pub language: Option<Language>,
    pub images: Vec<ImageRecord>,
    /// Non-fatal problems (failed image writes).
    pub warnings: Vec<DocumentError>,
    /// Set when the document contributed no record.
    pub error: Option<DocumentError>,
    pub duration_ms: u64,
}

impl DocumentResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Run-level counters for the end-of-run summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// PDFs found in the input directory.
    pub discovered: usize,
    /// Documents that contributed a record.
    pub processed: usize,
    /// Documents that could not be read.
    pub skipped: usize,
    /// Documents whose structured extraction failed.
    pub failed: usize,
    pub arabic_documents: usize,
    pub english_documents: usize,
    pub images_written: usize,
    pub images_failed: usize,
    pub total_duration_ms: u64,
}

/// What inspect mode reports for one PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub path: PathBuf,
    pub file_size_bytes: u64,
    pub page_count: usize,
    pub image_count: usize,
    /// Extracted text length in characters.
    pub text_chars: usize,
    /// `None` when the document could not be read.
    pub language: Option<Language>,
    pub error: Option<String>,
}

/// A CSV file written at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// Data rows, excluding the header.
    pub rows: usize,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub documents: Vec<DocumentResult>,
    /// CSV files successfully written.
    pub written: Vec<WrittenFile>,
    /// CSV files that failed, with the error message.
    pub output_failures: Vec<(PathBuf, String)>,
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(FieldValue::Number(1_000_000.0).to_cell(), "1000000");
        assert_eq!(FieldValue::Number(-3.0).to_cell(), "-3");
        assert_eq!(FieldValue::Number(2.75).to_cell(), "2.75");
    }

    #[test]
    fn null_renders_empty() {
        assert_eq!(FieldValue::Null.to_cell(), "");
    }

    #[test]
    fn dates_render_iso() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(FieldValue::Date(d).to_cell(), "2024-03-31");
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut r = ExtractionRecord::new();
        r.insert("company_name", "Test Corp");
        r.insert("image_count", 7.0);
        r.insert("ceo_name", "Jane Doe");
        r.insert("image_count", 2usize);

        let names: Vec<&str> = r.names().collect();
        assert_eq!(names, vec!["company_name", "image_count", "ceo_name"]);
        assert_eq!(r.get("image_count"), Some(&FieldValue::Number(2.0)));
    }

    #[test]
    fn plain_json_form() {
        let mut r = ExtractionRecord::new();
        r.insert("floors_count", 4.0);
        r.insert("total_area", 120.5);
        r.insert("report_date", FieldValue::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        r.insert("inspector_name", FieldValue::Null);
        assert_eq!(
            r.to_json(),
            serde_json::json!({
                "floors_count": 4,
                "total_area": 120.5,
                "report_date": "2024-02-01",
                "inspector_name": null
            })
        );
    }

    #[test]
    fn field_value_serialises_tagged() {
        let json = serde_json::to_string(&FieldValue::Number(5.0)).unwrap();
        assert_eq!(json, r#"{"kind":"number","value":5.0}"#);
    }
}

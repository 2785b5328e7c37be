//! CSV export of the aggregated collections.
//!
//! Records in one collection can carry different fields (randomized schemas),
//! so each file's header is the union of every record's field names in
//! first-seen order. Absent and `Null` values render as empty cells.
//!
//! The binary file holds every record regardless of language with each value
//! reduced to `0` or `1`.
//!
//! Each file is rendered in memory, written to a temp path and renamed into
//! place. A failure affects only that file.

use crate::error::Pdf2CsvError;
use crate::output::{ExtractionRecord, FieldValue, WrittenFile};
use crate::pipeline::aggregate::Aggregator;
use csv::{QuoteStyle, WriterBuilder};
use indexmap::IndexSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ARABIC_CSV: &str = "arabic_data.csv";
pub const ENGLISH_CSV: &str = "english_data.csv";
pub const BINARY_CSV: &str = "binary_data.csv";

/// Outcome of writing the output files.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<WrittenFile>,
    pub failed: Vec<Pdf2CsvError>,
}

impl ExportReport {
    pub fn attempted(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

/// Union of field names across `records`, in first-seen order.
pub fn column_union(records: &[ExtractionRecord]) -> Vec<String> {
    let mut columns: IndexSet<&str> = IndexSet::new();
    for record in records {
        columns.extend(record.names());
    }
    columns.into_iter().map(str::to_string).collect()
}

/// Reduce a value to `0` or `1`.
///
/// Text is `1` when non-blank. The literal strings `"0"` and `"1"` keep their
/// value, so encoding an already-binary record gives the same record back.
pub fn encode_binary(value: Option<&FieldValue>) -> u8 {
    match value {
        None | Some(FieldValue::Null) => 0,
        Some(FieldValue::Number(n)) => u8::from(*n > 0.0),
        Some(FieldValue::Text(s)) => match s.trim() {
            "0" | "" => 0,
            _ => 1,
        },
        Some(FieldValue::Date(_)) => 1,
    }
}

/// Render a language collection as CSV bytes.
pub fn render_language_csv(records: &[ExtractionRecord]) -> Result<Vec<u8>, csv::Error> {
    render(records, |record, column| {
        record.get(column).map(FieldValue::to_cell).unwrap_or_default()
    })
}

/// Render the binary collection as CSV bytes.
pub fn render_binary_csv(records: &[ExtractionRecord]) -> Result<Vec<u8>, csv::Error> {
    render(records, |record, column| {
        encode_binary(record.get(column)).to_string()
    })
}

fn render<F>(records: &[ExtractionRecord], cell: F) -> Result<Vec<u8>, csv::Error>
where
    F: Fn(&ExtractionRecord, &str) -> String,
{
    let columns = column_union(records);
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    wtr.write_record(&columns)?;
    for record in records {
        wtr.write_record(columns.iter().map(|c| cell(record, c)))?;
    }
    wtr.into_inner()
        .map_err(|e| csv::Error::from(io::Error::other(e.to_string())))
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2CsvError> {
    let failed = |source| Pdf2CsvError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(failed(e));
    }
    Ok(())
}

/// Write the non-empty collections of `agg` into `output_dir`.
pub async fn export_all(agg: &Aggregator, output_dir: &Path) -> ExportReport {
    let mut report = ExportReport::default();

    let jobs: [(&str, &[ExtractionRecord], bool); 3] = [
        (ARABIC_CSV, agg.arabic(), false),
        (ENGLISH_CSV, agg.english(), false),
        (BINARY_CSV, agg.all(), true),
    ];

    for (name, records, binary) in jobs {
        if records.is_empty() {
            continue;
        }
        let path: PathBuf = output_dir.join(name);

        let rendered = if binary {
            render_binary_csv(records)
        } else {
            render_language_csv(records)
        };
        let result = match rendered {
            Ok(bytes) => write_atomic(&path, &bytes).await,
            Err(e) => Err(Pdf2CsvError::OutputWriteFailed {
                path: path.clone(),
                source: io::Error::other(e.to_string()),
            }),
        };

        match result {
            Ok(()) => {
                info!("Wrote {} rows to {}", records.len(), path.display());
                report.written.push(WrittenFile {
                    path,
                    rows: records.len(),
                });
            }
            Err(e) => {
                warn!("{}", e);
                report.failed.push(e);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::output::DocumentMetadata;
    use chrono::NaiveDate;

    fn record(pairs: &[(&str, FieldValue)]) -> ExtractionRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn meta(name: &str, language: Language) -> DocumentMetadata {
        DocumentMetadata {
            pdf_filename: name.into(),
            language,
            image_paths: vec![],
            processing_timestamp: "2024-05-01T12:00:00+00:00".into(),
            document_size_mb: 0.5,
        }
    }

    #[test]
    fn header_is_union_in_first_seen_order() {
        let records = vec![
            record(&[("a", 1.0.into()), ("b", "x".into())]),
            record(&[("c", 2.0.into()), ("a", 3.0.into())]),
        ];
        assert_eq!(column_union(&records), vec!["a", "b", "c"]);

        let csv = String::from_utf8(render_language_csv(&records).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], r#""a","b","c""#);
        assert_eq!(lines[1], r#"1,"x","""#);
        assert_eq!(lines[2], r#"3,"",2"#);
    }

    #[test]
    fn numeric_rule() {
        assert_eq!(encode_binary(Some(&FieldValue::Number(1_000_000.0))), 1);
        assert_eq!(encode_binary(Some(&FieldValue::Number(0.5))), 1);
        assert_eq!(encode_binary(Some(&FieldValue::Number(0.0))), 0);
        assert_eq!(encode_binary(Some(&FieldValue::Number(-42.0))), 0);
    }

    #[test]
    fn numeric_looking_text_is_still_text() {
        assert_eq!(encode_binary(Some(&FieldValue::from("-3"))), 1);
        assert_eq!(encode_binary(Some(&FieldValue::from("0.0"))), 1);
        assert_eq!(encode_binary(Some(&FieldValue::from("12.5"))), 1);
        assert_eq!(encode_binary(Some(&FieldValue::from("1"))), 1);
        assert_eq!(encode_binary(Some(&FieldValue::from(" 0 "))), 0);
    }

    #[test]
    fn non_numeric_rules() {
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(encode_binary(Some(&FieldValue::from("Test Corp"))), 1);
        assert_eq!(encode_binary(Some(&FieldValue::from("   "))), 0);
        assert_eq!(encode_binary(Some(&date)), 1);
        assert_eq!(encode_binary(Some(&FieldValue::Null)), 0);
        assert_eq!(encode_binary(None), 0);
    }

    #[test]
    fn binary_encoding_is_idempotent() {
        let values = [
            FieldValue::Number(0.0),
            FieldValue::Number(1.0),
            FieldValue::from("0"),
            FieldValue::from("1"),
        ];
        for v in &values {
            let once = encode_binary(Some(v));
            let twice = encode_binary(Some(&FieldValue::Number(f64::from(once))));
            let as_text = encode_binary(Some(&FieldValue::Text(once.to_string())));
            assert_eq!(once, twice);
            assert_eq!(once, as_text);
        }
    }

    #[test]
    fn binary_csv_fills_absent_with_zero() {
        let records = vec![
            record(&[("revenue", 5.0.into())]),
            record(&[("ceo", "Jane".into())]),
        ];
        let csv = String::from_utf8(render_binary_csv(&records).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec![r#""revenue","ceo""#, "1,0", "0,1"]);
    }

    #[test]
    fn non_ascii_fields_are_preserved() {
        let records = vec![record(&[("اسم_الشركة", "شركة الاختبار".into())])];
        let csv = String::from_utf8(render_language_csv(&records).unwrap()).unwrap();
        assert!(csv.contains("\"اسم_الشركة\""));
        assert!(csv.contains("\"شركة الاختبار\""));
    }

    #[tokio::test]
    async fn empty_collections_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = Aggregator::new();
        agg.route(
            record(&[("company_name", "Test Corp".into())]),
            &meta("report_en.pdf", Language::English),
        );

        let report = export_all(&agg, dir.path()).await;
        assert!(report.failed.is_empty());
        assert_eq!(report.attempted(), 2);
        assert!(dir.path().join(ENGLISH_CSV).exists());
        assert!(dir.path().join(BINARY_CSV).exists());
        assert!(!dir.path().join(ARABIC_CSV).exists());
        assert!(!dir.path().join("english_data.csv.tmp").exists());
    }

    #[tokio::test]
    async fn failed_file_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the target name makes the rename fail.
        std::fs::create_dir(dir.path().join(ENGLISH_CSV)).unwrap();

        let mut agg = Aggregator::new();
        agg.route(
            record(&[("company_name", "Test Corp".into())]),
            &meta("report_en.pdf", Language::English),
        );
        agg.route(
            record(&[("اسم_الشركة", "شركة".into())]),
            &meta("report_ar.pdf", Language::Arabic),
        );

        let report = export_all(&agg, dir.path()).await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.written.len(), 2);
        assert!(matches!(
            report.failed[0],
            Pdf2CsvError::OutputWriteFailed { .. }
        ));
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_atomic(&path, b"old").await.unwrap();
        write_atomic(&path, b"new").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}

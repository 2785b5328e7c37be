//! Route enriched records into the per-language and binary collections.

use crate::language::Language;
use crate::output::{DocumentMetadata, ExtractionRecord, FieldValue};

/// Metadata columns appended to every record, in this order.
pub const METADATA_FIELDS: [&str; 6] = [
    "pdf_filename",
    "detected_language",
    "image_count",
    "image_paths",
    "processing_timestamp",
    "document_size_mb",
];

/// In-memory collections filled during a run and flushed once at the end.
#[derive(Debug, Default, Clone)]
pub struct Aggregator {
    arabic: Vec<ExtractionRecord>,
    english: Vec<ExtractionRecord>,
    /// Every record regardless of language; the binary export is derived from it.
    all: Vec<ExtractionRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrich `record` with `meta` and append it to its language collection
    /// and to the binary source pool.
    pub fn route(&mut self, mut record: ExtractionRecord, meta: &DocumentMetadata) {
        enrich(&mut record, meta);
        match meta.language {
            Language::Arabic => self.arabic.push(record.clone()),
            Language::English => self.english.push(record.clone()),
        }
        self.all.push(record);
    }

    pub fn arabic(&self) -> &[ExtractionRecord] {
        &self.arabic
    }

    pub fn english(&self) -> &[ExtractionRecord] {
        &self.english
    }

    pub fn all(&self) -> &[ExtractionRecord] {
        &self.all
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Write the metadata fields into `record`, overwriting model values that
/// share a name.
pub fn enrich(record: &mut ExtractionRecord, meta: &DocumentMetadata) {
    let image_paths = meta
        .image_paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join(";");

    record.insert(METADATA_FIELDS[0], meta.pdf_filename.as_str());
    record.insert(METADATA_FIELDS[1], meta.language.as_str());
    record.insert(METADATA_FIELDS[2], meta.image_count());
    record.insert(
        METADATA_FIELDS[3],
        if image_paths.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(image_paths)
        },
    );
    record.insert(METADATA_FIELDS[4], meta.processing_timestamp.as_str());
    record.insert(
        METADATA_FIELDS[5],
        (meta.document_size_mb * 100.0).round() / 100.0,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(language: Language, images: &[&str]) -> DocumentMetadata {
        DocumentMetadata {
            pdf_filename: "report.pdf".into(),
            language,
            image_paths: images.iter().map(PathBuf::from).collect(),
            processing_timestamp: "2024-05-01T12:00:00+00:00".into(),
            document_size_mb: 1.23456,
        }
    }

    #[test]
    fn records_go_to_exactly_one_language_and_to_binary() {
        let mut agg = Aggregator::new();
        agg.route(ExtractionRecord::new(), &meta(Language::English, &[]));
        agg.route(ExtractionRecord::new(), &meta(Language::Arabic, &[]));
        agg.route(ExtractionRecord::new(), &meta(Language::English, &[]));

        assert_eq!(agg.english().len(), 2);
        assert_eq!(agg.arabic().len(), 1);
        assert_eq!(agg.all().len(), 3);
    }

    #[test]
    fn metadata_is_appended_after_model_fields() {
        let mut record = ExtractionRecord::new();
        record.insert("company_name", "Test Corp");
        enrich(&mut record, &meta(Language::English, &["a.png", "b.png"]));

        let names: Vec<&str> = record.names().collect();
        assert_eq!(names[0], "company_name");
        assert_eq!(&names[1..], &METADATA_FIELDS);
        assert_eq!(record.get("image_count"), Some(&FieldValue::Number(2.0)));
        assert_eq!(record.get("image_paths"), Some(&FieldValue::from("a.png;b.png")));
        assert_eq!(record.get("detected_language"), Some(&FieldValue::from("english")));
        assert_eq!(record.get("document_size_mb"), Some(&FieldValue::Number(1.23)));
    }

    #[test]
    fn metadata_overrides_model_values() {
        let mut record = ExtractionRecord::new();
        record.insert("image_count", 99.0);
        record.insert("document_size_mb", FieldValue::Null);
        enrich(&mut record, &meta(Language::Arabic, &["x.png"]));

        assert_eq!(record.get("image_count"), Some(&FieldValue::Number(1.0)));
        assert_eq!(record.get("document_size_mb"), Some(&FieldValue::Number(1.23)));
    }

    #[test]
    fn no_images_leaves_paths_empty() {
        let mut record = ExtractionRecord::new();
        enrich(&mut record, &meta(Language::English, &[]));
        assert_eq!(record.get("image_count"), Some(&FieldValue::Number(0.0)));
        assert_eq!(record.get("image_paths"), Some(&FieldValue::Null));
    }
}

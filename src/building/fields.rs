//! Field sets for building reports and improvement suggestions.
//!
//! Both schemas are fixed. Field names stay English in every output; values
//! come back in Arabic because the reports are Arabic.

use crate::building::scan::BuildingSource;
use crate::language::Language;
use crate::output::{ExtractionRecord, FieldValue};
use crate::schema::{FieldDef, FieldKind, FieldSchema};

/// Length of the random building and suggestion ids.
pub const BUILDING_ID_LEN: usize = 12;

/// Value used for an unknown condition or status.
pub const UNSPECIFIED: &str = "غير محدد";

/// Priority assigned when the report could not be analyzed.
pub const DEFAULT_PRIORITY: &str = "متوسط";

const BUILDING_FIELDS: &[(&str, &str, FieldKind)] = &[
    ("neighborhood", "Neighborhood or area", FieldKind::Text),
    ("construction_year", "Year of construction", FieldKind::Number),
    ("building_age", "Building age in years", FieldKind::Number),
    ("floors_count", "Number of floors", FieldKind::Number),
    ("total_area", "Total building area in square meters", FieldKind::Number),
    ("structural_condition", "Current structural condition", FieldKind::Text),
    ("maintenance_status", "Maintenance status", FieldKind::Text),
    ("safety_issues", "List of safety issues identified", FieldKind::Text),
    ("required_repairs", "Required repairs and maintenance", FieldKind::Text),
    ("estimated_cost", "Estimated repair cost in USD", FieldKind::Number),
    ("priority_level", "Priority level (high, medium, low)", FieldKind::Text),
    ("last_inspection_date", "Last inspection date", FieldKind::Date),
    ("inspector_name", "Name of inspector", FieldKind::Text),
    ("report_date", "Report date", FieldKind::Date),
];

const SUGGESTION_FIELDS: &[(&str, &str, FieldKind)] = &[
    ("suggestion_type", "Type of suggestion (structural, safety, maintenance, enhancement)", FieldKind::Text),
    ("title", "Suggestion title", FieldKind::Text),
    ("description", "Detailed description of the suggestion", FieldKind::Text),
    ("priority", "Priority level (critical, high, medium, low)", FieldKind::Text),
    ("estimated_cost", "Estimated implementation cost", FieldKind::Number),
    ("timeline", "Recommended timeline for implementation", FieldKind::Text),
    ("benefits", "Expected benefits", FieldKind::Text),
    ("risks", "Potential risks", FieldKind::Text),
    ("requirements", "Requirements for implementation", FieldKind::Text),
    ("ai_confidence", "AI confidence score (0-1)", FieldKind::Number),
];

/// Suggestion fields a usable suggestion must fill.
pub const REQUIRED_SUGGESTION_FIELDS: &[&str] = &["suggestion_type", "title", "description", "priority"];

fn schema_from(fields: &[(&str, &str, FieldKind)]) -> FieldSchema {
    FieldSchema::new(
        Language::Arabic,
        fields
            .iter()
            .map(|(name, description, kind)| FieldDef::with_kind(name, description, *kind))
            .collect(),
    )
}

/// What the model extracts from a building report.
pub fn building_info_schema() -> FieldSchema {
    schema_from(BUILDING_FIELDS)
}

/// What the model fills for each improvement suggestion.
pub fn suggestion_schema() -> FieldSchema {
    schema_from(SUGGESTION_FIELDS)
}

/// Where a report came from, plus the id assigned to its building.
///
/// These values are known before the model is called and are never taken
/// from its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingContext {
    pub building_id: String,
    pub source: BuildingSource,
}

impl BuildingContext {
    pub fn new(building_id: impl Into<String>, source: BuildingSource) -> Self {
        Self {
            building_id: building_id.into(),
            source,
        }
    }

    pub fn pdf_filename(&self) -> String {
        self.source
            .pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Context columns, in output order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("building_id", self.building_id.clone()),
            ("city_name", self.source.city.clone()),
            ("building_category", self.source.category.clone()),
            ("building_type", self.source.building_type.clone()),
            ("building_name", self.source.building_name.clone()),
            ("pdf_filename", self.pdf_filename()),
        ]
    }

    /// Stand-in for a report the model could not analyze.
    pub fn fallback_record(&self, schema: &FieldSchema) -> ExtractionRecord {
        let mut record: ExtractionRecord = schema
            .names()
            .map(|name| (name.to_string(), FieldValue::Null))
            .collect();
        record.insert("structural_condition", UNSPECIFIED);
        record.insert("maintenance_status", UNSPECIFIED);
        record.insert("priority_level", DEFAULT_PRIORITY);
        record
    }

    /// Final building row: context, then the model's fields, then images and
    /// the processing time. Context values win over any same-named field.
    pub fn building_record(
        &self,
        info: &ExtractionRecord,
        image_paths: &[String],
        processing_timestamp: &str,
    ) -> ExtractionRecord {
        let mut record: ExtractionRecord = self
            .fields()
            .into_iter()
            .map(|(name, value)| (name.to_string(), FieldValue::Text(value)))
            .collect();
        for (name, value) in info.iter() {
            if record.get(name).is_none() {
                record.insert(name, value.clone());
            }
        }
        record.insert("image_paths", joined(image_paths));
        record.insert("processing_timestamp", processing_timestamp);
        record
    }
}

/// Final suggestion row: ids first, then the suggestion fields, then the
/// generation time.
pub fn suggestion_record(
    building_id: &str,
    suggestion_id: &str,
    suggestion: &ExtractionRecord,
    generated_timestamp: &str,
) -> ExtractionRecord {
    let mut record = ExtractionRecord::new();
    record.insert("building_id", building_id);
    record.insert("suggestion_id", suggestion_id);
    for (name, value) in suggestion.iter() {
        if record.get(name).is_none() {
            record.insert(name, value.clone());
        }
    }
    record.insert("generated_timestamp", generated_timestamp);
    record
}

/// Whether a parsed suggestion fills every required field.
pub fn is_complete_suggestion(suggestion: &ExtractionRecord) -> bool {
    REQUIRED_SUGGESTION_FIELDS
        .iter()
        .all(|name| suggestion.get(name).is_some_and(|v| !v.is_null()))
}

fn joined(items: &[String]) -> FieldValue {
    if items.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(items.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn context() -> BuildingContext {
        BuildingContext::new(
            "AbCdEfGhIjKl",
            BuildingSource {
                city: "جدة".into(),
                category: "تحتاج_ترميم".into(),
                building_type: "سكني".into(),
                building_name: "عمارة_1".into(),
                pdf_path: PathBuf::from("data/جدة/تحتاج_ترميم/سكني/عمارة_1/تقارير/report.pdf"),
            },
        )
    }

    #[test]
    fn schemas_have_declared_kinds() {
        let info = building_info_schema();
        assert_eq!(info.len(), 14);
        let kind = |name: &str| info.fields().iter().find(|f| f.name == name).map(|f| f.kind);
        assert_eq!(kind("floors_count"), Some(FieldKind::Number));
        assert_eq!(kind("report_date"), Some(FieldKind::Date));
        assert_eq!(kind("safety_issues"), Some(FieldKind::Text));

        let suggestion = suggestion_schema();
        assert_eq!(suggestion.len(), 10);
        for required in REQUIRED_SUGGESTION_FIELDS {
            assert!(suggestion.names().any(|n| n == *required));
        }
    }

    #[test]
    fn fallback_marks_the_building_unassessed() {
        let schema = building_info_schema();
        let fallback = context().fallback_record(&schema);
        assert_eq!(fallback.len(), schema.len());
        assert_eq!(fallback.get("structural_condition"), Some(&FieldValue::from(UNSPECIFIED)));
        assert_eq!(fallback.get("maintenance_status"), Some(&FieldValue::from(UNSPECIFIED)));
        assert_eq!(fallback.get("priority_level"), Some(&FieldValue::from(DEFAULT_PRIORITY)));
        assert_eq!(fallback.get("floors_count"), Some(&FieldValue::Null));
    }

    #[test]
    fn building_row_puts_context_first() {
        let mut info = ExtractionRecord::new();
        info.insert("floors_count", 4.0);
        info.insert("building_name", "from the model");

        let images = vec!["a.png".to_string(), "b.png".to_string()];
        let row = context().building_record(&info, &images, "2024-05-01T12:00:00+00:00");
        let names: Vec<&str> = row.names().collect();
        assert_eq!(
            names,
            vec![
                "building_id",
                "city_name",
                "building_category",
                "building_type",
                "building_name",
                "pdf_filename",
                "floors_count",
                "image_paths",
                "processing_timestamp",
            ]
        );
        assert_eq!(row.get("building_name"), Some(&FieldValue::from("عمارة_1")));
        assert_eq!(row.get("pdf_filename"), Some(&FieldValue::from("report.pdf")));
        assert_eq!(row.get("image_paths"), Some(&FieldValue::from("a.png; b.png")));
    }

    #[test]
    fn no_images_is_null() {
        let row = context().building_record(&ExtractionRecord::new(), &[], "t");
        assert_eq!(row.get("image_paths"), Some(&FieldValue::Null));
    }

    #[test]
    fn completeness_needs_every_required_field() {
        let mut s = ExtractionRecord::new();
        s.insert("suggestion_type", "صيانة");
        s.insert("title", "ترميم الواجهة");
        s.insert("description", "إصلاح التشققات");
        assert!(!is_complete_suggestion(&s));
        s.insert("priority", FieldValue::Null);
        assert!(!is_complete_suggestion(&s));
        s.insert("priority", "عالية");
        assert!(is_complete_suggestion(&s));

        let row = suggestion_record("B1", "S1", &s, "t");
        assert_eq!(row.names().next(), Some("building_id"));
        assert_eq!(row.names().last(), Some("generated_timestamp"));
    }
}

//! Field schemas describing what the model should extract from a document.
//!
//! A schema is drawn from a fixed candidate pool per language. The English and
//! Arabic pools carry the same twenty concepts (company identity, financial
//! figures, document metadata) under localized names.
//!
//! In [`SchemaMode::Randomized`] every document gets its own random subset, so
//! CSV columns can differ between documents of the same run; the exporter
//! takes the union. [`SchemaMode::Fixed`] always uses the whole pool.
//!
//! Randomness is never ambient: callers pass the RNG, which makes a seeded
//! run reproducible.

use crate::language::Language;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Declared value kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Date,
}

/// One named field the model is asked to fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub description: String,
    pub kind: FieldKind,
}

impl FieldDef {
    /// Build a field, inferring its kind from the name.
    pub fn new(name: &str, description: &str) -> Self {
        Self::with_kind(name, description, infer_kind(name))
    }

    /// Build a field with an explicit kind.
    pub fn with_kind(name: &str, description: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
        }
    }
}

/// An immutable, ordered set of fields with unique names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    language: Language,
    fields: Vec<FieldDef>,
}

impl FieldSchema {
    /// A schema over `fields`. A repeated name keeps its first definition.
    pub fn new(language: Language, fields: Vec<FieldDef>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let fields = fields
            .into_iter()
            .filter(|f| seen.insert(f.name.clone()))
            .collect();
        Self { language, fields }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Render as a JSON Schema object for the extraction prompt.
    ///
    /// Every property is nullable: the model returns `null` for anything the
    /// document does not state.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            let ty = match field.kind {
                FieldKind::Number => "number",
                FieldKind::Text | FieldKind::Date => "string",
            };
            prop.insert("type".into(), json!([ty, "null"]));
            if field.kind == FieldKind::Date {
                prop.insert("format".into(), json!("date"));
            }
            prop.insert("description".into(), json!(field.description));
            properties.insert(field.name.clone(), Value::Object(prop));
        }
        json!({
            "title": "DocumentFields",
            "type": "object",
            "properties": properties,
        })
    }
}

/// How schemas are produced for each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaMode {
    /// A random subset of `min_fields..=max_fields` pool entries per document.
    Randomized { min_fields: usize, max_fields: usize },
    /// The whole pool, in pool order.
    Fixed,
}

impl Default for SchemaMode {
    fn default() -> Self {
        SchemaMode::Randomized {
            min_fields: 8,
            max_fields: 12,
        }
    }
}

/// Generate a schema for one document.
///
/// Randomized bounds are clamped to `1..=pool size`; an inverted range is
/// treated as its minimum.
pub fn generate_schema<R: Rng + ?Sized>(
    language: Language,
    mode: SchemaMode,
    rng: &mut R,
) -> FieldSchema {
    let pool = candidate_pool(language);
    let fields = match mode {
        SchemaMode::Fixed => pool,
        SchemaMode::Randomized {
            min_fields,
            max_fields,
        } => {
            let lo = min_fields.clamp(1, pool.len());
            let hi = max_fields.clamp(lo, pool.len());
            let count = rng.gen_range(lo..=hi);
            pool.choose_multiple(rng, count).cloned().collect()
        }
    };
    FieldSchema { language, fields }
}

/// Fields available to a randomized schema in every language.
pub fn pool_size() -> usize {
    ENGLISH_POOL.len().min(ARABIC_POOL.len())
}

/// The full candidate pool for a language.
pub fn candidate_pool(language: Language) -> Vec<FieldDef> {
    let entries = match language {
        Language::English => ENGLISH_POOL,
        Language::Arabic => ARABIC_POOL,
    };
    entries
        .iter()
        .map(|(name, description)| FieldDef::new(name, description))
        .collect()
}

const ENGLISH_POOL: &[(&str, &str)] = &[
    ("company_name", "Company name as reported"),
    ("document_type", "Type of document (10-K, Annual Report, etc.)"),
    ("filing_date", "Date when document was filed"),
    ("fiscal_year", "Fiscal year end"),
    ("total_revenue", "Total revenue in USD"),
    ("net_income", "Net income in USD"),
    ("total_assets", "Total assets in USD"),
    ("employee_count", "Number of employees"),
    ("auditor_name", "External auditor name"),
    ("ceo_name", "CEO name"),
    ("industry_sector", "Industry sector"),
    ("business_summary", "Business description summary"),
    ("risk_count", "Number of risk factors identified"),
    ("page_count", "Total pages in document"),
    ("image_count", "Number of images extracted"),
    ("processing_timestamp", "When document was processed"),
    ("confidence_score", "AI confidence in extraction"),
    ("document_size_mb", "Document file size"),
    ("extraction_status", "Status of extraction process"),
    ("key_metrics", "Key financial metrics summary"),
];

const ARABIC_POOL: &[(&str, &str)] = &[
    ("اسم_الشركة", "اسم الشركة كما هو مذكور في التقرير"),
    ("نوع_المستند", "نوع المستند (تقرير سنوي، 10-K، إلخ)"),
    ("تاريخ_التقديم", "تاريخ تقديم المستند"),
    ("السنة_المالية", "نهاية السنة المالية"),
    ("إجمالي_الإيرادات", "إجمالي الإيرادات بالدولار الأمريكي"),
    ("صافي_الدخل", "صافي الدخل بالدولار الأمريكي"),
    ("إجمالي_الأصول", "إجمالي الأصول بالدولار الأمريكي"),
    ("عدد_الموظفين", "عدد الموظفين"),
    ("اسم_المدقق", "اسم المدقق الخارجي"),
    ("اسم_الرئيس_التنفيذي", "اسم الرئيس التنفيذي"),
    ("قطاع_الصناعة", "قطاع الصناعة"),
    ("ملخص_الأعمال", "ملخص وصف الأعمال"),
    ("عدد_المخاطر", "عدد عوامل المخاطر المحددة"),
    ("عدد_الصفحات", "إجمالي صفحات المستند"),
    ("عدد_الصور", "عدد الصور المستخرجة"),
    ("وقت_المعالجة", "وقت معالجة المستند"),
    ("درجة_الثقة", "درجة ثقة الذكاء الاصطناعي في الاستخراج"),
    ("حجم_المستند_ميجابايت", "حجم ملف المستند"),
    ("حالة_الاستخراج", "حالة عملية الاستخراج"),
    ("المقاييس_الرئيسية", "ملخص المقاييس المالية الرئيسية"),
];

const DATE_MARKERS: &[&str] = &["date", "تاريخ"];

const NUMBER_MARKERS: &[&str] = &[
    "revenue", "income", "assets", "count", "score", "size", "إيرادات", "دخل", "أصول", "عدد",
    "درجة", "حجم",
];

/// Infer a field's kind from its name. Date markers win over number markers.
pub fn infer_kind(name: &str) -> FieldKind {
    let lower = name.to_lowercase();
    if DATE_MARKERS.iter().any(|m| lower.contains(m)) {
        FieldKind::Date
    } else if NUMBER_MARKERS.iter().any(|m| lower.contains(m)) {
        FieldKind::Number
    } else {
        FieldKind::Text
    }
}

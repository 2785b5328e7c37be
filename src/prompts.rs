//! Prompts for schema-constrained field extraction.
//!
//! Prompts are written in the document's language: an Arabic document is
//! described to the model in Arabic, which keeps the Arabic field names and
//! values from being transliterated. Building reports are always Arabic.

use crate::language::Language;
use crate::output::ExtractionRecord;
use crate::schema::FieldSchema;

/// Characters of a building report sent to the model.
pub const BUILDING_TEXT_CHARS: usize = 8000;

/// System prompt for English documents.
pub const ENGLISH_SYSTEM_PROMPT: &str = r#"You are a precise document analyst. You extract structured data from business documents.

Rules:
1. Fill exactly the fields defined in the JSON schema you are given. Do not add, rename or drop fields.
2. Use null for any field the document does not state.
3. Numbers are plain JSON numbers without currency symbols or thousand separators.
4. Dates use ISO 8601 (YYYY-MM-DD).
5. Return ONLY one JSON object matching the schema. No commentary, no markdown fences."#;

/// System prompt for Arabic documents.
pub const ARABIC_SYSTEM_PROMPT: &str = r#"أنت محلل مستندات دقيق. تستخرج بيانات منظمة من مستندات الأعمال.

القواعد:
1. املأ الحقول المعرفة في مخطط JSON المعطى فقط. لا تضف حقولاً ولا تغير أسماءها ولا تحذفها.
2. استخدم null لأي حقل غير مذكور في المستند.
3. الأرقام قيم JSON رقمية بدون رموز عملة أو فواصل آلاف.
4. التواريخ بصيغة ISO 8601 (YYYY-MM-DD).
5. أرجع كائن JSON واحداً فقط يطابق المخطط. بدون تعليقات وبدون أسوار markdown."#;

/// System prompt for building reports and suggestions.
pub const BUILDING_SYSTEM_PROMPT: &str = r#"أنت مهندس إنشائي خبير في تقييم المباني. تحلل التقارير الفنية للمباني وتقترح تحسينات عملية.

القواعد:
1. املأ الحقول المعرفة في مخطط JSON المعطى فقط.
2. استخدم null لأي معلومة غير مذكورة في التقرير.
3. الأرقام قيم JSON رقمية بدون رموز عملة أو فواصل آلاف.
4. التواريخ بصيغة ISO 8601 (YYYY-MM-DD).
5. القوائم مصفوفات JSON من النصوص.
6. أرجع JSON فقط. بدون تعليقات وبدون أسوار markdown."#;

/// Select the system prompt for a language.
pub fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::English => ENGLISH_SYSTEM_PROMPT,
        Language::Arabic => ARABIC_SYSTEM_PROMPT,
    }
}

/// Build the user message: truncated document text followed by the schema.
pub fn user_prompt(text: &str, schema: &FieldSchema, max_text_chars: usize) -> String {
    let excerpt = truncate_chars(text, max_text_chars);
    let ellipsis = if excerpt.len() < text.len() { "..." } else { "" };
    let schema_json = serde_json::to_string_pretty(&schema.to_json_schema())
        .unwrap_or_else(|_| schema.to_json_schema().to_string());

    match schema.language() {
        Language::English => format!(
            "Analyze the following document and extract information according to this schema:\n\n\
             Document content:\n{excerpt}{ellipsis}\n\n\
             Extract and structure the data according to this schema:\n{schema_json}\n\n\
             Return only the JSON data matching the schema exactly."
        ),
        Language::Arabic => format!(
            "حلل المستند التالي واستخرج المعلومات وفقاً لهذا المخطط:\n\n\
             محتوى المستند:\n{excerpt}{ellipsis}\n\n\
             استخرج وقم ببناء البيانات وفقاً لهذا المخطط:\n{schema_json}\n\n\
             أرجع فقط بيانات JSON المطابقة للمخطط تماماً."
        ),
    }
}

fn pretty_schema(schema: &FieldSchema) -> String {
    serde_json::to_string_pretty(&schema.to_json_schema())
        .unwrap_or_else(|_| schema.to_json_schema().to_string())
}

/// Ask for the building fields of one report. `context` lists values known
/// from the report's location; the model is told them but does not return
/// them.
pub fn building_info_prompt(
    text: &str,
    context: &[(&str, String)],
    schema: &FieldSchema,
) -> String {
    let excerpt = truncate_chars(text, BUILDING_TEXT_CHARS);
    let ellipsis = if excerpt.len() < text.len() { "..." } else { "" };
    let notes = context
        .iter()
        .map(|(name, value)| format!("- {name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");
    let schema_json = pretty_schema(schema);

    format!(
        "تحليل تقرير فني لمبنى واستخراج المعلومات المهمة:\n\n\
         محتوى التقرير:\n{excerpt}{ellipsis}\n\n\
         استخرج المعلومات التالية من التقرير:\n\
         - سنة البناء\n- عدد الطوابق\n- المساحة الإجمالية\n- الحالة الإنشائية الحالية\n\
         - حالة الصيانة\n- المشاكل الأمنية المحددة\n- الإصلاحات المطلوبة\n- التكلفة التقديرية\n\
         - مستوى الأولوية\n- تاريخ آخر فحص\n- اسم المفتش\n- تاريخ التقرير\n\n\
         أرجع البيانات في هذا التنسيق:\n{schema_json}\n\n\
         ملاحظات عن المبنى:\n{notes}\n\n\
         أرجع فقط كائن JSON صحيح يطابق المخطط."
    )
}

/// Short Arabic description of an analyzed building.
pub fn building_summary(building: &ExtractionRecord) -> String {
    let value = |name: &str, default: &str| {
        building
            .get(name)
            .filter(|v| !v.is_null())
            .map(|v| v.to_cell())
            .unwrap_or_else(|| default.to_string())
    };
    let unspecified = "غير محدد";
    format!(
        "معلومات المبنى:\n\
         - اسم المبنى: {}\n\
         - المدينة: {}\n\
         - الفئة: {}\n\
         - الحالة الإنشائية: {}\n\
         - حالة الصيانة: {}\n\
         - المشاكل الأمنية: {}\n\
         - الإصلاحات المطلوبة: {}\n\
         - مستوى الأولوية: {}",
        value("building_name", unspecified),
        value("city_name", unspecified),
        value("building_category", unspecified),
        value("structural_condition", unspecified),
        value("maintenance_status", unspecified),
        value("safety_issues", ""),
        value("required_repairs", ""),
        value("priority_level", "متوسط"),
    )
}

/// Ask for 3 to 5 improvement suggestions for one building.
pub fn suggestion_prompt(building: &ExtractionRecord, schema: &FieldSchema) -> String {
    let summary = building_summary(building);
    let schema_json = pretty_schema(schema);
    format!(
        "بناءً على معلومات المبنى التالية، قم بتوليد اقتراحات ذكية لتحسين المبنى:\n\n\
         {summary}\n\n\
         قم بتوليد 3-5 اقتراحات مختلفة تشمل:\n\
         1. اقتراحات إنشائية وأمنية\n\
         2. اقتراحات صيانة وتحسين\n\
         3. اقتراحات تطوير وتحديث\n\
         4. اقتراحات كفاءة الطاقة\n\
         5. اقتراحات تحسين المظهر العام\n\n\
         كل اقتراح كائن يطابق هذا المخطط:\n{schema_json}\n\n\
         أرجع كائن JSON بالشكل {{\"suggestions\": [...]}} يحتوي على 3-5 اقتراحات."
    )
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

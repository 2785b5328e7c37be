//! Model calls for building reports: the building fields, then improvement
//! suggestions built from them.

use crate::building::fields::{is_complete_suggestion, BuildingContext};
use crate::error::ExtractionError;
use crate::output::ExtractionRecord;
use crate::pipeline::llm::{parse_json_reply, parse_record, record_from_object, LlmExtractor};
use crate::prompts::{building_info_prompt, suggestion_prompt, BUILDING_SYSTEM_PROMPT};
use crate::schema::FieldSchema;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Analyzes building reports.
#[async_trait]
pub trait BuildingAnalyst: Send + Sync {
    /// Fill `schema` from a report's text.
    async fn building_info(
        &self,
        text: &str,
        context: &BuildingContext,
        schema: &FieldSchema,
    ) -> Result<ExtractionRecord, ExtractionError>;

    /// Suggest improvements for an analyzed building. Each suggestion fills
    /// `schema`; incomplete ones are already dropped.
    async fn suggestions(
        &self,
        building: &ExtractionRecord,
        schema: &FieldSchema,
    ) -> Result<Vec<ExtractionRecord>, ExtractionError>;
}

#[async_trait]
impl BuildingAnalyst for LlmExtractor {
    async fn building_info(
        &self,
        text: &str,
        context: &BuildingContext,
        schema: &FieldSchema,
    ) -> Result<ExtractionRecord, ExtractionError> {
        let prompt = building_info_prompt(text, &context.fields(), schema);
        debug!(
            "Building {}: prompt {} chars",
            context.building_id,
            prompt.chars().count()
        );
        self.complete(BUILDING_SYSTEM_PROMPT, prompt, |raw| parse_record(raw, schema))
            .await
    }

    async fn suggestions(
        &self,
        building: &ExtractionRecord,
        schema: &FieldSchema,
    ) -> Result<Vec<ExtractionRecord>, ExtractionError> {
        let prompt = suggestion_prompt(building, schema);
        self.complete(BUILDING_SYSTEM_PROMPT, prompt, |raw| parse_suggestions(raw, schema))
            .await
    }
}

/// Parse a suggestions reply.
///
/// Accepts a JSON array, an object wrapping the array under `"suggestions"`,
/// or a single suggestion object. Items that are not objects or miss a
/// required field are logged and skipped.
pub fn parse_suggestions(
    raw: &str,
    schema: &FieldSchema,
) -> Result<Vec<ExtractionRecord>, ExtractionError> {
    let value = parse_json_reply(raw, '{', '}').or_else(|_| parse_json_reply(raw, '[', ']'))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("suggestions") {
            Some(Value::Array(items)) => items.clone(),
            _ => vec![Value::Object(map)],
        },
        _ => {
            return Err(ExtractionError::Malformed {
                detail: "reply is neither a JSON array nor an object".into(),
            })
        }
    };

    let mut suggestions = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Value::Object(map) = item else {
            warn!("Skipping suggestion {}: not a JSON object", i + 1);
            continue;
        };
        let record = record_from_object(map, schema);
        if is_complete_suggestion(&record) {
            suggestions.push(record);
        } else {
            warn!("Skipping suggestion {}: missing a required field", i + 1);
        }
    }
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::fields::suggestion_schema;
    use crate::output::FieldValue;

    const ONE: &str = r#"{"suggestion_type": "إنشائي", "title": "تدعيم الأعمدة", "description": "تدعيم الأعمدة المتشققة", "priority": "عالية", "estimated_cost": "50,000", "benefits": ["سلامة", "عمر أطول"]}"#;

    #[test]
    fn wrapped_array() {
        let raw = format!(r#"{{"suggestions": [{ONE}, {ONE}]}}"#);
        let parsed = parse_suggestions(&raw, &suggestion_schema()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].get("estimated_cost"), Some(&FieldValue::Number(50000.0)));
        assert_eq!(parsed[0].get("benefits"), Some(&FieldValue::from("سلامة; عمر أطول")));
        assert_eq!(parsed[0].get("risks"), Some(&FieldValue::Null));
    }

    #[test]
    fn bare_array_in_a_fence() {
        let raw = format!("```json\n[{ONE}]\n```");
        assert_eq!(parse_suggestions(&raw, &suggestion_schema()).unwrap().len(), 1);
    }

    #[test]
    fn single_object_is_one_suggestion() {
        let parsed = parse_suggestions(ONE, &suggestion_schema()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("title"), Some(&FieldValue::from("تدعيم الأعمدة")));
    }

    #[test]
    fn prose_around_a_bare_array() {
        let raw = format!("Here are the suggestions:\n[{ONE}, {ONE}, {ONE}]\nDone.");
        assert_eq!(parse_suggestions(&raw, &suggestion_schema()).unwrap().len(), 3);
    }

    #[test]
    fn incomplete_and_non_object_items_are_skipped() {
        let raw = format!(
            r#"[{ONE}, "just text", {{"title": "بدون نوع", "description": "x", "priority": "منخفضة"}}]"#
        );
        let parsed = parse_suggestions(&raw, &suggestion_schema()).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn empty_array_is_no_suggestions() {
        assert!(parse_suggestions("[]", &suggestion_schema()).unwrap().is_empty());
    }

    #[test]
    fn not_json_is_malformed() {
        let err = parse_suggestions("no suggestions today", &suggestion_schema()).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }
}

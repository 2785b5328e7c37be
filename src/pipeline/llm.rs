//! Structured extraction: ask the model to fill a schema from document text.
//!
//! Prompt wording lives in [`crate::prompts`]; this module owns the call,
//! the retry loop and turning the reply into an [`ExtractionRecord`].
//!
//! ## Retry Strategy
//!
//! Each attempt is bounded by `api_timeout_secs`. A failed call, a timeout or
//! an unparseable reply all count as a failed attempt and are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`, capped at
//! [`MAX_BACKOFF_MS`]). With the defaults (500 ms, 2 retries) the waits are
//! 500 ms then 1 s. The error returned is the one from the last attempt.
//!
//! Requests ask for a JSON response (`response_format = "json_object"`);
//! providers that support it (Gemini, OpenAI) constrain the reply to JSON.
//!
//! ## Coercion
//!
//! Every schema field ends up in the record. Values are coerced to the
//! field's declared kind; anything that cannot be coerced becomes `Null`.
//! Keys the schema does not name are dropped.

use crate::config::BatchConfig;
use crate::error::ExtractionError;
use crate::language::Language;
use crate::output::{ExtractionRecord, FieldValue};
use crate::prompts::{system_prompt, user_prompt};
use crate::schema::{FieldKind, FieldSchema};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Fills a [`FieldSchema`] from document text.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract_structured(
        &self,
        text: &str,
        schema: &FieldSchema,
        language: Language,
    ) -> Result<ExtractionRecord, ExtractionError>;
}

/// Upper bound on a single retry wait.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Response format requested from the provider.
pub const JSON_RESPONSE_FORMAT: &str = "json_object";

/// Attempt limits for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }
}

/// The production extractor, backed by an `edgequake-llm` provider.
pub struct LlmExtractor {
    provider: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
    temperature: f32,
    max_tokens: usize,
    max_text_chars: usize,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &BatchConfig) -> Self {
        Self {
            provider,
            policy: RetryPolicy::from_config(config),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_text_chars: config.max_text_chars,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            response_format: Some(JSON_RESPONSE_FORMAT.to_string()),
            ..Default::default()
        }
    }

    /// Send one system + user exchange and parse the reply with `parse`,
    /// retrying per the policy.
    pub(crate) async fn complete<T, P>(
        &self,
        system: &str,
        user: String,
        parse: P,
    ) -> Result<T, ExtractionError>
    where
        P: Fn(&str) -> Result<T, ExtractionError>,
    {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = self.options();
        let provider = &self.provider;
        let messages = &messages;
        let options = &options;

        extract_with_retry(&self.policy, parse, || async move {
            let start = Instant::now();
            let response = provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| e.to_string())?;
            debug!(
                "{} input tokens, {} output tokens, {:?}",
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );
            Ok(response.content)
        })
        .await
    }
}

#[async_trait]
impl StructuredExtractor for LlmExtractor {
    async fn extract_structured(
        &self,
        text: &str,
        schema: &FieldSchema,
        language: Language,
    ) -> Result<ExtractionRecord, ExtractionError> {
        let prompt = user_prompt(text, schema, self.max_text_chars);
        debug!(
            "Extraction prompt: {} chars, {} fields ({})",
            prompt.chars().count(),
            schema.len(),
            language
        );

        self.complete(system_prompt(language), prompt, |raw| parse_record(raw, schema))
            .await
    }
}

/// Drive `call` until it yields a reply that `parse` accepts.
///
/// `call` returns the raw reply text or a transport error message.
pub async fn extract_with_retry<T, P, F, Fut>(
    policy: &RetryPolicy,
    parse: P,
    mut call: F,
) -> Result<T, ExtractionError>
where
    P: Fn(&str) -> Result<T, ExtractionError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let mut last_err = ExtractionError::Unavailable {
        retries: 0,
        detail: "no attempt made".into(),
    };

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!(
                "Extraction retry {}/{} after {:?}",
                attempt, policy.max_retries, backoff
            );
            sleep(backoff).await;
        }

        last_err = match timeout(policy.timeout, call()).await {
            Ok(Ok(raw)) => match parse(&raw) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => e,
            },
            Ok(Err(detail)) => ExtractionError::Unavailable {
                retries: attempt,
                detail,
            },
            Err(_) => ExtractionError::Timeout {
                secs: policy.timeout.as_secs(),
            },
        };
        warn!("Extraction attempt {} failed: {}", attempt + 1, last_err);
    }

    Err(last_err)
}

static RE_JSON_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// Remove an outer ```` ```json ```` fence if the whole reply is wrapped in one.
pub fn strip_json_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_JSON_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => trimmed,
    }
}

/// Parse a model reply into JSON, tolerating a fence or prose around it.
///
/// When the body is not valid JSON, the text between the first `open` and
/// last `close` delimiter is tried instead.
pub fn parse_json_reply(raw: &str, open: char, close: char) -> Result<Value, ExtractionError> {
    let body = strip_json_fences(raw);
    serde_json::from_str(body)
        .or_else(|first| match (body.find(open), body.rfind(close)) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]),
            _ => Err(first),
        })
        .map_err(|e| ExtractionError::Malformed {
            detail: format!("invalid JSON: {e}"),
        })
}

/// Parse a model reply into a record holding exactly the schema's fields.
pub fn parse_record(raw: &str, schema: &FieldSchema) -> Result<ExtractionRecord, ExtractionError> {
    match parse_json_reply(raw, '{', '}')? {
        Value::Object(map) => Ok(record_from_object(&map, schema)),
        _ => Err(ExtractionError::Malformed {
            detail: "reply is not a JSON object".into(),
        }),
    }
}

/// Project a JSON object onto `schema`: every schema field, coerced, in
/// schema order. Keys the schema does not name are dropped.
pub fn record_from_object(map: &Map<String, Value>, schema: &FieldSchema) -> ExtractionRecord {
    schema
        .fields()
        .iter()
        .map(|field| {
            let value = map
                .get(&field.name)
                .map_or(FieldValue::Null, |v| coerce(v, field.kind));
            (field.name.clone(), value)
        })
        .collect()
}

/// Coerce one JSON value to a declared kind.
pub fn coerce(value: &Value, kind: FieldKind) -> FieldValue {
    match (kind, value) {
        (_, Value::Null) => FieldValue::Null,

        (FieldKind::Number, Value::Number(n)) => {
            n.as_f64().map_or(FieldValue::Null, FieldValue::Number)
        }
        (FieldKind::Number, Value::String(s)) => {
            parse_number(s).map_or(FieldValue::Null, FieldValue::Number)
        }
        (FieldKind::Number, _) => FieldValue::Null,

        (FieldKind::Date, Value::String(s)) => match parse_date(s) {
            Some(d) => FieldValue::Date(d),
            None => text_value(s),
        },
        (FieldKind::Date, Value::Number(n)) => FieldValue::Text(n.to_string()),
        (FieldKind::Date, _) => FieldValue::Null,

        (FieldKind::Text, Value::String(s)) => text_value(s),
        (FieldKind::Text, Value::Number(n)) => FieldValue::Text(n.to_string()),
        (FieldKind::Text, Value::Bool(b)) => FieldValue::Text(b.to_string()),
        (FieldKind::Text, Value::Array(items)) => {
            let joined = items
                .iter()
                .filter_map(|v| match v {
                    Value::Null => None,
                    Value::String(s) => Some(s.trim().to_string()),
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            text_value(&joined)
        }
        (FieldKind::Text, Value::Object(_)) => FieldValue::Text(value.to_string()),
    }
}

fn text_value(s: &str) -> FieldValue {
    let t = s.trim();
    if t.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(t.to_string())
    }
}

const CURRENCY_SIGNS: &[char] = &['$', '€', '£', '¥', '﷼'];

/// Parse a number written the way documents write them.
///
/// Accepts thousand separators, currency signs or codes at either end, a
/// trailing percent sign, and Arabic-Indic digits.
pub fn parse_number(s: &str) -> Option<f64> {
    let core = s.trim_matches(|c: char| {
        c.is_whitespace() || c.is_alphabetic() || c == '%' || CURRENCY_SIGNS.contains(&c)
    });
    let cleaned: String = normalize_digits(core)
        .chars()
        .filter(|c| !matches!(c, ',' | '٬' | ' ' | '\u{a0}' | '_'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a date in ISO form or one of a few common layouts.
///
/// Slash-separated dates are read day-first after ISO order fails.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let t = normalize_digits(s.trim());
    if let Ok(dt) = DateTime::parse_from_rfc3339(&t) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&t, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(&t, layout).ok())
}

/// Map Arabic-Indic digits and the Arabic decimal separator to ASCII.
fn normalize_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '٠'..='٩' => char::from_digit(c as u32 - '٠' as u32, 10).unwrap_or(c),
            '۰'..='۹' => char::from_digit(c as u32 - '۰' as u32, 10).unwrap_or(c),
            '٫' => '.',
            other => other,
        })
        .collect()
}

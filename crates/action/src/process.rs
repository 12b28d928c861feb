//! Response decoding and shrinking
//!
//! Successful bodies are decoded by content type, then de-duplicated and,
//! when the action lists `keys_to_keep`, filtered down to those keys.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::dispatch::DispatchOutcome;
use crate::extract::TextExtractor;
use crate::model::ActionDefinition;

const PDF_UNCONFIGURED: &str =
    "Received a PDF document, but no PDF-to-text service is configured to read it.";

/// Decodes dispatch outcomes into JSON values.
#[derive(Debug, Clone, Default)]
pub struct ResponseProcessor {
    pdf: Option<Arc<dyn TextExtractor>>,
    html: Option<Arc<dyn TextExtractor>>,
}

impl ResponseProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pdf_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.pdf = Some(extractor);
        self
    }

    pub fn with_html_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.html = Some(extractor);
        self
    }

    /// Decode `outcome` and shrink it for `action`.
    ///
    /// Error bodies are decoded but never de-duplicated or filtered.
    pub async fn process(&self, outcome: &DispatchOutcome, action: &ActionDefinition) -> Value {
        let decoded = self.decode(outcome).await;
        if outcome.is_error {
            return decoded;
        }
        let deduped = dedupe(decoded);
        match action.keys_to_keep.as_deref() {
            Some(keys) if !keys.is_empty() => filter_keys(&deduped, keys),
            _ => deduped,
        }
    }

    async fn decode(&self, outcome: &DispatchOutcome) -> Value {
        let content_type = outcome.content_type.as_deref().unwrap_or_default();
        match ContentKind::of(content_type) {
            ContentKind::Json => serde_json::from_slice(&outcome.body)
                .unwrap_or_else(|_| Value::String(outcome.text().into_owned())),
            ContentKind::Pdf => match &self.pdf {
                Some(extractor) => self.extract(extractor.as_ref(), content_type, outcome).await,
                None => Value::String(PDF_UNCONFIGURED.to_string()),
            },
            ContentKind::Markup => match &self.html {
                Some(extractor) => self.extract(extractor.as_ref(), content_type, outcome).await,
                None => Value::String(outcome.text().into_owned()),
            },
            ContentKind::Text => Value::String(outcome.text().into_owned()),
        }
    }

    async fn extract(
        &self,
        extractor: &dyn TextExtractor,
        content_type: &str,
        outcome: &DispatchOutcome,
    ) -> Value {
        match extractor.extract(content_type, outcome.body.clone()).await {
            Ok(text) => Value::String(text),
            Err(error) => {
                warn!(%error, content_type, "text extraction failed");
                Value::String(format!("Could not extract text from {content_type}: {error}"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Json,
    Pdf,
    Markup,
    Text,
}

impl ContentKind {
    fn of(content_type: &str) -> Self {
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        match mime {
            "application/json" => Self::Json,
            m if m.ends_with("+json") => Self::Json,
            "application/pdf" => Self::Pdf,
            "text/html" | "application/xhtml+xml" | "application/xml" | "text/xml" => {
                Self::Markup
            }
            _ => Self::Text,
        }
    }
}

/// Hoist fields that are identical across an array of objects.
///
/// `[{status:"ok",id:1},{status:"ok",id:2}]` becomes
/// `{status:"ok",items:[{id:1},{id:2}]}`. Anything that is not an array of
/// at least two objects, or has no field to hoist, is returned unchanged.
pub fn dedupe(value: Value) -> Value {
    match &value {
        Value::Array(items) => hoist(items).unwrap_or(value),
        _ => value,
    }
}

fn hoist(items: &[Value]) -> Option<Value> {
    if items.len() < 2 {
        return None;
    }
    let objects = items
        .iter()
        .map(Value::as_object)
        .collect::<Option<Vec<_>>>()?;

    let mut fields: Vec<&String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !fields.contains(&key) {
                fields.push(key);
            }
        }
    }

    let first = objects[0];
    let (shared, differing): (Vec<&String>, Vec<&String>) = fields.into_iter().partition(|field| {
        let value = first.get(field.as_str());
        value.is_some() && objects.iter().all(|o| o.get(field.as_str()) == value)
    });
    if shared.is_empty() {
        return None;
    }
    debug!(
        hoisted = shared.len(),
        differing = differing.len(),
        "de-duplicated response array"
    );

    let mut result: Map<String, Value> = shared
        .into_iter()
        .filter_map(|field| first.get(field.as_str()).map(|v| (field.clone(), v.clone())))
        .collect();
    let rest = objects
        .iter()
        .map(|object| {
            let kept: Map<String, Value> = differing
                .iter()
                .filter_map(|field| object.get(field.as_str()).map(|v| ((*field).clone(), v.clone())))
                .collect();
            Value::Object(kept)
        })
        .collect();
    result.insert("items".to_string(), Value::Array(rest));
    Some(Value::Object(result))
}

/// Keep only the listed keys, recursing through objects and arrays.
///
/// A listed key keeps its value whole. Containers left empty are dropped
/// from their parent; an empty top-level container stays as an empty one.
pub fn filter_keys(value: &Value, keys: &[String]) -> Value {
    match value {
        Value::Object(_) => filter(value, keys).unwrap_or_else(|| Value::Object(Map::new())),
        Value::Array(_) => filter(value, keys).unwrap_or_else(|| Value::Array(Vec::new())),
        scalar => scalar.clone(),
    }
}

fn filter(value: &Value, keys: &[String]) -> Option<Value> {
    match value {
        Value::Object(object) => {
            let kept: Map<String, Value> = object
                .iter()
                .filter_map(|(key, v)| {
                    if keys.iter().any(|k| k == key) {
                        Some((key.clone(), v.clone()))
                    } else {
                        filter(v, keys).map(|v| (key.clone(), v))
                    }
                })
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items.iter().filter_map(|v| filter(v, keys)).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        _ => None,
    }
}

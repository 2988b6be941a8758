//! Mapping-driven normalization of raw logs into [`CanonicalEvent`]s
//!
//! A mapping body is a JSON document of the form:
//!
//! ```json
//! {
//!   "field_mappings": {
//!     "severity": "level",
//!     "actor.user.name": "auth.user",
//!     "rule_id": "meta.rule"
//!   }
//! }
//! ```
//!
//! Each entry maps an OCSF target to a dot-separated path into the raw log.
//! Targets with a dedicated slot on the event ([`KnownTarget`]) only accept
//! string values. Every other target is copied verbatim into
//! `additional_fields`, with `null` when the path does not resolve.
//!
//! Normalization is a pure function of its inputs. Entries are applied in
//! ascending target order, so the same raw log and mapping always produce
//! the same event.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::models::{Actor, CanonicalEvent, Source, User};
use super::path::extract;
use super::severity::severity_id;

/// Errors raised by [`normalize`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Raw log payload is not a JSON object")]
    MalformedPayload,

    #[error("Mapping config is not a JSON object")]
    MappingConfigMalformed,
}

/// Mapping configuration document as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingBody(Value);

impl MappingBody {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// `(target, source_path)` pairs sorted by target
    ///
    /// A missing or non-object `field_mappings` yields no pairs, and entries
    /// whose path is not a string are skipped.
    pub fn field_mappings(&self) -> Result<Vec<(&str, &str)>, NormalizeError> {
        let body = self
            .0
            .as_object()
            .ok_or(NormalizeError::MappingConfigMalformed)?;

        let mut pairs: Vec<(&str, &str)> = match body.get("field_mappings") {
            Some(Value::Object(mappings)) => mappings
                .iter()
                .filter_map(|(target, path)| path.as_str().map(|p| (target.as_str(), p)))
                .collect(),
            _ => Vec::new(),
        };
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));

        Ok(pairs)
    }
}

impl From<Value> for MappingBody {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Targets with a dedicated slot on [`CanonicalEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownTarget {
    Message,
    Severity,
    CategoryName,
    ClassName,
    ActorUserName,
    SourceIp,
}

impl KnownTarget {
    /// Case-insensitive lookup of a mapping target
    pub fn parse(target: &str) -> Option<Self> {
        match target.to_ascii_lowercase().as_str() {
            "message" => Some(Self::Message),
            "severity" => Some(Self::Severity),
            "category_name" => Some(Self::CategoryName),
            "class_name" => Some(Self::ClassName),
            "actor.user.name" => Some(Self::ActorUserName),
            "source.ip" => Some(Self::SourceIp),
            _ => None,
        }
    }

    fn assign(self, event: &mut CanonicalEvent, value: &str) {
        match self {
            Self::Message => event.message = value.to_string(),
            Self::Severity => {
                event.severity = value.to_string();
                event.severity_id = severity_id(value);
            }
            Self::CategoryName => event.category_name = value.to_string(),
            Self::ClassName => event.class_name = value.to_string(),
            Self::ActorUserName => {
                let actor = event.actor.get_or_insert_with(Actor::default);
                let user = actor.user.get_or_insert_with(User::default);
                user.name = Some(value.to_string());
            }
            Self::SourceIp => {
                let source = event.source.get_or_insert_with(Source::default);
                source.ip = Some(value.to_string());
            }
        }
    }
}

/// Project `raw` onto a [`CanonicalEvent`] using `mapping`
///
/// The returned event has no `time`; callers stamp it from the receipt time
/// of the raw log.
pub fn normalize(raw: &Value, mapping: &MappingBody) -> Result<CanonicalEvent, NormalizeError> {
    let fields = raw.as_object().ok_or(NormalizeError::MalformedPayload)?;
    let mappings = mapping.field_mappings()?;

    let mut event = CanonicalEvent::default();
    if let Some(Value::String(message)) = fields.get("message") {
        event.message = message.clone();
    }

    for (target, path) in mappings {
        let value = extract(raw, path);
        match KnownTarget::parse(target) {
            Some(known) => {
                if let Some(Value::String(s)) = value {
                    known.assign(&mut event, s);
                }
            }
            None => {
                event
                    .additional_fields
                    .insert(target.to_string(), value.cloned().unwrap_or(Value::Null));
            }
        }
    }

    Ok(event)
}

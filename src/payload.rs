//! Loosely-typed values crossing the pipeline boundary.
//!
//! Upstream stages may hand over a single path, a list of paths, arbitrarily
//! nested lists, a metadata mapping, or a JSON string encoding one of those.
//! Instead of inspecting types at runtime, callers convert into [`Payload`]
//! once and use the explicit conversions below.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::comic_info::ComicMetadata;

/// Tagged union of everything a boundary value can be.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    String(String),
    Number(f64),
    Boolean(bool),
    Sequence(Vec<Payload>),
    Structured(BTreeMap<String, Payload>),
    Absent,
}

impl Payload {
    /// Short type tag, for previews and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Sequence(_) => "sequence",
            Self::Structured(_) => "structured",
            Self::Absent => "absent",
        }
    }

    /// Depth-first flattening of nested sequences into their scalar leaves,
    /// rendered as strings. Structured values and `Absent` contribute nothing.
    ///
    /// `[["a.cbz"], "b.cbz", [[3]]]` → `["a.cbz", "b.cbz", "3"]`.
    pub fn flatten_strings(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_strings(&mut out);
        out
    }

    fn collect_strings(&self, out: &mut Vec<String>) {
        match self {
            Self::String(s) => out.push(s.clone()),
            Self::Number(n) => out.push(format_number(*n)),
            Self::Boolean(b) => out.push(b.to_string()),
            Self::Sequence(items) => items.iter().for_each(|i| i.collect_strings(out)),
            Self::Structured(_) | Self::Absent => {}
        }
    }

    /// The first scalar leaf, if any (a single path delivered as a list).
    pub fn first_string(&self) -> Option<String> {
        self.flatten_strings().into_iter().next()
    }

    /// Interpret as a metadata record.
    ///
    /// Structured values map field-for-field; strings are parsed as JSON;
    /// sequences use their first interpretable element. Anything else, or
    /// unparseable JSON, yields an error record.
    pub fn into_metadata(self) -> ComicMetadata {
        match self {
            Self::Structured(_) => ComicMetadata::from_value(&self.to_json()),
            Self::String(s) => ComicMetadata::from_json(&s).unwrap_or_else(|e| {
                ComicMetadata::Error {
                    message: format!("metadata is not valid JSON: {e}"),
                }
            }),
            Self::Sequence(items) => items
                .into_iter()
                .find(|i| matches!(i, Self::Structured(_) | Self::String(_) | Self::Sequence(_)))
                .map(Payload::into_metadata)
                .unwrap_or_else(|| ComicMetadata::Error {
                    message: "metadata sequence is empty".into(),
                }),
            other => ComicMetadata::Error {
                message: format!("cannot interpret {} payload as metadata", other.kind()),
            },
        }
    }

    /// Convert back into a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Sequence(items) => Value::Array(items.iter().map(Payload::to_json).collect()),
            Self::Structured(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Absent => Value::Null,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => n.as_f64().map_or(Self::Absent, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Structured(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(items: Vec<T>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl From<&ComicMetadata> for Payload {
    fn from(meta: &ComicMetadata) -> Self {
        Self::from(meta.to_value())
    }
}

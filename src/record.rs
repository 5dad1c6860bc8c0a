use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Severity of a log record.
///
/// The four standard levels cover the per-level producer API; `Custom`
/// carries anything else verbatim (e.g. "slow", "stat").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
    Debug,
    Warn,
    Custom(String),
}

impl Level {
    pub fn as_str(&self) -> &str {
        match self {
            Level::Info => "info",
            Level::Error => "error",
            Level::Debug => "debug",
            Level::Warn => "warn",
            Level::Custom(s) => s.as_str(),
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&str> for Level {
    fn from(s: &str) -> Self {
        match s {
            "info" => Level::Info,
            "error" => Level::Error,
            "debug" => Level::Debug,
            "warn" => Level::Warn,
            other => Level::Custom(other.to_string()),
        }
    }
}

/// A single key/value attribute attached to a log call.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

/// Build a [`Field`] from any serializable value.
///
/// A value that fails to serialize degrades to `null` instead of
/// surfacing an error at the log call site.
pub fn field(key: impl Into<String>, value: impl Serialize) -> Field {
    Field {
        key: key.into(),
        value: serde_json::to_value(value).unwrap_or(Value::Null),
    }
}

/// Fully-resolved, immutable representation of one log event, ready for
/// persistence. Built once on the calling thread and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Value>>,
}

impl LogRecord {
    /// Build a record from a level, arbitrary content and attribute list.
    ///
    /// Content is rendered through `Display`, so strings pass through and
    /// error values render their message. Attributes are scanned once:
    /// well-known keys (`trace`, `span`, `duration`, `log_type`/`logType`,
    /// `user_id`/`userId`) are lifted into dedicated fields, first match
    /// wins; everything else lands in the residual `fields` map, which is
    /// omitted entirely when empty. Malformed input degrades rather than
    /// failing; there is no error path.
    pub fn build(level: Level, content: impl Display, fields: Vec<Field>) -> Self {
        let mut record = LogRecord {
            timestamp: Utc::now(),
            level,
            content: content.to_string(),
            log_type: None,
            duration: None,
            trace: None,
            span: None,
            user_id: None,
            fields: None,
        };

        let mut residual = BTreeMap::new();
        for Field { key, value } in fields {
            match key.as_str() {
                "trace" => set_text(&mut record.trace, value),
                "span" => set_text(&mut record.span, value),
                "duration" => set_text(&mut record.duration, value),
                "log_type" | "logType" => set_text(&mut record.log_type, value),
                "user_id" | "userId" => {
                    if record.user_id.is_none() {
                        record.user_id = coerce_user_id(&value);
                    }
                }
                _ => {
                    residual.entry(key).or_insert(value);
                }
            }
        }

        if !residual.is_empty() {
            record.fields = Some(residual);
        }
        record
    }
}

fn set_text(slot: &mut Option<String>, value: Value) {
    if slot.is_none() {
        *slot = Some(value_text(value));
    }
}

/// Render an attribute value as plain text: strings stay bare, anything
/// else uses its JSON representation.
pub(crate) fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Coerce a numeric attribute value to `i64`. Unsigned values wrap and
/// floats truncate; non-numeric values yield `None`.
fn coerce_user_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u as i64))
            .or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

//! Log event model and producer wire decoding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Arguments nested deeper than this are replaced by a placeholder
pub const MAX_PAYLOAD_DEPTH: usize = 32;

/// Console level of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Log,
    Warn,
    Error,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" => Some(LogLevel::Log),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "info" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque identity of one producing page, assigned when it connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an event came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSource {
    pub id: SourceId,
    /// Optional human-readable name the producer supplied on connect
    pub label: Option<String>,
}

impl EventSource {
    pub fn new(label: Option<String>) -> Self {
        Self {
            id: SourceId::new(),
            label: label.filter(|l| !l.is_empty()),
        }
    }
}

/// A finalized event as delivered to viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source_id: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    pub payload: Vec<Value>,
}

/// An event as received from a producer, before the relay assigns a sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingEvent {
    pub level: LogLevel,
    /// Producer clock; the relay clock is used when absent
    pub timestamp: Option<DateTime<Utc>>,
    pub payload: Vec<Value>,
}

impl IncomingEvent {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.push_arg(value);
        self
    }

    /// Append one argument. A value that fails to serialize is kept as a placeholder.
    pub fn push_arg<T: Serialize + ?Sized>(&mut self, value: &T) {
        let value = serde_json::to_value(value).unwrap_or_else(|e| placeholder(&e.to_string()));
        self.payload.push(sanitize(value));
    }

    /// Decode one text frame into zero or more events.
    ///
    /// Never fails: anything that is not a well-formed event object is coerced
    /// into a `log` event carrying what was received.
    pub fn decode_text(text: &str) -> Vec<IncomingEvent> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items.into_iter().map(Self::from_value).collect(),
            Ok(value) => vec![Self::from_value(value)],
            Err(_) => vec![Self::new(LogLevel::Log).with_raw(Value::String(text.to_string()))],
        }
    }

    /// Decode one binary frame; UTF-8 content is treated like a text frame.
    pub fn decode_binary(data: &[u8]) -> Vec<IncomingEvent> {
        match std::str::from_utf8(data) {
            Ok(text) => Self::decode_text(text),
            Err(_) => vec![Self::new(LogLevel::Log)
                .with_raw(placeholder(&format!("binary frame of {} bytes", data.len())))],
        }
    }

    fn from_value(value: Value) -> Self {
        match value {
            object @ Value::Object(_) => match serde_json::from_value::<WireEvent>(object) {
                Ok(wire) => wire.into(),
                Err(e) => Self::new(LogLevel::Log).with_raw(placeholder(&e.to_string())),
            },
            other => Self::new(LogLevel::Log).with_raw(other),
        }
    }

    fn with_raw(mut self, value: Value) -> Self {
        self.payload.push(sanitize(value));
        self
    }
}

/// Producer message shape
#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(default)]
    level: Option<Value>,
    #[serde(default, alias = "ts")]
    timestamp: Option<Value>,
    #[serde(default, alias = "args", alias = "data")]
    payload: Option<Value>,
}

impl From<WireEvent> for IncomingEvent {
    fn from(wire: WireEvent) -> Self {
        let level = wire
            .level
            .as_ref()
            .and_then(Value::as_str)
            .and_then(LogLevel::from_str)
            .unwrap_or_default();

        let payload = match wire.payload {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.into_iter().map(sanitize).collect(),
            Some(other) => vec![sanitize(other)],
        };

        Self {
            level,
            timestamp: wire.timestamp.as_ref().and_then(parse_timestamp),
            payload,
        }
    }
}

/// Epoch milliseconds or an RFC 3339 string
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// Placeholder substituted for an argument that cannot be relayed
pub fn placeholder(reason: &str) -> Value {
    Value::String(format!("[unserializable: {}]", reason))
}

fn sanitize(value: Value) -> Value {
    if depth(&value) > MAX_PAYLOAD_DEPTH {
        placeholder("nesting too deep")
    } else {
        value
    }
}

fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

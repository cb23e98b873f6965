use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Status,
    TaskUpdate,
    Complete,
    Error,
}

impl UpdateKind {
    pub fn as_str(&self) -> &str {
        match self {
            UpdateKind::Status => "status",
            UpdateKind::TaskUpdate => "task_update",
            UpdateKind::Complete => "complete",
            UpdateKind::Error => "error",
        }
    }
}

/// One progress record pushed from a crew worker to the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateMessage {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub agent: Option<String>,
}

impl UpdateMessage {
    pub fn new(kind: UpdateKind, message: impl Into<String>, agent: Option<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            message: message.into(),
            agent,
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(UpdateKind::Status, message, None)
    }

    pub fn task_update(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(UpdateKind::TaskUpdate, message, Some(agent.into()))
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(UpdateKind::Complete, message, None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(UpdateKind::Error, message, None)
    }

    /// Single-line JSON rendering. Never fails.
    pub fn to_json_line(&self) -> String {
        describe_output(self)
    }
}

fn placeholder(type_name: &str) -> String {
    format!("<unencodable: {}>", type_name)
}

/// Renders an arbitrary output value as message text. Strings pass through
/// unquoted; anything else is JSON-encoded, falling back to a placeholder.
pub fn describe_output<T: Serialize + ?Sized>(output: &T) -> String {
    match serde_json::to_value(output) {
        Ok(Value::String(s)) => s,
        Ok(value) => value.to_string(),
        Err(e) => {
            let type_name = std::any::type_name::<T>();
            log::error!("Failed to encode output of type {}: {}", type_name, e);
            placeholder(type_name)
        }
    }
}

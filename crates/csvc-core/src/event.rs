//! Build progress records emitted by the container engine
//!
//! The engine's progress feed mixes two shapes in one stream: free-text
//! output lines (`{"stream": "..."}`) and structured status objects
//! carrying status, progress and error fields. Each decoded record is
//! classified into exactly one [`BuildEventRecord`] variant.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp layout used for rendered log lines (millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One classified record of the engine's progress feed
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEventRecord {
    /// Free-text output line
    LogLine {
        /// Wall-clock time at decode
        timestamp: DateTime<Local>,
        /// Line text as sent by the engine
        text: String,
    },

    /// Structured status/progress/error event
    Structured {
        /// Typed view of the record
        event: EngineEvent,
        /// The record as received
        raw: Map<String, Value>,
    },

    /// Record that is neither free text nor a valid structured event
    Unrecognized {
        /// The record as received
        raw: Map<String, Value>,
        /// Why it could not be interpreted
        reason: String,
    },
}

impl BuildEventRecord {
    /// Check if the record carries nothing worth rendering
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::LogLine { text, .. } if text.is_empty())
    }

    /// Formatted timestamp of a log line
    pub fn timestamp_str(&self) -> Option<String> {
        match self {
            Self::LogLine { timestamp, .. } => Some(timestamp.format(TIMESTAMP_FORMAT).to_string()),
            _ => None,
        }
    }
}

/// Structured event shape of the engine's build feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineEvent {
    /// Layer or step identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Pre-rendered progress bar text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    /// Numeric progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    /// Error message reported by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured error detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
    /// Auxiliary payload (e.g. the built image ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<Value>,
}

/// Numeric progress of a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetail {
    /// Units done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
    /// Units expected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

/// Structured error reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Engine error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EngineEvent {
    /// Error message, preferring the top-level field over the detail
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.error_detail.as_ref().and_then(|d| d.message.as_deref()))
    }

    /// Check if no known field is populated
    pub fn is_blank(&self) -> bool {
        self.id.is_none()
            && self.status.is_none()
            && self.progress.is_none()
            && self.progress_detail.is_none()
            && self.error_message().is_none()
            && self.aux.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_from_docker_shapes() {
        let event: EngineEvent = serde_json::from_str(
            r#"{"status":"Downloading","progressDetail":{"current":10,"total":100},"progress":"[=>  ]","id":"abc"}"#,
        )
        .unwrap();
        assert_eq!(event.id.as_deref(), Some("abc"));
        assert_eq!(event.status.as_deref(), Some("Downloading"));
        assert_eq!(event.progress_detail.unwrap().total, Some(100));

        let event: EngineEvent = serde_json::from_str(
            r#"{"errorDetail":{"code":1,"message":"boom"},"error":"boom"}"#,
        )
        .unwrap();
        assert_eq!(event.error_message(), Some("boom"));
    }

    #[test]
    fn test_error_message_falls_back_to_detail() {
        let event = EngineEvent {
            error_detail: Some(ErrorDetail { code: None, message: Some("detail".to_string()) }),
            ..Default::default()
        };
        assert_eq!(event.error_message(), Some("detail"));
        assert!(!event.is_blank());
        assert!(EngineEvent::default().is_blank());
    }

    #[test]
    fn test_empty_log_line() {
        let record = BuildEventRecord::LogLine { timestamp: Local::now(), text: String::new() };
        assert!(record.is_empty());
        assert!(record.timestamp_str().is_some());
    }
}

//! Message record sent to the dashboard.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One user prompt, tool invocation, or assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub session_id: String,
    /// Unique within the session
    pub message_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(
        session_id: impl Into<String>,
        message_id: impl Into<String>,
        role: Role,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message_id: message_id.into(),
            role,
            content: None,
            tool_name: None,
            tool_args: None,
            tool_result: None,
            duration_ms: None,
            timestamp,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Body of `POST /sync/batch`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<super::SessionRecord>,
    pub messages: Vec<MessageRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_record_json_shape() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let record = MessageRecord::new("s1", "m1", Role::Assistant, ts).with_content("hi");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["messageId"], "m1");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
        assert!(json.get("toolName").is_none());
    }
}

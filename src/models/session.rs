//! Session record sent to the dashboard.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of a Claude Code session as the dashboard stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session UUID
    pub session_id: String,
    /// First prompt or transcript summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Working directory the session ran in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Git branch at session start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    /// Estimated cost in USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
    pub message_count: u64,
    pub tool_call_count: u64,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// Get a display name for the session.
    pub fn display_name(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => self.session_id.chars().take(8).collect(),
        }
    }

    /// Calculate approximate duration.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end.signed_duration_since(start)),
            _ => None,
        }
    }

    /// Format duration as human-readable string.
    pub fn duration_str(&self) -> String {
        let Some(dur) = self.duration() else {
            return "-".to_string();
        };
        let hours = dur.num_hours();
        let minutes = dur.num_minutes() % 60;

        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else if minutes > 0 {
            format!("{}m", minutes)
        } else {
            "< 1m".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_serializes_camel_case_and_skips_missing() {
        let mut record = SessionRecord::new("abc");
        record.input_tokens = 3;
        record.started_at = Some(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["inputTokens"], 3);
        assert_eq!(json["startedAt"], 1_700_000_000_000i64);
        assert!(json.get("title").is_none());
        assert!(json.get("endedAt").is_none());
        assert!(json.get("costEstimate").is_none());
    }

    #[test]
    fn test_duration_str() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let mut record = SessionRecord::new("abc");
        assert_eq!(record.duration_str(), "-");

        record.started_at = Some(start);
        record.ended_at = Some(start + chrono::Duration::seconds(30));
        assert_eq!(record.duration_str(), "< 1m");

        record.ended_at = Some(start + chrono::Duration::minutes(95));
        assert_eq!(record.duration_str(), "1h 35m");
    }

    #[test]
    fn test_display_name_falls_back_to_short_id() {
        let mut record = SessionRecord::new("0123456789abcdef");
        assert_eq!(record.display_name(), "01234567");
        record.title = Some("Fix the parser".into());
        assert_eq!(record.display_name(), "Fix the parser");
    }
}

//! Entry types from Claude Code JSONL transcripts.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A single line in a session transcript.
///
/// Every field is optional or defaulted: transcripts are written
/// incrementally and carry many entry types we don't care about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub message: Option<MessageContent>,
    #[serde(default)]
    pub is_sidechain: bool,
    #[serde(default)]
    pub is_meta: bool,
    /// Present on `summary` entries
    #[serde(default)]
    pub summary: Option<String>,
}

impl TranscriptEntry {
    pub fn is_user(&self) -> bool {
        self.entry_type == "user"
    }

    pub fn is_assistant(&self) -> bool {
        self.entry_type == "assistant"
    }

    pub fn is_summary(&self) -> bool {
        self.entry_type == "summary"
    }
}

/// Message content - can be simple text or structured with tool calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Simple {
        role: String,
        content: String,
    },
    Structured {
        #[serde(default)]
        id: Option<String>,
        role: String,
        content: Vec<ContentBlock>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        usage: Option<TokenUsage>,
    },
}

impl MessageContent {
    /// Get the role of this message.
    pub fn role(&self) -> &str {
        match self {
            MessageContent::Simple { role, .. } => role,
            MessageContent::Structured { role, .. } => role,
        }
    }

    /// API message id; shared by every transcript line of one assistant reply.
    pub fn id(&self) -> Option<&str> {
        match self {
            MessageContent::Simple { .. } => None,
            MessageContent::Structured { id, .. } => id.as_deref(),
        }
    }

    /// Concatenated text blocks (or the simple content), trimmed.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Simple { content, .. } => content.trim().to_string(),
            MessageContent::Structured { content, .. } => content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.trim()),
                    _ => None,
                })
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// Get the model used (for assistant messages).
    pub fn model(&self) -> Option<&str> {
        match self {
            MessageContent::Simple { .. } => None,
            MessageContent::Structured { model, .. } => model.as_deref(),
        }
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            MessageContent::Simple { .. } => None,
            MessageContent::Structured { usage, .. } => usage.as_ref(),
        }
    }

    /// Ids of the tool calls requested in this message.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        match self {
            MessageContent::Simple { .. } => Vec::new(),
            MessageContent::Structured { content, .. } => content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// True for user lines that only carry tool results back to the model.
    pub fn is_tool_result(&self) -> bool {
        match self {
            MessageContent::Simple { .. } => false,
            MessageContent::Structured { content, .. } => {
                !content.is_empty()
                    && content
                        .iter()
                        .all(|block| matches!(block, ContentBlock::ToolResult { .. }))
            }
        }
    }
}

/// Content block within a structured message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(rename = "thinking")]
    Thinking { thinking: String },
    #[serde(other)]
    Unknown,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assistant_entry() {
        let line = r#"{"type":"assistant","uuid":"u1","sessionId":"s1","timestamp":"2025-01-01T10:00:00Z","cwd":"/repo","gitBranch":"main","message":{"id":"msg_1","role":"assistant","model":"claude-sonnet-4-20250514","content":[{"type":"thinking","thinking":"hmm","signature":"x"},{"type":"text","text":"Done."},{"type":"tool_use","id":"toolu_1","name":"Bash","input":{"command":"ls"}}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":100,"cache_creation_input_tokens":20}}}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        assert!(entry.is_assistant());
        assert_eq!(entry.git_branch.as_deref(), Some("main"));

        let message = entry.message.unwrap();
        assert_eq!(message.id(), Some("msg_1"));
        assert_eq!(message.text(), "Done.");
        assert_eq!(message.tool_use_ids(), vec!["toolu_1"]);
        assert_eq!(
            message.usage().copied(),
            Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                cache_read_input_tokens: 100,
                cache_creation_input_tokens: 20,
            })
        );
    }

    #[test]
    fn test_parse_simple_user_entry() {
        let line = r#"{"type":"user","uuid":"u2","timestamp":"2025-01-01T10:00:00Z","message":{"role":"user","content":"  fix the build  "}}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        let message = entry.message.unwrap();
        assert_eq!(message.role(), "user");
        assert_eq!(message.text(), "fix the build");
        assert!(!message.is_tool_result());
    }

    #[test]
    fn test_tool_result_only_user_entry() {
        let line = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_1","content":"ok"}]}}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        assert!(entry.message.unwrap().is_tool_result());
    }

    #[test]
    fn test_summary_entry_without_timestamp() {
        let line = r#"{"type":"summary","summary":"Fix flaky test","leafUuid":"u9"}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        assert!(entry.is_summary());
        assert!(entry.timestamp.is_none());
        assert_eq!(entry.summary.as_deref(), Some("Fix flaky test"));
    }
}

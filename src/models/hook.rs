//! Hook payloads Claude Code writes to a hook command's stdin.

use serde::Deserialize;
use serde_json::Value;

/// Lifecycle events we forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEventKind {
    SessionStart,
    SessionEnd,
    UserPromptSubmit,
    PostToolUse,
    Stop,
}

impl HookEventKind {
    /// Parse an event name. Accepts the host's PascalCase names as well as
    /// kebab/snake-case spellings used on the command line.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(|c| c.to_lowercase())
            .collect();
        match normalized.as_str() {
            "sessionstart" => Some(Self::SessionStart),
            "sessionend" => Some(Self::SessionEnd),
            "userpromptsubmit" | "prompt" => Some(Self::UserPromptSubmit),
            "posttooluse" | "tooluse" => Some(Self::PostToolUse),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PostToolUse => "PostToolUse",
            Self::Stop => "Stop",
        }
    }
}

/// Input JSON from Claude Code hooks.
///
/// Only the fields this tool reads are declared; the rest are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookEvent {
    pub session_id: String,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    /// UserPromptSubmit
    #[serde(default)]
    pub prompt: Option<String>,
    /// PostToolUse
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub tool_use_id: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// SessionStart: model id, when the host reports one
    #[serde(default)]
    pub model: Option<Value>,
    /// SessionStart trigger ("startup", "resume", "clear", "compact")
    #[serde(default)]
    pub source: Option<String>,
    /// SessionEnd reason
    #[serde(default)]
    pub reason: Option<String>,
    /// SessionEnd: cost already computed by the host
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

impl HookEvent {
    pub fn kind(&self) -> Option<HookEventKind> {
        self.hook_event_name.as_deref().and_then(HookEventKind::parse)
    }

    /// Model id, whether reported as a bare string or as `{ "id": ... }`.
    pub fn model_id(&self) -> Option<String> {
        match self.model.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(obj) => obj
                .get("id")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_names() {
        assert_eq!(HookEventKind::parse("SessionStart"), Some(HookEventKind::SessionStart));
        assert_eq!(HookEventKind::parse("session-end"), Some(HookEventKind::SessionEnd));
        assert_eq!(HookEventKind::parse("user_prompt_submit"), Some(HookEventKind::UserPromptSubmit));
        assert_eq!(HookEventKind::parse("PostToolUse"), Some(HookEventKind::PostToolUse));
        assert_eq!(HookEventKind::parse("stop"), Some(HookEventKind::Stop));
        assert_eq!(HookEventKind::parse("PreCompact"), None);
        assert_eq!(HookEventKind::parse("Notification"), None);
    }

    #[test]
    fn test_deserialize_post_tool_use() {
        let raw = r#"{
            "session_id": "abc",
            "transcript_path": "/tmp/abc.jsonl",
            "cwd": "/repo",
            "hook_event_name": "PostToolUse",
            "permission_mode": "default",
            "tool_name": "Bash",
            "tool_input": {"command": "cargo fmt"},
            "tool_response": {"stdout": "", "stderr": ""},
            "tool_use_id": "toolu_01"
        }"#;
        let event: HookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind(), Some(HookEventKind::PostToolUse));
        assert_eq!(event.tool_name.as_deref(), Some("Bash"));
        assert_eq!(event.tool_use_id.as_deref(), Some("toolu_01"));
    }

    #[test]
    fn test_model_id_shapes() {
        let mut event = HookEvent {
            model: Some(serde_json::json!("claude-opus-4-1")),
            ..HookEvent::default()
        };
        assert_eq!(event.model_id().as_deref(), Some("claude-opus-4-1"));

        event.model = Some(serde_json::json!({"id": "claude-sonnet-4", "display_name": "Sonnet"}));
        assert_eq!(event.model_id().as_deref(), Some("claude-sonnet-4"));

        event.model = None;
        assert_eq!(event.model_id(), None);
    }
}

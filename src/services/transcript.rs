//! Transcript scanner - aggregates a session JSONL file into totals.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::models::TranscriptEntry;

/// Longest title derived from a prompt.
const MAX_TITLE_CHARS: usize = 100;

/// One assistant reply extracted from a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub id: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Aggregate statistics of a transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptSummary {
    pub model: Option<String>,
    pub title: Option<String>,
    pub first_prompt: Option<String>,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub message_count: u64,
    pub tool_call_count: u64,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub assistant_messages: Vec<AssistantMessage>,
}

impl TranscriptSummary {
    /// Milliseconds between the first and last timestamped entry.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => Some(last.signed_duration_since(first).num_milliseconds()),
            _ => None,
        }
    }

    /// Title if one was recorded, else one derived from the first prompt.
    pub fn display_title(&self) -> Option<String> {
        self.title
            .clone()
            .or_else(|| self.first_prompt.as_deref().and_then(title_from_prompt))
    }

    /// Combine two partial scans of the same growing transcript.
    ///
    /// First non-empty value wins for strings, timestamps widen, counters
    /// take the maximum, assistant messages are unioned by id. Merging a
    /// summary with itself leaves it unchanged.
    pub fn merge(mut self, other: TranscriptSummary) -> TranscriptSummary {
        first_wins(&mut self.model, other.model);
        first_wins(&mut self.title, other.title);
        first_wins(&mut self.first_prompt, other.first_prompt);
        first_wins(&mut self.cwd, other.cwd);
        first_wins(&mut self.git_branch, other.git_branch);

        self.input_tokens = self.input_tokens.max(other.input_tokens);
        self.output_tokens = self.output_tokens.max(other.output_tokens);
        self.cache_creation_tokens = self.cache_creation_tokens.max(other.cache_creation_tokens);
        self.cache_read_tokens = self.cache_read_tokens.max(other.cache_read_tokens);
        self.message_count = self.message_count.max(other.message_count);
        self.tool_call_count = self.tool_call_count.max(other.tool_call_count);

        self.first_timestamp = earliest(self.first_timestamp, other.first_timestamp);
        self.last_timestamp = latest(self.last_timestamp, other.last_timestamp);

        let known: HashSet<String> = self.assistant_messages.iter().map(|m| m.id.clone()).collect();
        self.assistant_messages
            .extend(other.assistant_messages.into_iter().filter(|m| !known.contains(&m.id)));

        self
    }
}

/// Keep `slot` if it already holds a non-empty value.
pub(crate) fn first_wins(slot: &mut Option<String>, candidate: Option<String>) {
    if slot.as_deref().map_or(true, str::is_empty) {
        if let Some(value) = candidate.filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }
}

pub(crate) fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

pub(crate) fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Derive a one-line title from a user prompt.
pub fn title_from_prompt(prompt: &str) -> Option<String> {
    let line = prompt.lines().map(str::trim).find(|l| !l.is_empty())?;
    // Sanitize: replace control chars with spaces
    let sanitized: String = line
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    Some(truncate_chars(sanitized.trim(), MAX_TITLE_CHARS))
}

/// Truncate on a char boundary, appending "..." when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Scan a transcript. A missing or unreadable file yields an empty summary.
pub fn scan_transcript(path: &Path) -> TranscriptSummary {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "transcript not readable");
            return TranscriptSummary::default();
        }
    };
    scan_reader(BufReader::new(file))
}

/// Uuid of the latest transcript line recording `prompt` as a user prompt.
pub fn find_prompt_uuid(path: &Path, prompt: &str) -> Option<String> {
    let file = File::open(path).ok()?;
    let prompt = prompt.trim();

    BufReader::new(file)
        .split(b'\n')
        .map_while(|line| line.ok())
        .filter_map(|line| serde_json::from_slice::<TranscriptEntry>(&line).ok())
        .filter(|entry| entry.is_user() && !entry.is_meta && !entry.is_sidechain)
        .filter(|entry| {
            entry
                .message
                .as_ref()
                .is_some_and(|m| !m.is_tool_result() && m.text().trim() == prompt)
        })
        .filter_map(|entry| entry.uuid)
        .last()
}

/// Scan transcript lines from any reader.
pub fn scan_reader<R: BufRead>(reader: R) -> TranscriptSummary {
    let mut summary = TranscriptSummary::default();
    let mut usage_seen: HashSet<String> = HashSet::new();
    let mut text_seen: HashSet<String> = HashSet::new();
    let mut replies_seen: HashSet<String> = HashSet::new();
    let mut tools_seen: HashSet<String> = HashSet::new();
    let mut skipped = 0usize;

    for line in reader.split(b'\n') {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "transcript read failed");
                break;
            }
        };
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        // Bad encoding fails here like any other malformed line.
        let Ok(entry) = serde_json::from_slice::<TranscriptEntry>(&line) else {
            skipped += 1;
            continue;
        };

        first_wins(&mut summary.cwd, entry.cwd.clone());
        first_wins(&mut summary.git_branch, entry.git_branch.clone());

        if let Some(ts) = entry.timestamp {
            summary.first_timestamp = earliest(summary.first_timestamp, Some(ts));
            summary.last_timestamp = latest(summary.last_timestamp, Some(ts));
        }

        if entry.is_summary() {
            first_wins(&mut summary.title, entry.summary.clone());
            continue;
        }

        let Some(message) = &entry.message else {
            continue;
        };

        if entry.is_user() {
            if entry.is_meta || entry.is_sidechain || message.is_tool_result() {
                continue;
            }
            let text = message.text();
            if text.is_empty() {
                continue;
            }
            summary.message_count += 1;
            first_wins(&mut summary.first_prompt, Some(text));
        } else if entry.is_assistant() {
            let Some(id) = message.id().map(str::to_string).or_else(|| entry.uuid.clone()) else {
                continue;
            };

            if let Some(model) = message.model().filter(|m| !m.starts_with('<')) {
                first_wins(&mut summary.model, Some(model.to_string()));
            }

            if !entry.is_sidechain && replies_seen.insert(id.clone()) {
                summary.message_count += 1;
            }

            if let Some(usage) = message.usage() {
                if usage_seen.insert(id.clone()) {
                    summary.input_tokens += usage.input_tokens;
                    summary.output_tokens += usage.output_tokens;
                    summary.cache_creation_tokens += usage.cache_creation_input_tokens;
                    summary.cache_read_tokens += usage.cache_read_input_tokens;
                }
            }

            for tool_id in message.tool_use_ids() {
                if tools_seen.insert(tool_id.to_string()) {
                    summary.tool_call_count += 1;
                }
            }

            // Subagent replies are billed but not forwarded
            if entry.is_sidechain {
                continue;
            }
            let text = message.text();
            if !text.is_empty() && text_seen.insert(id.clone()) {
                summary.assistant_messages.push(AssistantMessage {
                    id,
                    text,
                    timestamp: entry.timestamp,
                });
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "skipped malformed transcript lines");
    }

    summary
}

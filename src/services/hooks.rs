//! Hook event handling - maps lifecycle events to dashboard records.
//!
//! This is the one path from a hook payload plus ledger state to the records
//! we deliver. Planning mutates the ledger; delivery marks message ids as
//! synced only after the backend accepts them.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::{HookEvent, HookEventKind, MessageRecord, Role, SessionRecord, SyncBatch};
use crate::services::client::SyncBackend;
use crate::services::ledger::{Ledger, LedgerEntry};
use crate::services::transcript::{
    earliest, find_prompt_uuid, first_wins, latest, scan_transcript, title_from_prompt,
    truncate_chars, TranscriptSummary,
};

/// A single request to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Session(SessionRecord),
    Message(MessageRecord),
    Batch(SyncBatch),
}

impl Outbound {
    /// Ids to record as synced once this delivery succeeds.
    pub fn message_ids(&self) -> Vec<String> {
        match self {
            Outbound::Session(_) => Vec::new(),
            Outbound::Message(m) => vec![m.message_id.clone()],
            Outbound::Batch(b) => b.messages.iter().map(|m| m.message_id.clone()).collect(),
        }
    }

    pub async fn send<B: SyncBackend + ?Sized>(&self, backend: &B) -> Result<()> {
        match self {
            Outbound::Session(s) => backend.sync_session(s).await,
            Outbound::Message(m) => backend.sync_message(m).await,
            Outbound::Batch(b) => backend.sync_batch(b).await,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outbound::Session(_) => "session",
            Outbound::Message(_) => "message",
            Outbound::Batch(_) => "batch",
        }
    }
}

/// What a hook invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookOutcome {
    pub kind: Option<HookEventKind>,
    pub sent: usize,
    pub failed: usize,
}

/// Plan, deliver, and record one hook event. Never fails: delivery errors
/// are logged and counted.
pub async fn handle_event<B: SyncBackend + ?Sized>(
    event: &HookEvent,
    kind: Option<HookEventKind>,
    ledger: &mut Ledger,
    backend: &B,
    config: &SyncConfig,
) -> HookOutcome {
    let kind = kind.or_else(|| event.kind());
    let mut outcome = HookOutcome {
        kind,
        ..HookOutcome::default()
    };

    let Some(kind) = kind else {
        tracing::debug!(event = ?event.hook_event_name, "ignoring unsupported hook event");
        return outcome;
    };

    let outbound = plan_event(kind, event, ledger, config, Utc::now());
    tracing::debug!(event = kind.as_str(), session = %event.session_id, requests = outbound.len(), "planned");

    for item in outbound {
        match item.send(backend).await {
            Ok(()) => {
                ledger.mark_synced(&event.session_id, item.message_ids());
                outcome.sent += 1;
            }
            Err(e) => {
                tracing::warn!(event = kind.as_str(), request = item.label(), error = %e, "sync failed");
                outcome.failed += 1;
            }
        }
    }

    outcome
}

/// Ledger bookkeeping for an event that can't be delivered at all.
///
/// Session end still retires the entry; nothing else changes. Returns
/// whether the ledger was modified.
pub fn settle_undelivered(event: &HookEvent, kind: Option<HookEventKind>, ledger: &mut Ledger) -> bool {
    match kind.or_else(|| event.kind()) {
        Some(HookEventKind::SessionEnd) => ledger.remove(&event.session_id).is_some(),
        _ => false,
    }
}

/// Apply an event to the ledger and return the records to deliver.
pub fn plan_event(
    kind: HookEventKind,
    event: &HookEvent,
    ledger: &mut Ledger,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Vec<Outbound> {
    let sid = event.session_id.as_str();

    match kind {
        HookEventKind::SessionStart => {
            tracing::debug!(session = sid, source = ?event.source, "session start");
            let entry = ledger.entry(sid);
            touch(entry, event, now);
            first_wins(&mut entry.model, event.model_id());
            if entry.git_branch.is_none() {
                entry.git_branch = event.cwd.as_deref().and_then(current_git_branch);
            }
            if let Some(summary) = scan_event_transcript(event) {
                entry.absorb(&summary);
            }
            entry.started_at = earliest(entry.started_at, Some(now));

            vec![Outbound::Session(entry.to_record(sid))]
        }

        HookEventKind::UserPromptSubmit => {
            let prompt = event.prompt.as_deref().map(str::trim).unwrap_or_default();
            let entry = ledger.entry(sid);
            touch(entry, event, now);
            if prompt.is_empty() {
                return Vec::new();
            }

            let message_id = match event_transcript_path(event).and_then(|p| find_prompt_uuid(p, prompt)) {
                Some(line_uuid) => format!("prompt-{line_uuid}"),
                None => format!("prompt-{}", uuid::Uuid::new_v4()),
            };
            if entry.is_synced(&message_id) {
                tracing::debug!(%message_id, "prompt already synced");
                return Vec::new();
            }

            let had_title = entry.title.is_some();
            first_wins(&mut entry.first_prompt, Some(prompt.to_string()));
            first_wins(&mut entry.title, title_from_prompt(prompt));
            if entry.first_count(&message_id) {
                entry.message_count += 1;
            }

            let message = MessageRecord::new(sid, message_id, Role::User, now)
                .with_content(truncate_chars(prompt, config.max_content_chars));

            let mut out = vec![Outbound::Message(message)];
            if !had_title && entry.title.is_some() {
                out.push(Outbound::Session(entry.to_record(sid)));
            }
            out
        }

        HookEventKind::PostToolUse => {
            let message_id = event
                .tool_use_id
                .clone()
                .unwrap_or_else(|| format!("tool-{}", uuid::Uuid::new_v4()));

            let entry = ledger.entry(sid);
            if entry.is_synced(&message_id) {
                tracing::debug!(%message_id, "tool call already synced");
                return Vec::new();
            }
            touch(entry, event, now);
            if entry.first_count(&message_id) {
                entry.tool_call_count += 1;
            }

            if !config.sync_tool_calls {
                return Vec::new();
            }

            let mut message = MessageRecord::new(sid, message_id, Role::Assistant, now);
            message.tool_name = event.tool_name.clone();
            message.tool_args = event
                .tool_input
                .as_ref()
                .map(|v| truncate_chars(&render_value(v), config.max_content_chars));
            message.tool_result = event
                .tool_response
                .as_ref()
                .map(|v| truncate_chars(&render_value(v), config.max_content_chars));
            message.duration_ms = event.duration_ms;

            vec![Outbound::Message(message)]
        }

        HookEventKind::Stop => {
            let entry = ledger.entry(sid);
            touch(entry, event, now);
            let messages = match scan_event_transcript(event) {
                Some(summary) => {
                    entry.absorb(&summary);
                    unsynced_messages(sid, &summary, entry, config, now)
                }
                None => Vec::new(),
            };

            vec![Outbound::Batch(SyncBatch {
                session: Some(entry.to_record(sid)),
                messages,
            })]
        }

        HookEventKind::SessionEnd => {
            tracing::debug!(session = sid, reason = ?event.reason, "session end");
            let mut entry = ledger.remove(sid).unwrap_or_else(|| {
                tracing::debug!(session = sid, "session end without ledger entry");
                LedgerEntry::default()
            });
            touch(&mut entry, event, now);
            let messages = match scan_event_transcript(event) {
                Some(summary) => {
                    entry.absorb(&summary);
                    unsynced_messages(sid, &summary, &entry, config, now)
                }
                None => Vec::new(),
            };

            vec![Outbound::Batch(SyncBatch {
                session: Some(final_record(sid, &entry, event.cost_usd, now)),
                messages,
            })]
        }
    }
}

/// Result of sending one transcript with [`sync_transcript`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSync {
    pub session: SessionRecord,
    pub messages_sent: usize,
}

/// Deliver a whole transcript outside the hook lifecycle.
///
/// Ids already synced for a live session are skipped, and newly sent ids are
/// recorded against that session. Empty transcripts send nothing.
pub async fn sync_transcript<B: SyncBackend + ?Sized>(
    path: &Path,
    session_id: &str,
    ledger: &mut Ledger,
    backend: &B,
    config: &SyncConfig,
) -> Result<Option<TranscriptSync>> {
    let summary = scan_transcript(path);
    if summary.first_timestamp.is_none() && summary.message_count == 0 {
        tracing::debug!(path = %path.display(), "empty transcript, nothing to sync");
        return Ok(None);
    }

    let mut entry = ledger.get(session_id).cloned().unwrap_or_default();
    entry.absorb(&summary);

    let now = Utc::now();
    let messages = unsynced_messages(session_id, &summary, &entry, config, now);
    let mut session = final_record(session_id, &entry, None, now);
    session.ended_at = summary.last_timestamp;
    session.duration_ms = summary.duration_ms();

    let messages_sent = messages.len();
    let batch = Outbound::Batch(SyncBatch {
        session: Some(session.clone()),
        messages,
    });
    batch.send(backend).await?;
    ledger.mark_synced(session_id, batch.message_ids());

    Ok(Some(TranscriptSync {
        session,
        messages_sent,
    }))
}

/// Common bookkeeping for every event.
fn touch(entry: &mut LedgerEntry, event: &HookEvent, now: DateTime<Utc>) {
    first_wins(&mut entry.cwd, event.cwd.clone());
    entry.last_activity = latest(entry.last_activity, Some(now));
}

fn event_transcript_path(event: &HookEvent) -> Option<&Path> {
    event
        .transcript_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(Path::new)
}

fn scan_event_transcript(event: &HookEvent) -> Option<TranscriptSummary> {
    event_transcript_path(event).map(scan_transcript)
}

fn unsynced_messages(
    session_id: &str,
    summary: &TranscriptSummary,
    entry: &LedgerEntry,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Vec<MessageRecord> {
    summary
        .assistant_messages
        .iter()
        .filter(|m| !entry.is_synced(&m.id))
        .map(|m| {
            MessageRecord::new(session_id, m.id.clone(), Role::Assistant, m.timestamp.unwrap_or(now))
                .with_content(truncate_chars(&m.text, config.max_content_chars))
        })
        .collect()
}

/// Session record for a finished session, with cost filled in.
fn final_record(
    session_id: &str,
    entry: &LedgerEntry,
    supplied_cost: Option<f64>,
    now: DateTime<Utc>,
) -> SessionRecord {
    let mut record = entry.to_record(session_id);
    record.cost_estimate = Some(supplied_cost.unwrap_or_else(|| entry.estimated_cost()));
    record.ended_at = Some(now);
    record.duration_ms = entry
        .started_at
        .map(|start| now.signed_duration_since(start).num_milliseconds().max(0));
    record
}

/// Strings pass through; everything else as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Current branch of the repository at `cwd`, if any.
fn current_git_branch(cwd: &str) -> Option<String> {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(cwd)
        .arg("rev-parse")
        .arg("--abbrev-ref")
        .arg("HEAD")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty() && branch != "HEAD").then_some(branch)
}

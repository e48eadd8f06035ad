//! Session-state ledger persisted between hook invocations.
//!
//! Every hook runs in a fresh process, so per-session accumulators and the
//! set of already-forwarded message ids live in a JSON file that is loaded,
//! mutated and rewritten once per invocation. There is no cross-process lock:
//! two hooks racing on the same file resolve as last writer wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::SessionRecord;
use crate::services::pricing::{estimate_cost, TokenCounts};
use crate::services::transcript::{earliest, first_wins, latest, TranscriptSummary};

/// Accumulated state for one live session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerEntry {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub message_count: u64,
    pub tool_call_count: u64,
    pub first_prompt: Option<String>,
    pub title: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    /// Message ids already accepted by the backend
    pub synced_message_ids: BTreeSet<String>,
    /// Prompt and tool ids already folded into the counters
    pub counted_ids: BTreeSet<String>,
}

impl LedgerEntry {
    /// Fold a transcript scan into the entry.
    pub fn absorb(&mut self, summary: &TranscriptSummary) {
        let current = std::mem::take(self);
        *self = current.merge(LedgerEntry::from(summary));
    }

    /// Monotonic merge of two partial views of one session.
    ///
    /// Strings keep the first non-empty value, timestamps widen, counters
    /// take the maximum and synced ids are unioned. Merging is idempotent.
    pub fn merge(mut self, other: LedgerEntry) -> LedgerEntry {
        self.input_tokens = self.input_tokens.max(other.input_tokens);
        self.output_tokens = self.output_tokens.max(other.output_tokens);
        self.cache_creation_tokens = self.cache_creation_tokens.max(other.cache_creation_tokens);
        self.cache_read_tokens = self.cache_read_tokens.max(other.cache_read_tokens);
        self.message_count = self.message_count.max(other.message_count);
        self.tool_call_count = self.tool_call_count.max(other.tool_call_count);

        first_wins(&mut self.first_prompt, other.first_prompt);
        first_wins(&mut self.title, other.title);
        first_wins(&mut self.model, other.model);
        first_wins(&mut self.cwd, other.cwd);
        first_wins(&mut self.git_branch, other.git_branch);

        self.started_at = earliest(self.started_at, other.started_at);
        self.last_activity = latest(self.last_activity, other.last_activity);
        self.synced_message_ids.extend(other.synced_message_ids);
        self.counted_ids.extend(other.counted_ids);
        self
    }

    pub fn is_synced(&self, message_id: &str) -> bool {
        self.synced_message_ids.contains(message_id)
    }

    /// Record that `id` has been counted. False if it already was.
    pub fn first_count(&mut self, id: &str) -> bool {
        self.counted_ids.insert(id.to_string())
    }

    pub fn tokens(&self) -> TokenCounts {
        TokenCounts {
            input: self.input_tokens,
            cache_write: self.cache_creation_tokens,
            cache_read: self.cache_read_tokens,
            output: self.output_tokens,
        }
    }

    pub fn estimated_cost(&self) -> f64 {
        estimate_cost(self.model.as_deref(), self.tokens())
    }

    /// Snapshot the entry as a dashboard session record.
    pub fn to_record(&self, session_id: &str) -> SessionRecord {
        SessionRecord {
            session_id: session_id.to_string(),
            title: self.title.clone(),
            project_path: self.cwd.clone(),
            model: self.model.clone(),
            git_branch: self.git_branch.clone(),
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cache_creation_tokens: self.cache_creation_tokens,
            cache_read_tokens: self.cache_read_tokens,
            cost_estimate: None,
            message_count: self.message_count,
            tool_call_count: self.tool_call_count,
            started_at: self.started_at,
            ended_at: None,
            duration_ms: None,
        }
    }
}

impl From<&TranscriptSummary> for LedgerEntry {
    fn from(summary: &TranscriptSummary) -> Self {
        Self {
            input_tokens: summary.input_tokens,
            output_tokens: summary.output_tokens,
            cache_creation_tokens: summary.cache_creation_tokens,
            cache_read_tokens: summary.cache_read_tokens,
            message_count: summary.message_count,
            tool_call_count: summary.tool_call_count,
            first_prompt: summary.first_prompt.clone(),
            title: summary.display_title(),
            model: summary.model.clone(),
            cwd: summary.cwd.clone(),
            git_branch: summary.git_branch.clone(),
            started_at: summary.first_timestamp,
            last_activity: summary.last_timestamp,
            synced_message_ids: BTreeSet::new(),
            counted_ids: BTreeSet::new(),
        }
    }
}

/// Per-session state keyed by session id.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    sessions: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    /// An empty ledger that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sessions: BTreeMap::new(),
        }
    }

    /// Load the ledger. Missing or corrupt files give an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
                }
                return Self::empty(path);
            }
        };

        match serde_json::from_str::<BTreeMap<String, LedgerEntry>>(&content) {
            Ok(sessions) => Self { path, sessions },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ledger corrupt, starting empty");
                Self::empty(path)
            }
        }
    }

    /// Write the whole ledger atomically: temp file then rename.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(&self.sessions).context("Failed to serialize ledger")?;

        let tmp_path = self.path.with_extension(format!("{}.tmp", std::process::id()));
        let result = write_then_rename(&tmp_path, &self.path, contents.as_bytes());
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get or create the entry for a session.
    pub fn entry(&mut self, session_id: &str) -> &mut LedgerEntry {
        self.sessions.entry(session_id.to_string()).or_default()
    }

    pub fn get(&self, session_id: &str) -> Option<&LedgerEntry> {
        self.sessions.get(session_id)
    }

    /// Delete a session's entry, returning it if present.
    pub fn remove(&mut self, session_id: &str) -> Option<LedgerEntry> {
        self.sessions.remove(session_id)
    }

    /// Record ids the backend accepted. No-op for unknown sessions.
    pub fn mark_synced<I, S>(&mut self, session_id: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(entry) = self.sessions.get_mut(session_id) {
            entry.synced_message_ids.extend(ids.into_iter().map(Into::into));
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn write_then_rename(tmp_path: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(tmp_path)
        .with_context(|| format!("Failed to create temp file {}", tmp_path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write temp file {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to flush temp file {}", tmp_path.display()))?;
    fs::rename(tmp_path, path)
        .with_context(|| format!("Failed to rename {} to {}", tmp_path.display(), path.display()))?;
    Ok(())
}

//! Session store - discovers Claude Code transcripts on disk.
//!
//! Transcripts live at `<claude_dir>/projects/<encoded-project>/<session-id>.jsonl`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::config::Config;

/// A transcript found under the projects directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFile {
    pub session_id: String,
    pub path: PathBuf,
    /// Encoded project directory name
    pub project: String,
    pub modified: Option<SystemTime>,
}

/// Service for discovering transcripts under a projects directory.
pub struct SessionStore {
    projects_dir: PathBuf,
}

impl SessionStore {
    pub fn new(config: &Config) -> Self {
        Self::with_projects_dir(config.claude_projects_dir())
    }

    pub fn with_projects_dir(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// All resumable transcripts, oldest first.
    ///
    /// `project` may be a filesystem path or an already-encoded directory
    /// name; when given, only that project's transcripts are returned.
    pub fn discover(&self, project: Option<&str>) -> Vec<TranscriptFile> {
        if !self.projects_dir.exists() {
            tracing::debug!(dir = %self.projects_dir.display(), "no projects directory");
            return Vec::new();
        }

        let wanted = project.map(|p| {
            let p = p.trim_end_matches('/');
            if p.starts_with('/') {
                encode_project_path(p)
            } else {
                p.to_string()
            }
        });

        let mut found: Vec<TranscriptFile> = WalkDir::new(&self.projects_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| transcript_at(e.path()))
            .filter(|t| wanted.as_deref().map_or(true, |w| w == t.project))
            .collect();

        found.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        found
    }
}

/// Describe a resumable transcript file, or `None` for anything else,
/// including a file that has disappeared since it was listed.
fn transcript_at(path: &Path) -> Option<TranscriptFile> {
    // Only process .jsonl files
    if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
        return None;
    }

    // Always use the filename as session ID; entries inside can carry a parent's id.
    let session_id = path.file_stem().and_then(|n| n.to_str())?;
    // Subagent transcripts belong to their parent session
    if session_id.starts_with("agent-") {
        return None;
    }

    let project = path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str())?;
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "transcript vanished");
            return None;
        }
    };

    Some(TranscriptFile {
        session_id: session_id.to_string(),
        path: path.to_path_buf(),
        project: project.to_string(),
        modified: metadata.modified().ok(),
    })
}

/// Session id for a transcript path: its file stem.
pub fn session_id_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Encode a project path to Claude directory name format.
/// e.g., "/home/garrett/Projects/jwst.cosmos" -> "-home-garrett-Projects-jwst-cosmos"
pub fn encode_project_path(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}\n").unwrap();
    }

    #[test]
    fn test_discover_skips_agents_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let projects = dir.path().join("projects");
        touch(&projects.join("-repo-a").join("s1.jsonl"));
        touch(&projects.join("-repo-a").join("agent-123.jsonl"));
        touch(&projects.join("-repo-a").join("notes.txt"));
        touch(&projects.join("-repo-b").join("s2.jsonl"));
        touch(&projects.join("stray.jsonl"));
        touch(&projects.join("-repo-b").join("nested").join("s3.jsonl"));

        let store = SessionStore::with_projects_dir(&projects);
        let mut ids: Vec<_> = store
            .discover(None)
            .into_iter()
            .map(|t| t.session_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_discover_filters_by_project() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("-repo-a").join("s1.jsonl"));
        touch(&dir.path().join("-repo-b").join("s2.jsonl"));
        let store = SessionStore::with_projects_dir(dir.path());

        let by_path = store.discover(Some("/repo/b/"));
        assert_eq!(by_path.len(), 1);
        assert_eq!(by_path[0].session_id, "s2");
        assert_eq!(by_path[0].project, "-repo-b");

        let by_name = store.discover(Some("-repo-a"));
        assert_eq!(by_name[0].session_id, "s1");
    }

    #[test]
    fn test_missing_projects_dir_is_empty() {
        let store = SessionStore::with_projects_dir("/definitely/not/here");
        assert!(store.discover(None).is_empty());
    }

    #[test]
    fn test_vanished_transcript_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("-repo-a").join("s1.jsonl");
        touch(&path);
        assert_eq!(transcript_at(&path).map(|t| t.session_id).as_deref(), Some("s1"));

        fs::remove_file(&path).unwrap();
        assert_eq!(transcript_at(&path), None);
        assert!(SessionStore::with_projects_dir(dir.path()).discover(None).is_empty());
    }

    #[test]
    fn test_encode_project_path() {
        assert_eq!(
            encode_project_path("/home/garrett/Projects/jwst-cosmos"),
            "-home-garrett-Projects-jwst-cosmos"
        );
        assert_eq!(encode_project_path("/srv/my_app.v2"), "-srv-my-app-v2");
    }

    #[test]
    fn test_session_id_from_path() {
        assert_eq!(
            session_id_from_path(Path::new("/x/abc-123.jsonl")).as_deref(),
            Some("abc-123")
        );
        assert_eq!(session_id_from_path(Path::new("/")), None);
    }
}

//! Configuration and credential management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

const APP_DIR: &str = "session-sync";

/// Environment variable overriding the stored site URL.
pub const URL_ENV: &str = "SESSION_SYNC_URL";
/// Environment variable overriding the stored API key.
pub const API_KEY_ENV: &str = "SESSION_SYNC_API_KEY";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Claude-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeConfig {
    /// Path to Claude directory (default: ~/.claude)
    #[serde(default = "default_claude_dir")]
    pub claude_dir: String,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            claude_dir: default_claude_dir(),
        }
    }
}

fn default_claude_dir() -> String {
    dirs::home_dir()
        .map(|h| h.join(".claude").to_string_lossy().to_string())
        .unwrap_or_else(|| "~/.claude".to_string())
}

/// What gets forwarded to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Master switch; hooks exit immediately when false
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Forward PostToolUse events as messages
    #[serde(default = "default_true")]
    pub sync_tool_calls: bool,
    /// Upper bound on forwarded text, tool arguments and tool results
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_tool_calls: true,
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_content_chars() -> usize {
    10_000
}

impl Config {
    /// Load configuration from default location.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            Self::from_file(&config_path.to_string_lossy())
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &str) -> Result<Self> {
        let expanded = expand_path(path);
        let content = fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read config from {}", expanded))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", expanded))?;
        Ok(config)
    }

    /// Directory holding config, credentials and the session ledger.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_DIR)
    }

    /// Get the default config path.
    pub fn default_config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn credentials_path() -> PathBuf {
        Self::config_dir().join("credentials.json")
    }

    pub fn ledger_path() -> PathBuf {
        Self::config_dir().join("sessions.json")
    }

    /// Get the Claude projects directory.
    pub fn claude_projects_dir(&self) -> PathBuf {
        let claude_dir = expand_path(&self.claude.claude_dir);
        PathBuf::from(claude_dir).join("projects")
    }
}

/// Backend location and bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub site_url: String,
    pub api_key: String,
}

impl Credentials {
    /// Build credentials from user input, validating the URL.
    pub fn new(site_url: Option<String>, api_key: Option<String>) -> Result<Self, SyncError> {
        let site_url = site_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(SyncError::MissingField("url"))?;
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(SyncError::MissingField("api-key"))?;

        let site_url = normalize_site_url(&site_url)?;

        Ok(Self {
            site_url,
            api_key: api_key.trim().to_string(),
        })
    }

    /// Resolve credentials from the environment first, then the credentials file.
    pub fn resolve() -> Result<Self, SyncError> {
        let from_env = (std::env::var(URL_ENV).ok(), std::env::var(API_KEY_ENV).ok());
        if let (Some(url), Some(key)) = from_env {
            return Self::new(Some(url), Some(key));
        }
        Self::load_from(&Config::credentials_path())?.ok_or(SyncError::NotLoggedIn)
    }

    /// Read a credentials file. A missing file is `Ok(None)`.
    pub fn load_from(path: &Path) -> Result<Option<Self>, SyncError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let creds: Credentials = serde_json::from_str(&content)?;
        if creds.site_url.is_empty() || creds.api_key.is_empty() {
            return Ok(None);
        }
        Ok(Some(creds))
    }

    /// Write the credentials file, owner-readable only on unix.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize credentials")?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        // mode() only applies on create; tighten a pre-existing file too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", path.display()))?;
        }

        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write credentials to {}", path.display()))?;
        Ok(())
    }

    /// Remove a credentials file. Returns whether one existed.
    pub fn remove_at(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(true)
    }

    /// API key with everything but the last four characters masked.
    pub fn masked_key(&self) -> String {
        let visible: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", visible)
    }
}

/// Validate a site URL and strip any trailing slash.
fn normalize_site_url(raw: &str) -> Result<String, SyncError> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed).map_err(|source| SyncError::InvalidUrl {
        url: trimmed.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SyncError::UnsupportedScheme(trimmed.to_string()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Expand ~ to home directory.
fn expand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults_when_section_missing() {
        let config: Config = toml::from_str("[claude]\nclaude_dir = \"/tmp/claude\"\n").unwrap();
        assert!(config.sync.enabled);
        assert!(config.sync.sync_tool_calls);
        assert_eq!(config.sync.max_content_chars, 10_000);
        assert_eq!(
            config.claude_projects_dir(),
            PathBuf::from("/tmp/claude/projects")
        );
    }

    #[test]
    fn test_credentials_require_both_fields() {
        assert!(matches!(
            Credentials::new(None, Some("key".into())),
            Err(SyncError::MissingField("url"))
        ));
        assert!(matches!(
            Credentials::new(Some("https://example.test".into()), Some("  ".into())),
            Err(SyncError::MissingField("api-key"))
        ));
    }

    #[test]
    fn test_credentials_reject_bad_url() {
        assert!(matches!(
            Credentials::new(Some("not a url".into()), Some("key".into())),
            Err(SyncError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Credentials::new(Some("ftp://example.test".into()), Some("key".into())),
            Err(SyncError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_credentials_strip_trailing_slash() {
        let creds =
            Credentials::new(Some("https://dash.example.test/".into()), Some("sk-123456".into()))
                .unwrap();
        assert_eq!(creds.site_url, "https://dash.example.test");
        assert_eq!(creds.masked_key(), "****3456");
    }

    #[test]
    fn test_credentials_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");
        assert!(Credentials::load_from(&path).unwrap().is_none());

        let creds = Credentials::new(Some("http://localhost:3210".into()), Some("abc".into())).unwrap();
        creds.save_to(&path).unwrap();
        assert_eq!(Credentials::load_from(&path).unwrap(), Some(creds));

        assert!(Credentials::remove_at(&path).unwrap());
        assert!(!Credentials::remove_at(&path).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_credentials_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let creds = Credentials::new(Some("https://dash.example".into()), Some("secret".into())).unwrap();
        creds.save_to(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let fresh = dir.path().join("fresh.json");
        creds.save_to(&fresh).unwrap();
        assert_eq!(fs::metadata(&fresh).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_expand_path_leaves_absolute_paths() {
        assert_eq!(expand_path("/etc/claude"), "/etc/claude");
    }
}

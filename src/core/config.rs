//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.parley/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::conversation::DEFAULT_SYSTEM_PROMPT;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub upload_path: Option<String>,
    pub chat_path: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    pub system_prompt: Option<String>,
    pub system_prompt_file: Option<String>,
    pub token_delay_ms: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "http://localhost:7071/api";
pub const DEFAULT_UPLOAD_PATH: &str = "/upload-file";
pub const DEFAULT_CHAT_PATH: &str = "/chat";
pub const DEFAULT_TOKEN_DELAY_MS: u64 = 30;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub upload_path: String,
    pub chat_path: String,
    pub system_prompt: String,
    /// Pause between applying consecutive streamed tokens.
    pub token_delay: Duration,
}

impl ResolvedConfig {
    pub fn upload_url(&self) -> String {
        join_url(&self.base_url, &self.upload_path)
    }

    pub fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            token_delay: Duration::from_millis(DEFAULT_TOKEN_DELAY_MS),
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.parley`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".parley"))
}

/// Returns the path to `~/.parley/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.parley/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ParleyConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ParleyConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ParleyConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ParleyConfig::default());
    }

    load_config_from(&path)
}

/// Load config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<ParleyConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ParleyConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Parley Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [backend]
# base_url = "http://localhost:7071/api"   # Or set PARLEY_BASE_URL env var
# upload_path = "/upload-file"
# chat_path = "/chat"

# [session]
# system_prompt = "You are a helpful and friendly AI assistant."
# system_prompt_file = "system.md"         # Path relative to ~/.parley/
# token_delay_ms = 30                      # Pause between streamed tokens
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_base_url` is from the CLI flag (None = not specified).
pub fn resolve(config: &ParleyConfig, cli_base_url: Option<&str>) -> ResolvedConfig {
    // Base URL: CLI → env → config → default
    let base_url = cli_base_url
        .map(|s| s.to_string())
        .or_else(|| std::env::var("PARLEY_BASE_URL").ok())
        .or_else(|| config.backend.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    ResolvedConfig {
        base_url,
        upload_path: config
            .backend
            .upload_path
            .clone()
            .unwrap_or_else(|| DEFAULT_UPLOAD_PATH.to_string()),
        chat_path: config
            .backend
            .chat_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAT_PATH.to_string()),
        system_prompt: resolve_system_prompt(config),
        token_delay: Duration::from_millis(
            config
                .session
                .token_delay_ms
                .unwrap_or(DEFAULT_TOKEN_DELAY_MS),
        ),
    }
}

/// Resolves the system prompt: inline wins over file, both win over default.
fn resolve_system_prompt(config: &ParleyConfig) -> String {
    if let Some(ref prompt) = config.session.system_prompt {
        return prompt.clone();
    }

    // Try loading from system_prompt_file (relative to ~/.parley/)
    if let Some(ref file) = config.session.system_prompt_file
        && let Some(dir) = config_dir()
    {
        let prompt_path = dir.join(file);
        match fs::read_to_string(&prompt_path) {
            Ok(contents) => {
                let trimmed = contents.trim().to_string();
                if !trimmed.is_empty() {
                    info!("Loaded system prompt from {}", prompt_path.display());
                    return trimmed;
                }
                warn!("System prompt file is empty: {}", prompt_path.display());
            }
            Err(e) => {
                warn!(
                    "Failed to read system prompt file {}: {}",
                    prompt_path.display(),
                    e
                );
            }
        }
    }

    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = ParleyConfig::default();
        assert!(config.backend.base_url.is_none());
        assert!(config.session.token_delay_ms.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = ParleyConfig::default();
        let resolved = resolve(&config, Some(DEFAULT_BASE_URL));
        assert_eq!(resolved.upload_url(), "http://localhost:7071/api/upload-file");
        assert_eq!(resolved.chat_url(), "http://localhost:7071/api/chat");
        assert_eq!(resolved.token_delay, Duration::from_millis(30));
        assert_eq!(resolved.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = ParleyConfig {
            backend: BackendConfig {
                base_url: Some("http://files.internal:8080/".to_string()),
                upload_path: Some("upload".to_string()),
                chat_path: Some("/v2/chat".to_string()),
            },
            session: SessionConfig {
                system_prompt: Some("Custom prompt.".to_string()),
                system_prompt_file: None,
                token_delay_ms: Some(0),
            },
        };
        let resolved = resolve(&config, Some("http://files.internal:8080/"));
        assert_eq!(resolved.upload_url(), "http://files.internal:8080/upload");
        assert_eq!(resolved.chat_url(), "http://files.internal:8080/v2/chat");
        assert_eq!(resolved.token_delay, Duration::ZERO);
        assert_eq!(resolved.system_prompt, "Custom prompt.");
    }

    #[test]
    fn test_resolve_cli_base_url_wins() {
        let config = ParleyConfig {
            backend: BackendConfig {
                base_url: Some("http://from-config".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve(&config, Some("http://from-cli"));
        assert_eq!(resolved.base_url, "http://from-cli");
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[backend]
base_url = "http://localhost:9000/api"
chat_path = "/chat"

[session]
system_prompt = "Be brief."
token_delay_ms = 10
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.backend.base_url.as_deref(),
            Some("http://localhost:9000/api")
        );
        assert!(config.backend.upload_path.is_none());
        assert_eq!(config.session.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.session.token_delay_ms, Some(10));
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing; everything else stays default
        let toml_str = r#"
[session]
token_delay_ms = 0
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.token_delay_ms, Some(0));
        assert!(config.backend.base_url.is_none());
        assert!(config.session.system_prompt.is_none());
    }

    #[test]
    fn test_inline_system_prompt_wins_over_file() {
        let config = ParleyConfig {
            session: SessionConfig {
                system_prompt: Some("Inline wins.".to_string()),
                system_prompt_file: Some("should-not-load.md".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve(&config, None);
        assert_eq!(resolved.system_prompt, "Inline wins.");
    }

    #[test]
    fn test_load_config_from_reports_parse_errors() {
        let path = std::env::temp_dir().join(format!("parley-config-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[backend\nbase_url = ").unwrap();
        let result = load_config_from(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_config_from_missing_file() {
        let result = load_config_from(Path::new("/definitely/not/here/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

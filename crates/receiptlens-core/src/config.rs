//! Client configuration
//!
//! Layers, later wins:
//! 1. Embedded defaults (`config/client.toml`)
//! 2. Override file (`<data_local_dir>/receiptlens/config/client.toml`, or
//!    an explicit path)
//! 3. Environment (`RECEIPTLENS_API_URL`, `RECEIPTLENS_TOKEN_PATH`)
//! 4. Command-line flags, applied by the caller

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config
const DEFAULT_CONFIG: &str = include_str!("../../../config/client.toml");

pub const ENV_API_URL: &str = "RECEIPTLENS_API_URL";
pub const ENV_TOKEN_PATH: &str = "RECEIPTLENS_TOKEN_PATH";

const FALLBACK_BASE_URL: &str = "https://receipt-lens-backend.onrender.com";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    /// Session token file
    pub token_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: FALLBACK_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
            token_path: default_token_path(),
        }
    }
}

impl ClientConfig {
    /// Defaults, then the default override file, then the environment
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file(default_config_path().as_deref())?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults overlaid with `path` when it exists
    pub fn load_file(path: Option<&Path>) -> Result<Self> {
        let mut config = parse_config(DEFAULT_CONFIG, Self::default())?;
        if let Some(path) = path {
            if path.exists() {
                debug!("Loading config override from {}", path.display());
                let content = fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
                config = parse_config(&content, config)?;
            }
        }
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides from an arbitrary lookup
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.set_api_base_url(&url);
        }
        if let Some(path) = lookup(ENV_TOKEN_PATH).filter(|v| !v.trim().is_empty()) {
            self.token_path = PathBuf::from(path);
        }
    }

    pub fn set_api_base_url(&mut self, url: &str) {
        self.api_base_url = normalize_base_url(url);
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("receiptlens").join("config").join("client.toml"))
}

/// Default session token file
pub fn default_token_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("receiptlens").join("session.json"))
        .unwrap_or_else(|| PathBuf::from(".receiptlens-session.json"))
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    api: Option<RawApi>,
    session: Option<RawSession>,
}

#[derive(Debug, Deserialize)]
struct RawApi {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    upload_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    token_path: Option<PathBuf>,
}

/// Overlay TOML content on `base`; absent keys keep their current value
fn parse_config(content: &str, base: ClientConfig) -> Result<ClientConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = base;

    if let Some(api) = raw.api {
        if let Some(url) = api.base_url {
            if url.trim().is_empty() {
                return Err(Error::Config("api.base_url must not be empty".into()));
            }
            config.set_api_base_url(&url);
        }
        if let Some(secs) = api.timeout_secs {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = api.upload_timeout_secs {
            config.upload_timeout = Duration::from_secs(secs.max(1));
        }
    }

    if let Some(session) = raw.session {
        if let Some(path) = session.token_path {
            config.token_path = path;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_defaults_parse() {
        let config = parse_config(DEFAULT_CONFIG, ClientConfig::default()).unwrap();
        assert_eq!(config.api_base_url, FALLBACK_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.upload_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_partial_override_keeps_other_values() {
        let config = parse_config(
            r#"
            [api]
            base_url = "http://localhost:8000///"
            "#,
            ClientConfig::default(),
        )
        .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = parse_config("[api\nbase_url =", ClientConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = parse_config("[api]\nbase_url = \"  \"", ClientConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_override_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        fs::write(
            &path,
            "[api]\ntimeout_secs = 5\n[session]\ntoken_path = \"/tmp/rl.json\"\n",
        )
        .unwrap();

        let config = ClientConfig::load_file(Some(&path)).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.token_path, PathBuf::from("/tmp/rl.json"));

        // Missing override falls back to defaults
        let config = ClientConfig::load_file(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://10.0.0.2:9000/"),
            (ENV_TOKEN_PATH, "/var/lib/rl/token.json"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_base_url, "http://10.0.0.2:9000");
        assert_eq!(config.token_path, PathBuf::from("/var/lib/rl/token.json"));

        // Blank values are ignored
        let mut config = ClientConfig::default();
        config.apply_env_with(|_| Some("  ".to_string()));
        assert_eq!(config.api_base_url, FALLBACK_BASE_URL);
    }
}

//! Relay configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment overrides (`PORT`). The upstream API key is never stored in
//! the file; it is read from the environment variable named by
//! [`UpstreamConfig::api_key_env`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroizing;

/// Port used when neither the config file nor `PORT` sets one.
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable that overrides the listen port.
pub const PORT_ENV: &str = "PORT";

/// Default chat-completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model identifier sent with every request.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default environment variable holding the upstream API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The API key variable is unset or empty.
    #[error("Please set the {var} environment variable")]
    MissingApiKey {
        /// Name of the variable that was checked.
        var: String,
    },
    /// A port value could not be parsed.
    #[error("Invalid port {value:?}: {reason}")]
    InvalidPort { value: String, reason: String },
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`RelayConfig`].
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Upstream API key, zeroed on drop.
#[derive(Clone)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Zeroizing::new(key.into()))
    }

    /// The raw key, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

/// SECURITY: never print the key.
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Upstream chat-completions settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Full URL of the chat-completions endpoint.
    pub api_url: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable that holds the API key.
    pub api_key_env: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Directory holding `index.html` and other static assets.
    pub static_dir: PathBuf,
    pub upstream: UpstreamConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("./static"),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load from an optional TOML file. `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides. An unset or blank `PORT` keeps the
    /// current port.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(PORT_ENV) {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.port = parse_port(raw)?;
            }
        }
        Ok(self)
    }

    /// Read the upstream API key. Fails if the variable is unset or empty.
    pub fn resolve_api_key<F>(&self, lookup: F) -> Result<ApiKey, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = &self.upstream.api_key_env;
        match lookup(var) {
            Some(key) if !key.trim().is_empty() => Ok(ApiKey::new(key.trim())),
            _ => Err(ConfigError::MissingApiKey { var: var.clone() }),
        }
    }

    /// `host:port` string for binding.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Process environment lookup for [`RelayConfig::apply_env`] and
/// [`RelayConfig::resolve_api_key`].
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.parse::<u16>().map_err(|e| ConfigError::InvalidPort {
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.model, "gpt-4o-mini");
        assert_eq!(
            config.upstream.api_url,
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(config.upstream.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_api_key_is_error() {
        let config = RelayConfig::default();
        let err = config.resolve_api_key(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey { ref var } if var == "OPENAI_API_KEY"));
        assert_eq!(
            err.to_string(),
            "Please set the OPENAI_API_KEY environment variable"
        );
    }

    #[test]
    fn test_empty_api_key_is_error() {
        let config = RelayConfig::default();
        let result = config.resolve_api_key(lookup_from(&[("OPENAI_API_KEY", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey { .. })));
    }

    #[test]
    fn test_api_key_from_custom_env() {
        let mut config = RelayConfig::default();
        config.upstream.api_key_env = "GROQ_API_KEY".to_string();
        let key = config
            .resolve_api_key(lookup_from(&[("GROQ_API_KEY", "gsk-123")]))
            .unwrap();
        assert_eq!(key.expose(), "gsk-123");
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret");
        let debug = format!("{key:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_port_env_override() {
        let config = RelayConfig::default()
            .apply_env(lookup_from(&[("PORT", "3000")]))
            .unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_blank_port_env_keeps_default() {
        let config = RelayConfig::default()
            .apply_env(lookup_from(&[("PORT", "")]))
            .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_port_env() {
        let result = RelayConfig::default().apply_env(lookup_from(&[("PORT", "http")]));
        assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
        let result = RelayConfig::default().apply_env(lookup_from(&[("PORT", "70000")]));
        assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RelayConfig::from_toml_str(
            r#"
port = 9000

[upstream]
model = "gpt-4o"
"#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.upstream.model, "gpt-4o");
        assert_eq!(config.upstream.api_key_env, DEFAULT_API_KEY_ENV);
    }

    #[test]
    fn test_invalid_toml() {
        let result = RelayConfig::from_toml_str("port = \"not a number\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatrelay.toml");
        std::fs::write(&path, "host = \"127.0.0.1\"\nstatic_dir = \"/srv/www\"\n").unwrap();

        let config = RelayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = RelayConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_none_is_default() {
        assert_eq!(RelayConfig::load(None).unwrap(), RelayConfig::default());
    }
}

//! Server configuration for the enrollment client.
//!
//! Read once, before the client is built, and never modified afterwards.
//! The on-disk form is a JSON object; see `ServerConfig` for the fields.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: server host is empty")]
    EmptyHost,
}

/// Scheme used to reach the enrollment server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    /// URL prefix for this protocol, e.g. `https://`.
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http://",
            Protocol::Https => "https://",
        }
    }
}

/// Proxy selection for HTTP(S) requests.
///
/// An absent `https_proxy` key and an explicit `null` are different:
/// the first leaves the transport default in place (which honours the
/// usual proxy environment variables), the second turns proxying off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxySetting {
    #[default]
    Unset,
    Disabled,
    Endpoint(String),
}

impl ProxySetting {
    /// Build an endpoint setting; a bare `host:port` is taken as an HTTP proxy.
    pub fn endpoint(value: &str) -> Self {
        if value.contains("://") {
            ProxySetting::Endpoint(value.to_string())
        } else {
            ProxySetting::Endpoint(format!("http://{value}"))
        }
    }
}

fn deserialize_proxy<'de, D>(deserializer: D) -> Result<ProxySetting, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<String>::deserialize(deserializer)? {
        None => ProxySetting::Disabled,
        Some(value) => ProxySetting::endpoint(&value),
    })
}

/// Everything the client needs to reach and log into the server.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// `host` or `host:port`, without scheme.
    pub host: String,

    #[serde(default)]
    pub protocol: Protocol,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default, deserialize_with = "deserialize_proxy")]
    pub https_proxy: ProxySetting,

    #[serde(default)]
    pub disable_peer_verification: bool,

    #[serde(default)]
    pub disable_host_verification: bool,

    /// PEM bundle of trusted CA certificates.
    #[serde(default)]
    pub ca_info: Option<PathBuf>,

    pub username: String,

    pub password: String,
}

impl ServerConfig {
    /// A configuration with defaults for everything but the essentials.
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            protocol: Protocol::default(),
            user_agent: None,
            https_proxy: ProxySetting::Unset,
            disable_peer_verification: false,
            disable_host_verification: false,
            ca_info: None,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        Ok(())
    }

    /// Base URL of the server, e.g. `https://enroll.example.com:8443`.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.protocol.scheme(), self.host)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("protocol", &self.protocol)
            .field("user_agent", &self.user_agent)
            .field("https_proxy", &self.https_proxy)
            .field("disable_peer_verification", &self.disable_peer_verification)
            .field("disable_host_verification", &self.disable_host_verification)
            .field("ca_info", &self.ca_info)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{"host":"enroll.example.com","username":"alice","password":"s3cret"}"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ServerConfig::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.host, "enroll.example.com");
        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.https_proxy, ProxySetting::Unset);
        assert_eq!(config.user_agent, None);
        assert!(!config.disable_peer_verification);
        assert!(!config.disable_host_verification);
        assert_eq!(config.ca_info, None);
        assert_eq!(config.base_url(), "https://enroll.example.com");
    }

    #[test]
    fn proxy_null_disables_proxy() {
        let config = ServerConfig::from_json_str(
            r#"{"host":"h","username":"u","password":"p","https_proxy":null}"#,
        )
        .unwrap();
        assert_eq!(config.https_proxy, ProxySetting::Disabled);
    }

    #[test]
    fn proxy_endpoint_gets_a_scheme() {
        let config = ServerConfig::from_json_str(
            r#"{"host":"h","username":"u","password":"p","https_proxy":"proxy.local:3128"}"#,
        )
        .unwrap();
        assert_eq!(
            config.https_proxy,
            ProxySetting::Endpoint("http://proxy.local:3128".to_string())
        );

        assert_eq!(
            ProxySetting::endpoint("socks5://proxy.local:1080"),
            ProxySetting::Endpoint("socks5://proxy.local:1080".to_string())
        );
    }

    #[test]
    fn full_config_parses() {
        let config = ServerConfig::from_json_str(
            r#"{
                "host": "127.0.0.1:8080",
                "protocol": "http",
                "user_agent": "enroll/0.1",
                "disable_peer_verification": true,
                "disable_host_verification": true,
                "ca_info": "/etc/ssl/ca.pem",
                "username": "bob",
                "password": "pw"
            }"#,
        )
        .unwrap();
        assert_eq!(config.protocol, Protocol::Http);
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
        assert_eq!(config.user_agent.as_deref(), Some("enroll/0.1"));
        assert_eq!(config.ca_info, Some(PathBuf::from("/etc/ssl/ca.pem")));
        assert!(config.disable_peer_verification);
    }

    #[test]
    fn rejects_unknown_protocol() {
        let err = ServerConfig::from_json_str(
            r#"{"host":"h","username":"u","password":"p","protocol":"ftp"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_empty_host() {
        let err =
            ServerConfig::from_json_str(r#"{"host":" ","username":"u","password":"p"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyHost));
    }

    #[test]
    fn rejects_missing_credentials() {
        let err = ServerConfig::from_json_str(r#"{"host":"h","username":"u"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ServerConfig::from_json_file("/nonexistent/enroll.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn debug_redacts_password() {
        let config = ServerConfig::new("h", "alice", "hunter2");
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("alice"));
    }
}

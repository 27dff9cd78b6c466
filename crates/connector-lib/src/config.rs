//! Connector configuration

use crate::error::{ConnectorError, ConnectorResult};
use crate::rpc::{ClientConfig, Credentials, RetryPolicy};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Service path appended to the base URL when none is configured
pub const DEFAULT_WSDL_PATH: &str = "dotnet/admin/webservices/v2/webstore/service.asmx?wsdl";

/// Connector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Local node the connector represents
    #[serde(default = "default_node_id")]
    pub node_id: u32,

    /// Base URL of the Retail Express installation
    #[serde(default)]
    pub url: String,

    /// Service path suffix
    #[serde(default)]
    pub wsdl: Option<String>,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Network timeout for a single call attempt in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Fault message fragments that mark an expired session
    #[serde(default = "default_expiry_phrases", deserialize_with = "phrase_list")]
    pub expiry_phrases: Vec<String>,

    /// Remote operation used for delete actions, unset disables deletes
    #[serde(default)]
    pub delete_operation: Option<String>,

    /// Let transport errors escape `write_updates` instead of logging them
    #[serde(default)]
    pub propagate_transport_errors: bool,
}

fn default_node_id() -> u32 {
    1
}

fn default_request_timeout() -> u64 {
    30
}

fn default_expiry_phrases() -> Vec<String> {
    RetryPolicy::default().expiry_phrases
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Phrases {
    List(Vec<String>),
    Joined(String),
}

/// A list, or one comma separated string as set through the environment
fn phrase_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Phrases::deserialize(deserializer)? {
        Phrases::List(phrases) => phrases,
        Phrases::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|phrase| !phrase.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            url: String::new(),
            wsdl: None,
            client_id: String::new(),
            username: String::new(),
            password: String::new(),
            request_timeout_secs: default_request_timeout(),
            expiry_phrases: default_expiry_phrases(),
            delete_operation: None,
            propagate_transport_errors: false,
        }
    }
}

impl ConnectorConfig {
    /// Load configuration from an optional file, then `REX_*` environment variables
    pub fn load(path: Option<&Path>) -> ConnectorResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConnectorError::Configuration(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        // values stay strings so credentials like "0123" are kept verbatim
        let config = builder
            .add_source(config::Environment::with_prefix("REX"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Full service endpoint used for SOAP posts
    ///
    /// Returns `None` when no base URL is configured.
    pub fn endpoint(&self) -> Option<String> {
        let base = self.url.trim().trim_end_matches('/');
        if base.is_empty() {
            return None;
        }

        let suffix = self
            .wsdl
            .as_deref()
            .map(|s| s.trim().trim_start_matches('/'))
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_WSDL_PATH);

        let suffix = match suffix.split_once('?') {
            Some((path, query)) if query.eq_ignore_ascii_case("wsdl") => path,
            _ => suffix,
        };

        Some(format!("{}/{}", base, suffix))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.trim().to_string(),
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        }
    }

    /// Build the RPC client configuration
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint(),
            credentials: self.credentials(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry_policy: RetryPolicy::new(self.expiry_phrases.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Tests reading `REX_*` variables must not overlap
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 5] = [
        "REX_CLIENT_ID",
        "REX_USERNAME",
        "REX_PASSWORD",
        "REX_EXPIRY_PHRASES",
        "REX_NODE_ID",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_endpoint_uses_default_path() {
        let config = ConnectorConfig {
            url: " https://shop.retailexpress.com.au/ ".into(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint().as_deref(),
            Some("https://shop.retailexpress.com.au/dotnet/admin/webservices/v2/webstore/service.asmx")
        );
    }

    #[test]
    fn test_endpoint_with_custom_path() {
        let config = ConnectorConfig {
            url: "https://shop.example.com".into(),
            wsdl: Some("/custom/service.asmx".into()),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint().as_deref(),
            Some("https://shop.example.com/custom/service.asmx")
        );
    }

    #[test]
    fn test_endpoint_missing_url() {
        let config = ConnectorConfig::default();
        assert!(config.endpoint().is_none());
        assert!(config.client_config().endpoint.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::default();
        assert_eq!(config.node_id, 1);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(
            config.expiry_phrases,
            vec!["session expired".to_string(), "try to relogin".to_string()]
        );
        assert!(!config.propagate_transport_errors);
    }

    #[test]
    fn test_load_from_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("connector.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
node_id = 7
url = "https://shop.example.com"
client_id = "c-1"
username = "user"
password = "secret"
expiry_phrases = ["session expired", "token invalid"]
delete_operation = "CustomerDelete"
"#
        )
        .unwrap();

        let config = ConnectorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.node_id, 7);
        assert_eq!(config.client_id, "c-1");
        assert_eq!(config.expiry_phrases.len(), 2);
        assert_eq!(config.delete_operation.as_deref(), Some("CustomerDelete"));

        let client = config.client_config();
        assert_eq!(client.credentials.username, "user");
        assert_eq!(client.request_timeout, Duration::from_secs(30));
        assert!(client.retry_policy.is_expiry("Token INVALID for user"));
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let result = ConnectorConfig::load(Some(Path::new("/nonexistent/rex.toml")));
        assert!(matches!(result, Err(ConnectorError::Configuration(_))));
    }

    #[test]
    fn test_load_from_environment_keeps_strings_verbatim() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("REX_CLIENT_ID", "007");
        std::env::set_var("REX_USERNAME", "TRUE");
        std::env::set_var("REX_PASSWORD", "0123");
        std::env::set_var("REX_EXPIRY_PHRASES", "Session expired, token invalid");
        std::env::set_var("REX_NODE_ID", "4");

        let loaded = ConnectorConfig::load(None);
        clear_env();
        let config = loaded.unwrap();

        assert_eq!(config.client_id, "007");
        assert_eq!(config.username, "TRUE");
        assert_eq!(config.password, "0123");
        assert_eq!(config.node_id, 4);
        assert_eq!(
            config.expiry_phrases,
            vec!["Session expired".to_string(), "token invalid".to_string()]
        );
        assert_eq!(config.credentials().password, "0123");
        assert!(config.client_config().retry_policy.is_expiry("TOKEN INVALID"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("connector.toml");
        std::fs::write(&path, "password = \"from-file\"\nexpiry_phrases = [\"a\"]\n").unwrap();
        std::env::set_var("REX_PASSWORD", "000");

        let loaded = ConnectorConfig::load(Some(&path));
        clear_env();
        let config = loaded.unwrap();

        assert_eq!(config.password, "000");
        assert_eq!(config.expiry_phrases, vec!["a".to_string()]);
    }
}

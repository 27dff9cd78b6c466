//! Transport abstraction between the session client and the wire

use super::normalize::RemoteValue;
use crate::error::{ConnectorResult, Fault};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Credential triple sent out-of-band with every call
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub client_id: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// True when all three fields are present
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }

    /// Log-safe view with the password masked
    pub fn redacted(&self) -> Value {
        json!({
            "clientId": self.client_id,
            "username": self.username,
            "password": if self.password.is_empty() { "" } else { "******" },
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

/// An authenticated channel to the remote system
///
/// Implementations attach the credentials to every request. A transport is
/// used by exactly one client, so calls take `&mut self`.
#[async_trait]
pub trait Transport: Send {
    /// Send one physical call and return the raw, not yet normalized, response
    async fn send(&mut self, operation: &str, payload: &Value) -> Result<RemoteValue, Fault>;

    /// Raw text of the last request sent, if any
    fn last_request(&self) -> Option<String>;

    /// Raw text of the last response received, if any
    fn last_response(&self) -> Option<String>;
}

/// Builds transports bound to an endpoint and a credential set
pub trait TransportFactory: Send + Sync {
    fn connect(
        &self,
        endpoint: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> ConnectorResult<Box<dyn Transport>>;
}

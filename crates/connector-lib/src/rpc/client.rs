//! Session RPC client for the Retail Express web store service
//!
//! This module provides a client that:
//! - Owns exactly one authenticated transport per connector instance
//! - Retries a call once, after a fresh login, when the session expired
//! - Normalizes every response into a plain JSON tree

use super::normalize::normalize;
use super::soap::SoapConnector;
use super::transport::{Credentials, Transport, TransportFactory};
use crate::error::{ConnectorError, ConnectorResult, Fault};
use crate::observability::{ConnectorMetrics, EventLevel, EventSink};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const INIT_LOG_CODE: &str = "rex_isoap";

/// Decides which faults mark an expired session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Lowercase fragments matched against the fault message
    pub expiry_phrases: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            expiry_phrases: vec!["session expired".to_string(), "try to relogin".to_string()],
        }
    }
}

impl RetryPolicy {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            expiry_phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Case-insensitive substring match of the fault message
    pub fn is_expiry(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.expiry_phrases
            .iter()
            .any(|phrase| message.contains(phrase.as_str()))
    }
}

/// Configuration for the session client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full service URL; `None` when the connector has no target configured
    pub endpoint: Option<String>,
    pub credentials: Credentials,
    /// Network timeout of a single call attempt
    pub request_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            credentials: Credentials::default(),
            request_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Lifecycle of the client's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Authenticated,
    /// Re-authentication failed during a retry; the client is unusable
    Faulted,
}

/// RPC client holding one authenticated session
pub struct SessionClient {
    config: ClientConfig,
    factory: Box<dyn TransportFactory>,
    events: Arc<dyn EventSink>,
    metrics: ConnectorMetrics,
    transport: Option<Box<dyn Transport>>,
    state: SessionState,
    last_request: Option<String>,
    last_response: Option<String>,
}

impl SessionClient {
    pub fn new(
        config: ClientConfig,
        factory: Box<dyn TransportFactory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            factory,
            events,
            metrics: ConnectorMetrics::new(),
            transport: None,
            state: SessionState::Uninitialized,
            last_request: None,
            last_response: None,
        }
    }

    /// Client talking SOAP over HTTP
    pub fn soap(config: ClientConfig, events: Arc<dyn EventSink>) -> Self {
        Self::new(config, Box::new(SoapConnector), events)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.config.endpoint.as_deref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry_policy
    }

    /// Establish the session
    ///
    /// Returns `Ok(false)` when a credential is missing; the failure is
    /// logged, not raised. Errors on a second initialization or when no
    /// endpoint is configured.
    pub fn init(&mut self) -> ConnectorResult<bool> {
        let endpoint = match self.config.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.to_string(),
            _ => {
                return Err(ConnectorError::Configuration(
                    "Retail Express service URL is not configured".to_string(),
                ))
            }
        };
        if self.transport.is_some() {
            return Err(ConnectorError::Configuration(
                "tried to initialize the SOAP session twice".to_string(),
            ));
        }
        if self.state == SessionState::Faulted {
            return Err(ConnectorError::Authentication(
                "session is faulted, construct a new client".to_string(),
            ));
        }

        let context = json!({
            "endpoint": endpoint,
            "soap header": self.config.credentials.redacted(),
        });

        if !self.config.credentials.is_complete() {
            self.events.log(
                EventLevel::Error,
                &format!("{}_fail", INIT_LOG_CODE),
                "SOAP initialisation failed: Please check client id, username and password.",
                context,
            );
            return Ok(false);
        }

        let transport = match self.factory.connect(
            &endpoint,
            &self.config.credentials,
            self.config.request_timeout,
        ) {
            Ok(transport) => transport,
            Err(e) => {
                self.events.log(
                    EventLevel::Error,
                    &format!("{}_fail", INIT_LOG_CODE),
                    &format!("SOAP initialisation failed: {}", e),
                    context,
                );
                return Err(e);
            }
        };

        self.transport = Some(transport);
        self.state = SessionState::Authenticated;
        self.metrics.inc_session_inits();
        self.events.log(
            EventLevel::Info,
            INIT_LOG_CODE,
            "SOAP was successfully initialised.",
            context,
        );
        info!(endpoint = %endpoint, "Retail Express session established");

        Ok(true)
    }

    fn discard_session(&mut self) {
        self.transport = None;
        if self.state == SessionState::Authenticated {
            self.state = SessionState::Uninitialized;
        }
    }

    fn ensure_session(&mut self) -> ConnectorResult<()> {
        match self.state {
            SessionState::Authenticated if self.transport.is_some() => Ok(()),
            SessionState::Faulted => Err(ConnectorError::Authentication(
                "session is faulted, construct a new client".to_string(),
            )),
            _ => {
                if self.init()? {
                    Ok(())
                } else {
                    Err(ConnectorError::Authentication(
                        "missing client id, username or password".to_string(),
                    ))
                }
            }
        }
    }

    /// Shape the payload the way the wire expects it
    ///
    /// Structs flatten into field maps; scalars become a one-element sequence.
    fn prepare_payload<T: Serialize + ?Sized>(data: &T) -> ConnectorResult<Value> {
        let value = serde_json::to_value(data)?;
        Ok(match value {
            Value::Object(_) | Value::Array(_) => value,
            scalar => Value::Array(vec![scalar]),
        })
    }

    /// One physical call attempt, logged at debug-verbose level
    async fn attempt(&mut self, operation: &str, payload: &Value) -> Result<Value, Fault> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Fault::new("Client", "no active session"))?;

        let started = Instant::now();
        let outcome = transport.send(operation, payload).await;
        self.last_request = transport.last_request();
        self.last_response = transport.last_response();
        self.metrics.observe_attempt(started.elapsed().as_secs_f64());

        match outcome {
            Ok(raw) => {
                let result = normalize(raw);
                self.events.log(
                    EventLevel::DebugExtra,
                    "rex_soap_call",
                    &format!("Successful SOAP call {}.", operation),
                    json!({"data": payload, "result": result}),
                );
                Ok(result)
            }
            Err(fault) => {
                self.events.log(
                    EventLevel::DebugExtra,
                    "rex_soap_call_fault",
                    &format!("SOAP Fault with call {}: {}", operation, fault.message),
                    json!({"data": payload, "code": fault.code}),
                );
                Err(fault)
            }
        }
    }

    /// Call a remote operation
    ///
    /// Authenticates on first use. A fault matching the retry policy triggers
    /// exactly one re-authentication and resend; any other fault, or a second
    /// failure, is returned as [`ConnectorError::Transport`].
    pub async fn call<T: Serialize + ?Sized>(
        &mut self,
        operation: &str,
        data: &T,
    ) -> ConnectorResult<Value> {
        if operation.trim().is_empty() {
            return Err(ConnectorError::Configuration(
                "remote operation name must not be empty".to_string(),
            ));
        }

        let payload = Self::prepare_payload(data)?;
        self.ensure_session()?;
        self.metrics.inc_calls();

        let mut retried = false;
        let outcome = loop {
            match self.attempt(operation, &payload).await {
                Ok(result) => break Ok(result),
                Err(fault) if !retried && self.config.retry_policy.is_expiry(&fault.message) => {
                    retried = true;
                    self.metrics.inc_session_retries();
                    warn!(
                        operation = %operation,
                        fault = %fault.message,
                        "Session expired, logging in again"
                    );
                    self.events.log(
                        EventLevel::Debug,
                        "rex_soap_retry",
                        &format!("Session expired on {}, re-authenticating.", operation),
                        json!({"code": fault.code, "message": fault.message}),
                    );

                    self.discard_session();
                    match self.init() {
                        Ok(true) => continue,
                        Ok(false) | Err(_) => {
                            self.state = SessionState::Faulted;
                            break Err(fault);
                        }
                    }
                }
                Err(fault) => break Err(fault),
            }
        };

        match outcome {
            Ok(result) => {
                self.events.log(
                    EventLevel::Debug,
                    "rex_soap_success",
                    &format!("Successfully soap call: {}", operation),
                    json!({"call": operation, "data": payload, "result": result}),
                );
                debug!(operation = %operation, retried = retried, "Remote call succeeded");
                Ok(result)
            }
            Err(fault) => {
                self.metrics.inc_call_faults();
                let last_request = self.last_request.clone();
                let last_response = self.last_response.clone();

                self.events.log(
                    EventLevel::Error,
                    "rex_soap_fault",
                    &format!("SOAP Fault with call {}: {}", operation, fault.message),
                    json!({
                        "data": payload,
                        "code": fault.code,
                        "trace": fault.detail,
                        "request": last_request,
                        "response": last_response,
                    }),
                );

                Err(ConnectorError::Transport {
                    operation: operation.to_string(),
                    fault,
                    last_request,
                    last_response,
                })
            }
        }
    }
}

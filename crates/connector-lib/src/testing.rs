//! Scripted transports for exercising the session client and gateways

use crate::error::{ConnectorError, ConnectorResult, Fault};
use crate::observability::RecordingSink;
use crate::rpc::{
    ClientConfig, Credentials, RemoteValue, SessionClient, Transport, TransportFactory,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Script {
    responses: VecDeque<Result<RemoteValue, Fault>>,
    sent: Vec<(String, Value)>,
    connects: usize,
    /// Connects allowed before the factory starts failing
    connect_budget: Option<usize>,
}

/// Factory whose transports replay a shared script of responses
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, response: Result<RemoteValue, Fault>) -> &Self {
        self.script.lock().unwrap().responses.push_back(response);
        self
    }

    pub fn respond_ok(&self, value: impl Into<RemoteValue>) -> &Self {
        self.respond(Ok(value.into()))
    }

    pub fn respond_fault(&self, message: &str) -> &Self {
        self.respond(Err(Fault::new("soap:Receiver", message)))
    }

    pub fn fail_connects_after(&self, connects: usize) {
        self.script.lock().unwrap().connect_budget = Some(connects);
    }

    pub fn connects(&self) -> usize {
        self.script.lock().unwrap().connects
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn send_count(&self) -> usize {
        self.script.lock().unwrap().sent.len()
    }
}

impl TransportFactory for ScriptedConnector {
    fn connect(
        &self,
        _endpoint: &str,
        _credentials: &Credentials,
        _timeout: Duration,
    ) -> ConnectorResult<Box<dyn Transport>> {
        let mut script = self.script.lock().unwrap();
        if let Some(budget) = script.connect_budget {
            if script.connects >= budget {
                return Err(ConnectorError::Authentication("login rejected".into()));
            }
        }
        script.connects += 1;
        Ok(Box::new(ScriptedTransport {
            script: self.script.clone(),
            last_request: None,
        }))
    }
}

struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    last_request: Option<String>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, operation: &str, payload: &Value) -> Result<RemoteValue, Fault> {
        let mut script = self.script.lock().unwrap();
        script.sent.push((operation.to_string(), payload.clone()));
        self.last_request = Some(format!("{} {}", operation, payload));
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(Fault::new("Client", "no scripted response")))
    }

    fn last_request(&self) -> Option<String> {
        self.last_request.clone()
    }

    fn last_response(&self) -> Option<String> {
        Some("<scripted/>".to_string())
    }
}

pub fn client_config() -> ClientConfig {
    ClientConfig {
        endpoint: Some("https://rex.test/service.asmx".to_string()),
        credentials: Credentials::new("client", "user", "secret"),
        ..Default::default()
    }
}

pub fn scripted_client(
    config: ClientConfig,
) -> (SessionClient, ScriptedConnector, Arc<RecordingSink>) {
    let connector = ScriptedConnector::new();
    let sink = Arc::new(RecordingSink::new());
    let client = SessionClient::new(config, Box::new(connector.clone()), sink.clone());
    (client, connector, sink)
}

//! SOAP over HTTP transport for the Retail Express web store service

use super::normalize::RemoteValue;
use super::transport::{Credentials, Transport, TransportFactory};
use super::xml::{build_envelope, parse_response, SERVICE_NAMESPACE};
use crate::error::{ConnectorError, ConnectorResult, Fault};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Transport posting SOAP 1.2 envelopes to a single service URL
pub struct SoapTransport {
    client: Client,
    endpoint: Url,
    credentials: Credentials,
    last_request: Option<String>,
    last_response: Option<String>,
}

impl SoapTransport {
    pub fn new(
        endpoint: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> ConnectorResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ConnectorError::Configuration(format!("invalid service URL {}: {}", endpoint, e))
        })?;

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ConnectorError::Configuration(format!("failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint,
            credentials,
            last_request: None,
            last_response: None,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for SoapTransport {
    async fn send(&mut self, operation: &str, payload: &Value) -> Result<RemoteValue, Fault> {
        let envelope = build_envelope(operation, &self.credentials, payload)?;
        self.last_request = Some(envelope.clone());
        self.last_response = None;

        let content_type = format!(
            "application/soap+xml; charset=utf-8; action=\"{}{}\"",
            SERVICE_NAMESPACE, operation
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(envelope)
            .send()
            .await
            .map_err(|e| Fault::new("HTTP", format!("failed to send request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Fault::new("HTTP", format!("failed to read response: {}", e)))?;
        self.last_response = Some(body.clone());

        debug!(
            operation = %operation,
            status = status.as_u16(),
            bytes = body.len(),
            "SOAP response received"
        );

        match parse_response(&body, operation) {
            Ok(result) if status.is_success() => Ok(result),
            Ok(_) => Err(Fault::new("HTTP", format!("HTTP {}", status))),
            // A SOAP fault body wins over the bare HTTP status
            Err(fault) if fault.code != "Client" || status.is_success() => Err(fault),
            Err(fault) => {
                Err(Fault::new("HTTP", format!("HTTP {}", status)).with_detail(fault.message))
            }
        }
    }

    fn last_request(&self) -> Option<String> {
        self.last_request.clone()
    }

    fn last_response(&self) -> Option<String> {
        self.last_response.clone()
    }
}

/// Factory producing [`SoapTransport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct SoapConnector;

impl TransportFactory for SoapConnector {
    fn connect(
        &self,
        endpoint: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> ConnectorResult<Box<dyn Transport>> {
        Ok(Box::new(SoapTransport::new(
            endpoint,
            credentials.clone(),
            timeout,
        )?))
    }
}

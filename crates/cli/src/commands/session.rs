//! Session-level commands: connectivity check and raw remote calls

use anyhow::{bail, Context, Result};
use colored::Colorize;
use connector_lib::{ConnectorConfig, EventSink, SessionClient};
use serde_json::Value;
use std::sync::Arc;

use crate::output::{mask_secret, print_success, OutputFormat};

/// Initialize a session and report the target
pub async fn check(
    config: &ConnectorConfig,
    events: Arc<dyn EventSink>,
    format: OutputFormat,
) -> Result<()> {
    let mut client = SessionClient::soap(config.client_config(), events);
    let endpoint = client.endpoint().unwrap_or_default().to_string();

    if !client.init().context("Session initialisation failed")? {
        bail!("Session initialisation failed: check client id, username and password");
    }

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "endpoint": endpoint,
                "node": config.node_id,
                "client_id": config.client_id,
                "username": config.username,
                "authenticated": client.is_authenticated(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            print_success("Session initialised");
            println!("Endpoint:   {}", endpoint.cyan());
            println!("Node:       {}", config.node_id);
            println!("Client id:  {}", config.client_id);
            println!("Username:   {}", config.username);
            println!("Password:   {}", mask_secret(&config.password));
        }
    }

    Ok(())
}

/// Call a remote operation and print the normalized result
pub async fn call(
    config: &ConnectorConfig,
    events: Arc<dyn EventSink>,
    operation: &str,
    data: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let payload: Value = match data {
        Some(raw) => serde_json::from_str(raw).context("--data is not valid JSON")?,
        None => Value::Object(Default::default()),
    };

    let mut client = SessionClient::soap(config.client_config(), events);
    let result = client
        .call(operation, &payload)
        .await
        .with_context(|| format!("Remote call {} failed", operation))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
        OutputFormat::Table => {
            println!("{} {}", "Result of".bold(), operation.cyan());
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

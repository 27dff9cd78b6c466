//! Customer gateway
//!
//! Pushes customers (and, through their parent, addresses) with the
//! `CustomerCreateUpdate` call. The remote linkage decides between create
//! and update; a successful create links the returned customer id.

use super::password::random_password;
use super::payload::{
    apply_identity, build_customer_fields, customer_envelope, interpret_response,
    relevant_attributes, CUSTOMER_CALL, PASSWORD_FIELD,
};
use super::{Action, ActionKind, Gateway};
use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::observability::{ConnectorMetrics, EventLevel, EventSink};
use crate::rpc::SessionClient;
use crate::store::{EntityStore, NodeId, SyncEntity};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const SUPPORTED_TYPES: [&str; 2] = ["customer", "address"];

/// Behaviour switches of a gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Return transport errors to the caller instead of reporting `false`
    pub propagate_transport_errors: bool,
    /// Remote operation deleting a customer by email
    pub delete_operation: Option<String>,
}

impl From<&ConnectorConfig> for GatewayOptions {
    fn from(config: &ConnectorConfig) -> Self {
        Self {
            propagate_transport_errors: config.propagate_transport_errors,
            delete_operation: config
                .delete_operation
                .clone()
                .filter(|op| !op.trim().is_empty()),
        }
    }
}

/// Gateway for customers and their addresses
pub struct CustomerGateway {
    client: SessionClient,
    store: Arc<dyn EntityStore>,
    node: NodeId,
    events: Arc<dyn EventSink>,
    metrics: ConnectorMetrics,
    options: GatewayOptions,
    entity_type: Option<String>,
}

/// Copy of the payload safe to put into the event log
fn masked(fields: &Map<String, Value>) -> Value {
    let mut fields = fields.clone();
    if let Some(password) = fields.get_mut(PASSWORD_FIELD) {
        *password = json!("******");
    }
    Value::Object(fields)
}

impl CustomerGateway {
    pub fn new(
        client: SessionClient,
        store: Arc<dyn EntityStore>,
        node: NodeId,
        events: Arc<dyn EventSink>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            client,
            store,
            node,
            events,
            metrics: ConnectorMetrics::new(),
            options,
            entity_type: None,
        }
    }

    /// Gateway talking SOAP to the configured service
    pub fn from_config(
        config: &ConnectorConfig,
        store: Arc<dyn EntityStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let client = SessionClient::soap(config.client_config(), events.clone());
        Self::new(client, store, config.node_id, events, GatewayOptions::from(config))
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    pub fn client_mut(&mut self) -> &mut SessionClient {
        &mut self.client
    }

    fn fail(&self, code: &str, message: String, context: Value) -> ConnectorResult<bool> {
        self.metrics.inc_push_failures();
        warn!(event = %code, "{}", message);
        self.events.log(EventLevel::Error, code, &message, context);
        Ok(false)
    }

    async fn push_customer(
        &mut self,
        customer: &SyncEntity,
        changed: &[String],
    ) -> ConnectorResult<bool> {
        let attributes = relevant_attributes(changed);
        let billing = self.store.resolve(customer, "billing_address", "address");
        let shipping = self.store.resolve(customer, "shipping_address", "address");

        let draft =
            build_customer_fields(customer, &attributes, billing.as_ref(), shipping.as_ref());
        for attribute in &draft.unrecognized {
            self.events.log(
                EventLevel::DebugExtra,
                "rex_cu_wr_attr",
                &format!("Attribute {} is not sent to Retail Express.", attribute),
                json!({"entity": customer.id, "attribute": attribute}),
            );
        }

        let remote_id = match self.store.local_id(self.node, customer) {
            Ok(remote_id) => remote_id,
            Err(e) => {
                return self.fail(
                    "rex_cu_wr_err",
                    format!("Linkage lookup failed for customer {}: {}", customer.unique_id, e),
                    json!({"entity": customer.id, "data": masked(&draft.fields)}),
                )
            }
        };
        let is_create = remote_id.is_none();

        let mut fields = draft.fields;
        apply_identity(&mut fields, remote_id.as_deref(), random_password(&mut rand::thread_rng()));
        let log_data = masked(&fields);

        debug!(
            customer = %customer.unique_id,
            create = is_create,
            "Pushing customer to Retail Express"
        );

        let response = match self.client.call(CUSTOMER_CALL, &customer_envelope(fields)).await {
            Ok(response) => response,
            Err(e) if e.is_transport() && self.options.propagate_transport_errors => {
                self.metrics.inc_push_failures();
                return Err(e);
            }
            Err(e) => {
                return self.fail(
                    "rex_cu_wr_err",
                    format!("Error on {}: {}", CUSTOMER_CALL, e),
                    json!({"data": log_data, "error": e.to_string()}),
                )
            }
        };

        let outcome = match interpret_response(&response) {
            Ok(outcome) => outcome,
            Err(e) => {
                return self.fail(
                    "rex_cu_wr_err",
                    e.to_string(),
                    json!({"data": log_data, "response": response}),
                )
            }
        };

        if !outcome.success {
            return self.fail(
                "rex_cu_wr_err",
                format!(
                    "{} reported {} for {}",
                    CUSTOMER_CALL,
                    outcome.status.as_deref().unwrap_or("no result"),
                    customer.unique_id
                ),
                json!({"data": log_data, "response": response}),
            );
        }

        if is_create {
            let Some(new_id) = outcome.remote_id.as_deref() else {
                return self.fail(
                    "rex_cu_wr_locerr",
                    format!(
                        "Customer {} was created but no CustomerId was returned",
                        customer.unique_id
                    ),
                    json!({"data": log_data, "response": response}),
                );
            };
            if let Err(e) = self.store.link_entity(self.node, customer, new_id) {
                return self.fail(
                    "rex_cu_wr_err",
                    format!("Linking customer {} to {} failed: {}", customer.unique_id, new_id, e),
                    json!({"entity": customer.id, "remote_id": new_id, "data": log_data}),
                );
            }
            self.metrics.inc_links_created();
        }

        self.events.log(
            EventLevel::Debug,
            "rex_cu_wr_ok",
            &format!(
                "Customer {} {} in Retail Express.",
                customer.unique_id,
                if is_create { "created" } else { "updated" }
            ),
            json!({
                "entity": customer.id,
                "remote_id": outcome.remote_id.or(remote_id),
                "create": is_create,
            }),
        );
        Ok(true)
    }
}

#[async_trait]
impl Gateway for CustomerGateway {
    async fn init(&mut self, entity_type: &str) -> ConnectorResult<bool> {
        if !SUPPORTED_TYPES.contains(&entity_type) {
            return Err(ConnectorError::Configuration(format!(
                "Invalid entity type {} for this gateway",
                entity_type
            )));
        }
        self.entity_type = Some(entity_type.to_string());
        self.events.log(
            EventLevel::Debug,
            "rex_cu_init",
            "Customer gateway initialised.",
            json!({"node": self.node, "type": entity_type}),
        );
        Ok(true)
    }

    async fn retrieve_entities(&mut self) -> ConnectorResult<usize> {
        self.events.log(
            EventLevel::Info,
            "rex_cu_re_no",
            "Customers are not retrieved from Retail Express.",
            json!({"node": self.node}),
        );
        Ok(0)
    }

    async fn write_updates(
        &mut self,
        entity: &SyncEntity,
        attributes: &[String],
    ) -> ConnectorResult<bool> {
        self.metrics.inc_pushes();

        if entity.entity_type == "address" {
            let Some(parent) = self.store.parent(entity) else {
                return self.fail(
                    "rex_cu_wr_adderr",
                    format!("Address {} has no parent customer", entity.unique_id),
                    json!({"entity": entity.id, "unique_id": entity.unique_id}),
                );
            };
            return self.push_customer(&parent, &[]).await;
        }

        self.push_customer(entity, attributes).await
    }

    async fn write_action(&mut self, action: &Action) -> ConnectorResult<bool> {
        match &action.kind {
            ActionKind::Delete => {
                let Some(operation) = self.options.delete_operation.clone() else {
                    self.events.log(
                        EventLevel::Debug,
                        "rex_cu_act",
                        &format!(
                            "Delete of {} skipped: no delete operation configured.",
                            action.entity.unique_id
                        ),
                        json!({"entity": action.entity.id}),
                    );
                    return Ok(false);
                };

                let payload = [action.entity.unique_id.as_str()];
                match self.client.call(&operation, &payload).await {
                    Ok(result) => {
                        self.events.log(
                            EventLevel::Debug,
                            "rex_cu_act",
                            &format!("Deleted {} in Retail Express.", action.entity.unique_id),
                            json!({
                                "entity": action.entity.id,
                                "call": operation,
                                "result": result,
                            }),
                        );
                        Ok(true)
                    }
                    Err(e) if e.is_transport() && self.options.propagate_transport_errors => Err(e),
                    Err(e) => {
                        self.events.log(
                            EventLevel::Error,
                            "rex_cu_act",
                            &format!("Delete of {} failed: {}", action.entity.unique_id, e),
                            json!({"entity": action.entity.id, "call": operation}),
                        );
                        Ok(false)
                    }
                }
            }
            ActionKind::Other(kind) => Err(ConnectorError::UnsupportedAction(format!(
                "{} on {}",
                kind, action.entity.entity_type
            ))),
        }
    }
}

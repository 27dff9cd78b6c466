//! Entity synchronization with Retail Express
//!
//! This module provides:
//! - The `Gateway` lifecycle (init, pull, push, actions) for one entity type
//! - A customer gateway folding billing and shipping addresses into the push
//! - Payload assembly and result interpretation for customer writes

mod address;
mod customer;
mod password;
mod payload;


pub use address::{display_name, AddressFields};
pub use customer::{CustomerGateway, GatewayOptions};
pub use password::{random_password, PASSWORD_LENGTH};
pub use payload::{
    build_customer_fields, find_record, interpret_response, relevant_attributes,
    CustomerOutcome, PayloadDraft, CUSTOMER_CALL,
};

use crate::error::ConnectorResult;
use crate::store::SyncEntity;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Kind of a non-attribute action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Delete,
    Other(String),
}

impl FromStr for ActionKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "delete" => ActionKind::Delete,
            other => ActionKind::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Delete => write!(f, "delete"),
            ActionKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// An action queued against a local entity
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub entity: SyncEntity,
}

impl Action {
    pub fn new(kind: ActionKind, entity: SyncEntity) -> Self {
        Self { kind, entity }
    }
}

/// Synchronization lifecycle of one entity type against the remote system
///
/// Push failures that only concern one entity are reported as `Ok(false)`
/// so a batch of independent pushes keeps going.
#[async_trait]
pub trait Gateway: Send {
    /// Prepare the gateway for the given entity type
    async fn init(&mut self, entity_type: &str) -> ConnectorResult<bool>;

    /// Pull remote changes; returns the number of records processed
    async fn retrieve_entities(&mut self) -> ConnectorResult<usize>;

    /// Push local changes of one entity
    async fn write_updates(
        &mut self,
        entity: &SyncEntity,
        attributes: &[String],
    ) -> ConnectorResult<bool>;

    /// Dispatch a non-attribute action
    async fn write_action(&mut self, action: &Action) -> ConnectorResult<bool>;
}

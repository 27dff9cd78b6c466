//! Retail Express connector library
//!
//! This crate provides the core functionality for:
//! - Session-authenticated RPC with the Retail Express web store service
//! - Pushing local customers and addresses as remote customers
//! - Remote linkage bookkeeping through an entity store
//! - Configuration and observability

pub mod config;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod rpc;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::ConnectorConfig;
pub use error::{ConnectorError, ConnectorResult, Fault};
pub use gateway::{Action, ActionKind, CustomerGateway, Gateway, GatewayOptions};
pub use observability::{ConnectorMetrics, EventLevel, EventSink, RecordingSink, TracingSink};
pub use rpc::{ClientConfig, Credentials, RetryPolicy, SessionClient, SessionState};
pub use store::{EntityId, EntityStore, MemoryStore, NodeId, SyncEntity};

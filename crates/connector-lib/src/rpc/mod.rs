//! Session-authenticated RPC with the Retail Express web store service
//!
//! This module provides:
//! - A session client that re-authenticates once on session expiry
//! - A SOAP 1.2 over HTTP transport
//! - Normalization of raw responses into plain JSON trees

mod client;
mod normalize;
mod soap;
mod transport;
mod xml;


pub use client::{ClientConfig, RetryPolicy, SessionClient, SessionState};
pub use normalize::{normalize, RemoteValue};
pub use soap::{SoapConnector, SoapTransport};
pub use transport::{Credentials, Transport, TransportFactory};
pub use xml::{build_envelope, parse_document, parse_response, SERVICE_NAMESPACE};

//! Observability infrastructure for the connector
//!
//! Provides:
//! - An event collector seam (`EventSink`) that every component logs through
//! - Prometheus metrics (remote calls, retries, faults, pushes, linkages)

use chrono::{DateTime, Utc};
use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, error, info, trace};

/// Default histogram buckets for remote call latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Severity of a connector event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Error,
    Info,
    Debug,
    /// Verbose debugging, one event per physical remote call
    DebugExtra,
}

/// Write-only collector for connector events
///
/// Each event carries a short machine-readable code (e.g. `rex_soap_fault`),
/// a message and a free-form context map.
pub trait EventSink: Send + Sync {
    fn log(&self, level: EventLevel, code: &str, message: &str, context: Value);
}

/// Event sink forwarding to `tracing`
#[derive(Debug, Clone)]
pub struct TracingSink {
    node: String,
}

impl TracingSink {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }
}

impl EventSink for TracingSink {
    fn log(&self, level: EventLevel, code: &str, message: &str, context: Value) {
        match level {
            EventLevel::Error => {
                error!(event = %code, node = %self.node, context = %context, "{}", message)
            }
            EventLevel::Info => {
                info!(event = %code, node = %self.node, context = %context, "{}", message)
            }
            EventLevel::Debug => {
                debug!(event = %code, node = %self.node, context = %context, "{}", message)
            }
            EventLevel::DebugExtra => {
                trace!(event = %code, node = %self.node, context = %context, "{}", message)
            }
        }
    }
}

/// A single recorded event
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub level: EventLevel,
    pub code: String,
    pub message: String,
    pub context: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Event sink keeping every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events in emission order
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Codes of all recorded events in emission order
    pub fn codes(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.code).collect()
    }

    /// Number of events recorded with the given code
    pub fn count(&self, code: &str) -> usize {
        self.events().iter().filter(|e| e.code == code).count()
    }

    /// Most recent event with the given code
    pub fn last(&self, code: &str) -> Option<RecordedEvent> {
        self.events().into_iter().rev().find(|e| e.code == code)
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventSink for RecordingSink {
    fn log(&self, level: EventLevel, code: &str, message: &str, context: Value) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedEvent {
                level,
                code: code.to_string(),
                message: message.to_string(),
                context,
                recorded_at: Utc::now(),
            });
    }
}

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ConnectorMetricsInner> = OnceLock::new();

struct ConnectorMetricsInner {
    calls: IntCounter,
    call_attempts: IntCounter,
    session_retries: IntCounter,
    call_faults: IntCounter,
    session_inits: IntCounter,
    call_latency_seconds: Histogram,
    pushes: IntCounter,
    push_failures: IntCounter,
    links_created: IntCounter,
}

impl ConnectorMetricsInner {
    fn new() -> Self {
        Self {
            calls: register_int_counter!(
                "rex_connector_calls_total",
                "Logical remote calls issued"
            )
            .expect("Failed to register calls_total"),

            call_attempts: register_int_counter!(
                "rex_connector_call_attempts_total",
                "Physical remote call attempts, including retries"
            )
            .expect("Failed to register call_attempts_total"),

            session_retries: register_int_counter!(
                "rex_connector_session_retries_total",
                "Calls retried after a session expiry fault"
            )
            .expect("Failed to register session_retries_total"),

            call_faults: register_int_counter!(
                "rex_connector_call_faults_total",
                "Logical remote calls that failed after the retry budget"
            )
            .expect("Failed to register call_faults_total"),

            session_inits: register_int_counter!(
                "rex_connector_session_inits_total",
                "Successful session initialisations"
            )
            .expect("Failed to register session_inits_total"),

            call_latency_seconds: register_histogram!(
                "rex_connector_call_latency_seconds",
                "Latency of physical remote call attempts",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register call_latency_seconds"),

            pushes: register_int_counter!(
                "rex_connector_pushes_total",
                "Entity pushes attempted"
            )
            .expect("Failed to register pushes_total"),

            push_failures: register_int_counter!(
                "rex_connector_push_failures_total",
                "Entity pushes that failed"
            )
            .expect("Failed to register push_failures_total"),

            links_created: register_int_counter!(
                "rex_connector_links_created_total",
                "Remote linkages recorded after a create"
            )
            .expect("Failed to register links_created_total"),
        }
    }
}

/// Connector metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ConnectorMetrics {
    _private: (),
}

impl Default for ConnectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ConnectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ConnectorMetricsInner {
        GLOBAL_METRICS.get_or_init(ConnectorMetricsInner::new)
    }

    pub fn inc_calls(&self) {
        self.inner().calls.inc();
    }

    pub fn observe_attempt(&self, duration_secs: f64) {
        self.inner().call_attempts.inc();
        self.inner().call_latency_seconds.observe(duration_secs);
    }

    pub fn inc_session_retries(&self) {
        self.inner().session_retries.inc();
    }

    pub fn inc_call_faults(&self) {
        self.inner().call_faults.inc();
    }

    pub fn inc_session_inits(&self) {
        self.inner().session_inits.inc();
    }

    pub fn inc_pushes(&self) {
        self.inner().pushes.inc();
    }

    pub fn inc_push_failures(&self) {
        self.inner().push_failures.inc();
    }

    pub fn inc_links_created(&self) {
        self.inner().links_created.inc();
    }

    pub fn session_retries(&self) -> u64 {
        self.inner().session_retries.get()
    }

    pub fn call_attempts(&self) -> u64 {
        self.inner().call_attempts.get()
    }

    /// Text exposition of every metric in the default registry
    pub fn render(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

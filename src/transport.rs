//! Best-effort delivery to the collection endpoint.
//!
//! All tracking traffic goes through the [`Dispatcher`], which stamps the
//! truthful `consent_given` field on every outbound body and then fires
//! the request without awaiting it. Delivery is at-most-once: failures are
//! logged and reported on a channel nobody is required to read, never
//! retried, and never surfaced to the host as an error.

use crate::consent::ConsentGate;
use crate::stats::CollectorStats;
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;
use std::sync::Arc;

/// Delivery error types.
#[derive(Debug)]
pub enum TransportError {
    /// Connection-level failure (DNS, refused, timeout)
    Network(String),
    /// Server answered with a non-2xx status
    Status { status: u16, body: String },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Network(msg) => write!(f, "transport error: {msg}"),
            TransportError::Status { status, body } => {
                write!(f, "endpoint returned {status}: {body}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// One-shot JSON delivery to an absolute URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, body: &Value) -> Result<(), TransportError>;
}

/// Production transport over HTTP POST.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, body: &Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Outcome of one delivery attempt, published for observers.
#[derive(Debug)]
pub struct DeliveryReport {
    /// Endpoint path the payload targeted
    pub endpoint: String,
    /// Whether the attempt succeeded
    pub outcome: Result<(), TransportError>,
}

/// Fire-and-forget dispatch front end over a [`Transport`].
pub struct Dispatcher {
    base_url: String,
    transport: Arc<dyn Transport>,
    consent: Arc<ConsentGate>,
    stats: Arc<CollectorStats>,
    reports: Sender<DeliveryReport>,
}

impl Dispatcher {
    /// Create a dispatcher and the receiving end of its report channel.
    pub fn new(
        base_url: String,
        transport: Arc<dyn Transport>,
        consent: Arc<ConsentGate>,
        stats: Arc<CollectorStats>,
    ) -> (Arc<Self>, Receiver<DeliveryReport>) {
        let (reports, receiver) = unbounded();
        let dispatcher = Arc::new(Self {
            base_url,
            transport,
            consent,
            stats,
            reports,
        });
        (dispatcher, receiver)
    }

    /// Dispatch a payload without awaiting the result.
    ///
    /// Stamps `consent_given` with the gate's state at this moment, spawns
    /// the send on the ambient runtime, and returns immediately. The caller
    /// never observes delivery failures. Off the runtime (a teardown-time
    /// flush on a plain thread) the send falls back to a synchronous
    /// request on a throwaway runtime instead.
    pub fn dispatch(&self, endpoint: &str, mut payload: Value) {
        self.stamp_consent(&mut payload);
        let url = self.endpoint_url(endpoint);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.send_blocking(endpoint, &url, &payload);
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let stats = Arc::clone(&self.stats);
        let reports = self.reports.clone();
        let endpoint = endpoint.to_string();

        handle.spawn(async move {
            let outcome = transport.send(&url, &payload).await;
            finish_delivery(&stats, &reports, endpoint, outcome);
        });
    }

    /// Dispatch a payload and block until delivery completes.
    ///
    /// The privileged teardown path: a dedicated current-thread runtime
    /// drives the send, so it works after the host's event loop is gone.
    /// Must be called off the ambient runtime (a shutdown hook or plain
    /// thread); when called from inside it, degrades to the fire-and-forget
    /// path since blocking there would stall the loop itself.
    pub fn dispatch_final(&self, endpoint: &str, mut payload: Value) {
        if tokio::runtime::Handle::try_current().is_ok() {
            tracing::warn!(
                endpoint,
                "final dispatch requested on the async runtime; falling back to fire-and-forget"
            );
            self.dispatch(endpoint, payload);
            return;
        }

        self.stamp_consent(&mut payload);
        let url = self.endpoint_url(endpoint);
        self.send_blocking(endpoint, &url, &payload);
    }

    /// Drive one send to completion on a dedicated current-thread runtime.
    fn send_blocking(&self, endpoint: &str, url: &str, payload: &Value) {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => {
                let outcome = runtime.block_on(self.transport.send(url, payload));
                finish_delivery(&self.stats, &self.reports, endpoint.to_string(), outcome);
            }
            Err(e) => {
                tracing::warn!(endpoint, "could not build blocking runtime, report lost: {e}");
            }
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Every outbound body carries the truthful consent state at send time.
    fn stamp_consent(&self, payload: &mut Value) {
        if let Some(body) = payload.as_object_mut() {
            body.insert("consent_given".to_string(), Value::Bool(self.consent.is_granted()));
        }
    }
}

fn finish_delivery(
    stats: &CollectorStats,
    reports: &Sender<DeliveryReport>,
    endpoint: String,
    outcome: Result<(), TransportError>,
) {
    match &outcome {
        Ok(()) => stats.record_delivered(),
        Err(e) => {
            stats.record_delivery_failure();
            tracing::warn!(endpoint = %endpoint, "tracking delivery failed: {e}");
        }
    }
    let _ = reports.send(DeliveryReport { endpoint, outcome });
}

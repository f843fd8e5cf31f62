//! Liveness probe against a node's status endpoint.
//!
//! A probe has exactly two outcomes. Connection failures, non-2xx
//! responses, and timeouts all collapse to `Unreachable`; retry policy
//! lives entirely in the monitor loop.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

/// Result of a single liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The status endpoint answered 2xx within the timeout.
    Alive,
    /// Anything else: connect failure, non-2xx, timeout.
    Unreachable,
}

/// Boxed future returned by a probe call.
pub type ProbeFuture = Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'static>>;

/// A single liveness check against a remote node. Must not fail: every
/// failure mode maps to `ProbeOutcome::Unreachable`.
pub trait HealthProbe: Send + Sync + 'static {
    fn probe(&self, address: &str) -> ProbeFuture;
}

/// HTTP GET probe against the node's status endpoint.
pub struct HttpHealthProbe {
    /// Status path on the node, e.g. `/status`.
    path: String,
    /// Hard bound on the whole probe, connect included.
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new("/status", Duration::from_secs(2))
    }
}

impl HealthProbe for HttpHealthProbe {
    fn probe(&self, address: &str) -> ProbeFuture {
        let address = address.to_string();
        let path = self.path.clone();
        let timeout = self.timeout;
        Box::pin(async move { http_probe(&address, &path, timeout).await })
    }
}

/// Perform one bounded HTTP probe. Never errors.
async fn http_probe(address: &str, path: &str, timeout: Duration) -> ProbeOutcome {
    let uri = format!("http://{address}{path}");

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "probe connection failed");
                return ProbeOutcome::Unreachable;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "probe handshake failed");
                return ProbeOutcome::Unreachable;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "gridhub-health/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "probe request build failed");
                return ProbeOutcome::Unreachable;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status().is_success() => ProbeOutcome::Alive,
            Ok(resp) => {
                debug!(status = %resp.status(), %uri, "probe non-2xx");
                ProbeOutcome::Unreachable
            }
            Err(e) => {
                debug!(error = %e, %uri, "probe request failed");
                ProbeOutcome::Unreachable
            }
        }
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(%uri, "probe timed out");
            ProbeOutcome::Unreachable
        }
    }
}

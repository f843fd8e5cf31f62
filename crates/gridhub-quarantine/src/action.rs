//! Restart actions.
//!
//! The drain workflow is agnostic about how a node's automation
//! service actually gets restarted; it only needs an async action
//! with a success/failure result. Two implementations cover the real
//! deployments: an HTTP GET to a node-side command endpoint and an
//! out-of-process command.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Failure of a restart action. Recorded on the job outcome, never
/// fatal to the drain cycle.
#[derive(Debug, Error)]
pub enum RestartError {
    #[error("invalid restart url {0}: {1}")]
    InvalidUrl(String, String),

    #[error("restart request to {0} failed: {1}")]
    Http(String, String),

    #[error("restart request to {0} returned {1}")]
    HttpStatus(String, String),

    #[error("restart command failed to launch: {0}")]
    Spawn(String),

    #[error("restart command exited with {0}")]
    CommandStatus(String),
}

/// Boxed future returned by a restart action.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), RestartError>> + Send + 'static>>;

/// One attempt at restarting a node's automation service.
pub trait RestartAction: Send + Sync + 'static {
    fn run(&self) -> ActionFuture;
}

/// GET against a node-side command endpoint
/// (e.g. `http://node:8080/cmd?run=restart-automation`).
pub struct HttpRestartAction {
    url: String,
    timeout: Duration,
}

impl HttpRestartAction {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl RestartAction for HttpRestartAction {
    fn run(&self) -> ActionFuture {
        let url = self.url.clone();
        let timeout = self.timeout;
        Box::pin(async move { http_get(&url, timeout).await })
    }
}

async fn http_get(url: &str, timeout: Duration) -> Result<(), RestartError> {
    let uri: http::Uri = url
        .parse()
        .map_err(|e: http::uri::InvalidUri| RestartError::InvalidUrl(url.to_string(), e.to_string()))?;
    let authority = uri
        .authority()
        .ok_or_else(|| RestartError::InvalidUrl(url.to_string(), "missing authority".to_string()))?
        .clone();
    let address = format!("{}:{}", authority.host(), uri.port_u16().unwrap_or(80));

    let send = async {
        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .map_err(|e| RestartError::Http(url.to_string(), e.to_string()))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| RestartError::Http(url.to_string(), e.to_string()))?;
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(url)
            .header("host", authority.as_str())
            .header("user-agent", "gridhub-quarantine/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| RestartError::Http(url.to_string(), e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| RestartError::Http(url.to_string(), e.to_string()))?;
        if resp.status().is_success() {
            debug!(%url, status = %resp.status(), "restart request accepted");
            Ok(())
        } else {
            Err(RestartError::HttpStatus(
                url.to_string(),
                resp.status().to_string(),
            ))
        }
    };

    match tokio::time::timeout(timeout, send).await {
        Ok(result) => result,
        Err(_) => Err(RestartError::Http(url.to_string(), "timed out".to_string())),
    }
}

/// Out-of-process restart command run on the hub host.
pub struct ScriptRestartAction {
    program: String,
    args: Vec<String>,
}

impl ScriptRestartAction {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl RestartAction for ScriptRestartAction {
    fn run(&self) -> ActionFuture {
        let program = self.program.clone();
        let args = self.args.clone();
        Box::pin(async move {
            let status = tokio::process::Command::new(&program)
                .args(&args)
                .status()
                .await
                .map_err(|e| RestartError::Spawn(e.to_string()))?;
            if status.success() {
                debug!(%program, "restart command succeeded");
                Ok(())
            } else {
                Err(RestartError::CommandStatus(status.to_string()))
            }
        })
    }
}

//! Client – Launcher-bound HTTP
//! ============================
//!
//! [`LauncherClient`] is the HTTP client handed to tests. It is created before
//! the server process may even be running, so it never stores an address:
//! every request reads the launcher's port *at dispatch time* and targets
//! `http://localhost:<port><path>`.
//!
//! ## Failure semantics
//! * Every HTTP status, 2xx or not, is a regular [`ClientResponse`]; tests
//!   assert on status codes directly.
//! * "Port not announced yet" and refused connections are retried per
//!   [`RetryPolicy`] for every method; after the budget they surface as
//!   [`ClientError::RetriesExhausted`]. I/O errors after the request was
//!   sent are retried for `GET` and `DELETE` only.
//! * A server process that exited on its own fails the request at once with
//!   [`MatrixError::ServerExited`].
//! * Using a destroyed launcher fails immediately with
//!   [`MatrixError::LauncherDestroyed`].

use std::{io::Read, time::Duration};

use ureq::Agent;
use url::Url;

use crate::{
    error::{MatrixError, MatrixResult},
    launcher::SharedLauncher,
};

pub mod error;
pub mod retry;

pub use error::ClientError;
pub use retry::*;

/// Default request timeout (connect + read + write).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

const HOST: &str = "localhost";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Safe to send again after a failure that may have reached the server.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }
}

/// Status and body of one exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ClientResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<R: serde::de::DeserializeOwned>(&self) -> error::Result<R> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }
}

/// HTTP client bound to a launcher rather than to an address.
///
/// Cloning shares the underlying [`ureq::Agent`] connection pool.
#[derive(Debug, Clone)]
pub struct LauncherClient {
    launcher: SharedLauncher,
    agent: Agent,
    retry: RetryPolicy,
    host: String,
    timeout: Duration,
}

impl LauncherClient {
    pub fn new(launcher: SharedLauncher, retry: RetryPolicy) -> Self {
        Self {
            launcher,
            agent: make_agent(DEFAULT_TIMEOUT),
            retry,
            host: HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the host name used for every request (default `localhost`).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = make_agent(timeout);
        self.timeout = timeout;
        self
    }

    pub fn launcher(&self) -> &SharedLauncher {
        &self.launcher
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn get(&self, path: &str) -> MatrixResult<ClientResponse> {
        self.request(Method::Get, path, None, None)
    }

    pub fn delete(&self, path: &str) -> MatrixResult<ClientResponse> {
        self.request(Method::Delete, path, None, None)
    }

    /// POST raw bytes without a `Content-Type` header.
    pub fn post(&self, path: &str, body: &[u8]) -> MatrixResult<ClientResponse> {
        self.request(Method::Post, path, Some(body), None)
    }

    pub fn post_with_type(
        &self,
        path: &str,
        content_type: &str,
        body: &[u8],
    ) -> MatrixResult<ClientResponse> {
        self.request(Method::Post, path, Some(body), Some(content_type))
    }

    pub fn post_json<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> MatrixResult<ClientResponse> {
        let bytes = serde_json::to_vec(body).map_err(ClientError::from)?;
        self.post_with_type(path, "application/json", &bytes)
    }

    /// The URL a request for `path` would target right now, if the port is
    /// known.
    pub fn url(&self, path: &str) -> error::Result<Url> {
        let port = self.launcher.http_port().ok_or(ClientError::PortUnavailable)?;
        self.url_for(port, path)
    }

    /// Start the launcher if needed, then dispatch with retries.
    ///
    /// Every method is retried while the port is unknown or the connection is
    /// refused. I/O failures after the request went out are retried only for
    /// [idempotent](Method::is_idempotent) methods.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
        content_type: Option<&str>,
    ) -> MatrixResult<ClientResponse> {
        self.launcher.start()?;

        let outcome = self.retry.run(
            |attempt| {
                if self.launcher.state().is_destroyed() {
                    return Err(DispatchError::Launcher(MatrixError::LauncherDestroyed {
                        working_dir: self.launcher.working_dir().to_path_buf(),
                    }));
                }
                self.launcher
                    .ensure_running()
                    .map_err(DispatchError::Launcher)?;
                crate::trace!("{method:?} {path} attempt {attempt}");
                self.send_once(method, path, body, content_type)
                    .map_err(DispatchError::Client)
            },
            |e| e.is_transient(method),
        );

        match outcome {
            Ok(response) => Ok(response),
            Err(RetryOutcome::Fatal(DispatchError::Launcher(e)))
            | Err(RetryOutcome::Exhausted {
                last: DispatchError::Launcher(e),
                ..
            }) => Err(e),
            Err(RetryOutcome::Fatal(DispatchError::Client(e))) => Err(e.into()),
            Err(RetryOutcome::Exhausted {
                attempts,
                last: DispatchError::Client(last),
            }) => {
                crate::warn!("{method:?} {path} failed after {attempts} attempt(s): {last}");
                Err(ClientError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                }
                .into())
            }
        }
    }

    fn url_for(&self, port: u16, path: &str) -> error::Result<Url> {
        let base = Url::parse(&format!("http://{}:{port}", self.host)).map_err(|e| {
            ClientError::Setup {
                reason: format!("bad base URL for host `{}`: {e}", self.host),
            }
        })?;
        base.join(path).map_err(|e| ClientError::Setup {
            reason: format!("bad request path `{path}`: {e}"),
        })
    }

    /// One request against the launcher's *current* port.
    fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
        content_type: Option<&str>,
    ) -> error::Result<ClientResponse> {
        let url = self.url(path)?;
        let url = url.as_str();

        let response = match method {
            Method::Get => self.agent.get(url).call(),
            Method::Delete => self.agent.delete(url).call(),
            Method::Post => send_with_body(self.agent.post(url), body, content_type),
            Method::Put => send_with_body(self.agent.put(url), body, content_type),
        };

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let mut body = Vec::new();
                resp.into_body().into_reader().read_to_end(&mut body)?;
                Ok(ClientResponse { status, body })
            }
            // Only reachable if status-as-error gets re-enabled on the agent.
            Err(ureq::Error::StatusCode(status)) => Ok(ClientResponse {
                status,
                body: Vec::new(),
            }),

            Err(ureq::Error::Timeout(_)) => Err(ClientError::Timeout(self.timeout)),

            Err(ureq::Error::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Err(ClientError::Connect(e))
            }

            Err(ureq::Error::Io(e)) => Err(ClientError::Io(e)),

            Err(ureq::Error::ConnectionFailed) => Err(ClientError::Connect(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("connection to {url} failed"),
            ))),

            Err(ureq::Error::BadUri(u)) => Err(ClientError::Setup {
                reason: format!("bad URI: {u}"),
            }),

            Err(other) => Err(ClientError::Setup {
                reason: format!("ureq error: {other}"),
            }),
        }
    }
}

fn send_with_body(
    request: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&[u8]>,
    content_type: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let request = match content_type {
        Some(content_type) => request.content_type(content_type),
        None => request,
    };
    match body {
        Some(bytes) if !bytes.is_empty() => request.send(bytes),
        _ => request.send_empty(),
    }
}

impl std::fmt::Display for LauncherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.launcher.http_port() {
            Some(port) => write!(f, "LauncherClient(http://{}:{port})", self.host),
            None => write!(f, "LauncherClient(http://{}:<pending>)", self.host),
        }
    }
}

fn make_agent(timeout: Duration) -> Agent {
    Agent::new_with_config(
        Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build(),
    )
}

#[derive(Debug)]
enum DispatchError {
    /// The launcher itself cannot serve requests any more.
    Launcher(MatrixError),
    Client(ClientError),
}

impl DispatchError {
    fn is_transient(&self, method: Method) -> bool {
        match self {
            DispatchError::Launcher(_) => false,
            DispatchError::Client(ClientError::Io(_)) => method.is_idempotent(),
            DispatchError::Client(e) => e.is_transient(),
        }
    }
}

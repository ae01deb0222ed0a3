#[derive(serde::Serialize, Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    #[serde(serialize_with = "crate::error::std_io_error_to_string")]
    Io(#[from] std::io::Error),

    /// Nothing accepted the connection; the request never left the client.
    #[error("connection refused: {0}")]
    #[serde(serialize_with = "crate::error::std_io_error_to_string")]
    Connect(std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("serialization error: {0}")]
    #[serde(serialize_with = "crate::error::std_io_error_to_string")]
    Serde(#[from] serde_json::Error),

    /// The launcher has not announced its HTTP port yet.
    #[error("launcher has not announced an HTTP port yet")]
    PortUnavailable,

    /// Every attempt of the retry budget hit a transient failure.
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },

    #[error("client setup error: {reason}")]
    Setup { reason: String },
}

impl ClientError {
    /// Failures expected while the server is still starting: no port yet, or
    /// nothing accepting connections on it. Both are safe to retry for any
    /// method because no request reached the server.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::PortUnavailable | ClientError::Connect(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

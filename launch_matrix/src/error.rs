// top-level error for the public API

use crate::matrix::types::CacheKey;

#[derive(serde::Serialize, Debug, thiserror::Error)]
pub enum MatrixError {
    #[error(transparent)]
    Process(#[from] crate::launcher::process::error::ProcessError),

    #[error(transparent)]
    Client(#[from] crate::client::error::ClientError),

    /// A test specification cannot be turned into a complete matrix.
    #[error("invalid test specification {spec}: {reason}")]
    Configuration { spec: String, reason: String },

    /// Building a new launcher for `key` failed. Nothing is cached; the next
    /// resolve for the same key tries again.
    #[error("failed to construct launcher for {key}: {source}")]
    Construction {
        key: CacheKey,
        #[source]
        source: Box<MatrixError>,
    },

    /// A single launcher could not be destroyed during teardown.
    #[error("failed to tear down launcher {key}: {reason}")]
    Teardown { key: CacheKey, reason: String },

    /// The launcher cache was drained; no further launchers may be created.
    #[error("launcher cache is closed; resolve called after teardown")]
    CacheClosed,

    /// A launcher was used after `destroy()`.
    #[error("launcher at '{working_dir}' was already destroyed")]
    LauncherDestroyed { working_dir: std::path::PathBuf },

    /// A started server process exited without being destroyed.
    #[error("server process in '{working_dir}' exited with {status}; see '{stderr_log}'")]
    ServerExited {
        working_dir: std::path::PathBuf,
        status: String,
        stderr_log: std::path::PathBuf,
    },

    #[error("invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{operation} failed for '{path}'")]
    FileSystem {
        operation: &'static str,
        path: std::path::PathBuf,
        #[source]
        #[serde(serialize_with = "std_io_error_to_string")]
        source: std::io::Error,
    },
}

pub type MatrixResult<T> = std::result::Result<T, MatrixError>;

impl MatrixError {
    pub fn file_system(
        operation: &'static str,
        path: impl Into<std::path::PathBuf>,
        err: impl Into<std::io::Error>,
    ) -> Self {
        Self::FileSystem {
            operation,
            path: path.into(),
            source: err.into(),
        }
    }

    pub fn configuration(spec: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Configuration {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    pub fn construction(key: &CacheKey, source: MatrixError) -> Self {
        Self::Construction {
            key: key.clone(),
            source: Box::new(source),
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Internal(format!("{what} lock poisoned"))
    }
}

pub(crate) fn std_io_error_to_string<S>(e: &impl std::fmt::Display, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&e.to_string())
}

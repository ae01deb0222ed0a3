//! Orchestrator configuration.
//!
//! Defaults reproduce the usual integration-test setup: a temp root named
//! `embedded-server-tests…`, launcher dirs named `app-launcher-…`, and a client
//! retry policy of 10 attempts one second apart. The temp root's parent can be
//! moved with the `LAUNCH_MATRIX_TEMP_DIR` environment variable.

use std::{path::PathBuf, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    client::{DEFAULT_TIMEOUT, RetryPolicy},
    error::{MatrixError, MatrixResult},
};

pub const TEMP_DIR_ENV: &str = "LAUNCH_MATRIX_TEMP_DIR";
const DEFAULT_TEMP_PREFIX: &str = "embedded-server-tests";
const DEFAULT_LAUNCHER_DIR_PREFIX: &str = "app-launcher";

fn default_temp_prefix() -> String {
    DEFAULT_TEMP_PREFIX.to_string()
}

fn default_launcher_dir_prefix() -> String {
    DEFAULT_LAUNCHER_DIR_PREFIX.to_string()
}

fn default_request_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct MatrixConfig {
    /// Prefix of the shared temp root directory name.
    #[builder(default = default_temp_prefix(), into)]
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    /// Directory the temp root is created in; system temp dir when unset.
    #[builder(into)]
    #[serde(default)]
    pub temp_parent: Option<PathBuf>,

    /// Prefix of every per-launcher working directory.
    #[builder(default = default_launcher_dir_prefix(), into)]
    #[serde(default = "default_launcher_dir_prefix")]
    pub launcher_dir_prefix: String,

    #[builder(default)]
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-request timeout of resolved clients (connect + read + write).
    #[builder(default = default_request_timeout())]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        MatrixConfig::builder().build()
    }
}

impl MatrixConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(TEMP_DIR_ENV).filter(|d| !d.is_empty()) {
            config.temp_parent = Some(PathBuf::from(dir));
        }
        config
    }

    pub fn validate(&self) -> MatrixResult<()> {
        self.retry.validate()?;
        if self.temp_prefix.trim().is_empty() {
            return Err(MatrixError::InvalidConfig {
                field: "temp_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.launcher_dir_prefix.trim().is_empty() {
            return Err(MatrixError::InvalidConfig {
                field: "launcher_dir_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(MatrixError::InvalidConfig {
                field: "request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

//! Launcher
//! ========
//!
//! A launcher starts, observes and stops **one** external server process for
//! one [`ApplicationDescriptor`]. The rest of the crate only talks to the
//! [`Launcher`] trait; concrete launch styles are registered as
//! [`LauncherStrategy`] implementations in a [`LauncherRegistry`].
//!
//! ## State machine
//!
//! ```text
//! Unstarted ──start()──▶ Started ──port announced──▶ PortKnown
//!     │                     │                            │
//!     └─────────────────────┴──────── destroy() ─────────┴──▶ Destroyed
//! ```
//!
//! `destroy()` is idempotent and nothing ever leaves `Destroyed`. Any
//! operation other than `destroy()` on a destroyed launcher returns
//! [`MatrixError::LauncherDestroyed`](crate::MatrixError::LauncherDestroyed).

use std::{path::Path, sync::Arc};

use serde::Serialize;

use crate::error::MatrixResult;

pub mod command;
pub mod process;
pub mod registry;

pub use command::*;
pub use registry::*;

/// Observable lifecycle state of a [`Launcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LauncherState {
    Unstarted,
    Started,
    PortKnown(u16),
    Destroyed,
}

impl LauncherState {
    pub fn is_destroyed(&self) -> bool {
        matches!(self, LauncherState::Destroyed)
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            LauncherState::PortKnown(port) => Some(*port),
            _ => None,
        }
    }
}

/// One external server process plus its private working directory.
///
/// Implementations must tolerate concurrent calls from several test
/// executions sharing the same cache entry.
pub trait Launcher: std::fmt::Debug + Send + Sync {
    /// Start the process if it is not running yet. Calling this on a started
    /// launcher is a cheap no-op.
    fn start(&self) -> MatrixResult<()>;

    /// The HTTP port once the process announced readiness, `None` before.
    fn http_port(&self) -> Option<u16>;

    fn state(&self) -> LauncherState;

    /// Private directory below the shared temp root.
    fn working_dir(&self) -> &Path;

    /// Fail with [`MatrixError::ServerExited`](crate::MatrixError::ServerExited)
    /// if a started process went away on its own. Launchers without a process
    /// to watch keep the default.
    fn ensure_running(&self) -> MatrixResult<()> {
        Ok(())
    }

    /// Stop the process and release everything it holds. Idempotent.
    fn destroy(&self) -> MatrixResult<()>;

    /// OS process id while running.
    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Launchers are shared between matrix cells; the cache owns one reference.
pub type SharedLauncher = Arc<dyn Launcher>;

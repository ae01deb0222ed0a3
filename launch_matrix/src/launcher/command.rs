//! Launcher – Command
//! ==================
//!
//! Reference launcher that runs an arbitrary command as the server process.
//!
//! The launched application learns where to report its port through the
//! environment and writes the port number to a file once its connector is
//! listening. A trailing newline marks the number as complete; without one
//! the value is accepted after it reads the same twice.
//!
//! | Variable           | Value                                   |
//! |--------------------|-----------------------------------------|
//! | `SERVER_PORT`      | `0` (ask the OS for an ephemeral port)  |
//! | `SERVER_PORT_FILE` | `<working_dir>/server.port`             |
//! | `APP_CONTAINER`    | `jetty` / `tomcat` / `undertow`         |
//! | `APP_PACKAGING`    | `jar` / `war`                           |
//!
//! Program and arguments may contain the placeholders `{container}`,
//! `{packaging}`, `{working_dir}` and `{port_file}`.
//!
//! Standard output and error are captured to `stdout.log` / `stderr.log` in
//! the working directory.

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::{Arc, Mutex, MutexGuard},
};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MatrixError, MatrixResult},
    launcher::{Launcher, LauncherState, LauncherStrategy, SharedLauncher, process::ProcessGuard},
    matrix::types::{ApplicationDescriptor, ContainerKind, LauncherStrategyKind, Packaging},
};

pub const PORT_FILE_NAME: &str = "server.port";
const STDOUT_LOG: &str = "stdout.log";
const STDERR_LOG: &str = "stderr.log";

/// Strategy producing [`CommandLauncher`]s from a command template.
///
/// ```rust
/// use launch_matrix::*;
///
/// let packaged = CommandStrategy::builder()
///     .kind("packaged")
///     .description("packaged {packaging}")
///     .program("java")
///     .args(["-jar", "app-{container}.{packaging}"])
///     .build();
/// assert_eq!(packaged.describe(Packaging::War), "packaged war");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct CommandStrategy {
    #[builder(into)]
    pub kind: LauncherStrategyKind,

    /// Display template; `{packaging}` is replaced with the packaging name.
    #[builder(into)]
    pub description: String,

    #[builder(into)]
    pub program: String,

    #[builder(default, with = |args: impl IntoIterator<Item = impl Into<String>>| {
        args.into_iter().map(Into::into).collect()
    })]
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment passed to the process.
    #[builder(default)]
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Packagings this strategy can launch; `None` means all of them.
    #[serde(default)]
    pub packagings: Option<Vec<Packaging>>,

    /// Containers this strategy can launch; `None` means all of them.
    #[serde(default)]
    pub containers: Option<Vec<ContainerKind>>,
}

impl LauncherStrategy for CommandStrategy {
    fn kind(&self) -> LauncherStrategyKind {
        self.kind.clone()
    }

    fn describe(&self, packaging: Packaging) -> String {
        self.description.replace("{packaging}", packaging.as_str())
    }

    fn supports(&self, descriptor: &ApplicationDescriptor) -> bool {
        let packaging_ok = self
            .packagings
            .as_ref()
            .is_none_or(|p| p.contains(&descriptor.packaging));
        let container_ok = self
            .containers
            .as_ref()
            .is_none_or(|c| c.contains(&descriptor.container));
        packaging_ok && container_ok
    }

    fn create(
        &self,
        descriptor: ApplicationDescriptor,
        working_dir: &Path,
    ) -> MatrixResult<SharedLauncher> {
        if self.program.trim().is_empty() {
            return Err(MatrixError::InvalidConfig {
                field: "program",
                reason: format!("strategy `{}` has an empty program", self.kind),
            });
        }
        if !working_dir.is_dir() {
            return Err(MatrixError::file_system(
                "use launcher working dir",
                working_dir,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        Ok(Arc::new(CommandLauncher {
            descriptor,
            working_dir: working_dir.to_path_buf(),
            program: self.program.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            inner: Mutex::new(Inner {
                state: LauncherState::Unstarted,
                guard: None,
                pending_port: None,
            }),
        }))
    }
}

#[derive(Debug)]
struct Inner {
    state: LauncherState,
    guard: Option<ProcessGuard>,
    /// Port read once from an unterminated port file, awaiting confirmation.
    pending_port: Option<u16>,
}

/// Launcher that owns one child process started from a command template.
#[derive(Debug)]
pub struct CommandLauncher {
    descriptor: ApplicationDescriptor,
    working_dir: PathBuf,
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    inner: Mutex<Inner>,
}

impl CommandLauncher {
    pub fn descriptor(&self) -> ApplicationDescriptor {
        self.descriptor
    }

    pub fn port_file(&self) -> PathBuf {
        self.working_dir.join(PORT_FILE_NAME)
    }

    fn lock(&self) -> MatrixResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| MatrixError::poisoned("launcher"))
    }

    fn substitute(&self, template: &str) -> String {
        template
            .replace("{container}", self.descriptor.container.as_str())
            .replace("{packaging}", self.descriptor.packaging.as_str())
            .replace("{working_dir}", &self.working_dir.to_string_lossy())
            .replace("{port_file}", &self.port_file().to_string_lossy())
    }

    fn command(&self) -> MatrixResult<Command> {
        let mut cmd = Command::new(self.substitute(&self.program));
        cmd.args(self.args.iter().map(|a| self.substitute(a)))
            .current_dir(&self.working_dir)
            .env("SERVER_PORT", "0")
            .env("SERVER_PORT_FILE", self.port_file())
            .env("APP_CONTAINER", self.descriptor.container.as_str())
            .env("APP_PACKAGING", self.descriptor.packaging.as_str())
            .envs(&self.env)
            .stdin(Stdio::null());

        let stdout_path = self.working_dir.join(STDOUT_LOG);
        let stdout = File::create(&stdout_path)
            .map_err(|e| MatrixError::file_system("create stdout log", &stdout_path, e))?;
        let stderr_path = self.working_dir.join(STDERR_LOG);
        let stderr = File::create(&stderr_path)
            .map_err(|e| MatrixError::file_system("create stderr log", &stderr_path, e))?;
        cmd.stdout(stdout).stderr(stderr);
        Ok(cmd)
    }

    /// Promote `Started` to `PortKnown` once the port file holds a number.
    ///
    /// A number followed by a newline is final. Without the newline the write
    /// may still be in progress, so the value must read the same twice in a
    /// row before it is accepted.
    fn refresh_port(&self, inner: &mut Inner) {
        if inner.state != LauncherState::Started {
            return;
        }
        let Ok(contents) = std::fs::read_to_string(self.port_file()) else {
            return;
        };
        let port = match contents.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                crate::trace!("port file not ready: {contents:?}");
                inner.pending_port = None;
                return;
            }
        };
        let complete = contents.ends_with('\n');
        if !complete && inner.pending_port != Some(port) {
            crate::trace!("port file holds {port} without newline; confirming on next read");
            inner.pending_port = Some(port);
            return;
        }
        crate::info!(
            "Launcher {} announced port {port}",
            self.working_dir.display()
        );
        inner.pending_port = None;
        inner.state = LauncherState::PortKnown(port);
    }
}

impl Launcher for CommandLauncher {
    fn start(&self) -> MatrixResult<()> {
        let mut inner = self.lock()?;
        match inner.state {
            LauncherState::Destroyed => Err(MatrixError::LauncherDestroyed {
                working_dir: self.working_dir.clone(),
            }),
            LauncherState::Started | LauncherState::PortKnown(_) => Ok(()),
            LauncherState::Unstarted => {
                let guard = ProcessGuard::spawn(self.command()?)?;
                crate::info!(
                    "Started {} (pid {}) in {}",
                    self.descriptor,
                    guard.pid(),
                    self.working_dir.display()
                );
                inner.guard = Some(guard);
                inner.state = LauncherState::Started;
                Ok(())
            }
        }
    }

    fn http_port(&self) -> Option<u16> {
        let mut inner = self.lock().ok()?;
        self.refresh_port(&mut inner);
        inner.state.port()
    }

    fn state(&self) -> LauncherState {
        match self.lock() {
            Ok(mut inner) => {
                self.refresh_port(&mut inner);
                inner.state
            }
            Err(_) => LauncherState::Destroyed,
        }
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn ensure_running(&self) -> MatrixResult<()> {
        let inner = self.lock()?;
        if inner.state.is_destroyed() {
            return Ok(());
        }
        let Some(status) = inner.guard.as_ref().and_then(ProcessGuard::exit_status) else {
            return Ok(());
        };
        let stderr_log = self.working_dir.join(STDERR_LOG);
        crate::error!(
            "{} server in {} exited with {status}",
            self.descriptor,
            self.working_dir.display()
        );
        Err(MatrixError::ServerExited {
            working_dir: self.working_dir.clone(),
            status: status.to_string(),
            stderr_log,
        })
    }

    fn destroy(&self) -> MatrixResult<()> {
        let guard = {
            let mut inner = self.lock()?;
            if inner.state.is_destroyed() {
                return Ok(());
            }
            inner.state = LauncherState::Destroyed;
            inner.guard.take()
        };
        if let Some(guard) = guard {
            guard.stop()?;
            crate::info!("Destroyed launcher in {}", self.working_dir.display());
        }
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        let inner = self.lock().ok()?;
        inner.guard.as_ref().map(ProcessGuard::pid)
    }
}

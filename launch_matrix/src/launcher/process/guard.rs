//! Launcher Process - Guard
//! ========================
//!
//! Spawns and supervises a *single* external server process, guaranteeing
//! clean-up of the whole process tree.
//!
//! Key responsibilities
//! --------------------
//! * **Spawn** the command in its own process group (Unix) so wrapper
//!   scripts and their children are signalled together.
//! * **Contain** the child: on Linux the kernel delivers `SIGTERM` to it if
//!   the test runner dies (`prctl(PDEATHSIG)`).
//! * **Clean up** gracefully (`SIGTERM` → [`POLITE_WAIT`] → `SIGKILL`) on
//!   [`ProcessGuard::stop`] or on `Drop`.

use std::{
    process::{Child, Command},
    sync::RwLock,
    time::Duration,
};

use wait_timeout::ChildExt;

use super::{FORCE_KILL_TIMEOUT_SECS, POLITE_WAIT, error::*};

/// RAII handle owning one running child process.
///
/// Dropping the guard (or calling [`stop`](Self::stop)) terminates the
/// process group. `stop` is idempotent.
#[derive(Debug)]
pub struct ProcessGuard {
    /// Handle to the child process; `None` once reaped.
    child: RwLock<Option<Child>>,
    pid: u32,
}

impl ProcessGuard {
    pub fn spawn(cmd: Command) -> Result<Self> {
        crate::info!("Spawning launcher process: {:?}", cmd);
        let child = attach(cmd)?;
        let pid = child.id();
        debug_assert!(pid > 0, "OS returned an invalid PID (0)");
        Ok(Self {
            child: RwLock::new(Some(child)),
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status once the child has exited on its own; `None` while it
    /// runs or after [`stop`](Self::stop) reaped it.
    pub fn exit_status(&self) -> Option<std::process::ExitStatus> {
        let mut slot = self.child.write().ok()?;
        slot.as_mut()?.try_wait().ok().flatten()
    }

    /// Best-effort, idempotent shutdown:
    /// 1. *Polite* → `SIGTERM` to the process group.
    /// 2. Wait up to [`POLITE_WAIT`].
    /// 3. *Force* → `SIGKILL`, wait up to [`FORCE_KILL_TIMEOUT_SECS`].
    pub fn stop(&self) -> Result<()> {
        match self.kill_child() {
            Ok(()) => Ok(()),
            Err(e) => {
                crate::error!("Failed to stop launcher process {}: {}", self.pid, e);
                Err(e)
            }
        }
    }

    fn kill_child(&self) -> Result<()> {
        let taken = self
            .child
            .write()
            .map_err(|_| ProcessError::CommandFailed {
                action: "lock child handle",
                source: "child handle lock poisoned".into(),
            })?
            .take();
        let Some(mut child) = taken else {
            return Ok(());
        };

        if child
            .try_wait()
            .map_err(|e| ProcessError::CommandFailed {
                action: "get exit status",
                source: e.into(),
            })?
            .is_some()
        {
            return Ok(());
        }

        if let Err(e) = terminate(&mut child) {
            crate::error!("Failed to send TERM to PID {}: {}", child.id(), e);
        }

        if let Some(status) =
            child
                .wait_timeout(POLITE_WAIT)
                .map_err(|e| ProcessError::CommandFailed {
                    action: "polite wait for exit",
                    source: e.into(),
                })?
        {
            crate::info!("Launcher process exited gracefully with status: {}", status);
            return Ok(());
        }

        force_kill(&mut child)?;

        match child
            .wait_timeout(Duration::from_secs(FORCE_KILL_TIMEOUT_SECS))
            .map_err(|e| ProcessError::CommandFailed {
                action: "wait after force-kill",
                source: e.into(),
            })? {
            Some(status) => {
                crate::info!("Launcher process force-killed; exit status {status}");
                Ok(())
            }
            None => Err(ProcessError::TerminationTimeout {
                operation: "force-kill",
                elapsed: Duration::from_secs(FORCE_KILL_TIMEOUT_SECS),
                leftovers: vec![child.id()],
            }),
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            crate::error!("Failed to stop launcher process on drop: {}", e);
        }
    }
}

/// Cross-platform "is this pid up?" probe. Zombies count as dead.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> Result<bool> {
    use nix::{errno::Errno, sys::signal::kill, unistd::Pid};

    match kill(Pid::from_raw(pid as i32), None) {
        Err(Errno::ESRCH) => return Ok(false),
        Err(Errno::EPERM) => {
            return Err(ProcessError::PermissionDenied {
                action: "probe process (signal 0)",
                source: "operation not permitted".into(),
            });
        }
        Err(e) => {
            return Err(ProcessError::CommandFailed {
                action: "probe process (signal 0)",
                source: e.into(),
            });
        }
        Ok(_) => (),
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{pid}/status")) {
            if status
                .lines()
                .find(|l| l.starts_with("State:"))
                .and_then(|l| l.split_whitespace().nth(1))
                == Some("Z")
            {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

// Unix ───────────────────────────────────────────────────
#[cfg(unix)]
fn attach(mut cmd: Command) -> Result<Child> {
    use std::os::unix::process::CommandExt;

    use nix::unistd::{Pid, setpgid};

    // Child becomes leader of a new process-group (PGID = its PID).
    unsafe {
        cmd.pre_exec(|| {
            setpgid(Pid::from_raw(0), Pid::from_raw(0))
                .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;

            #[cfg(target_os = "linux")]
            nix::sys::prctl::set_pdeathsig(Some(nix::sys::signal::Signal::SIGTERM))?;

            Ok(())
        })
    };
    cmd.spawn().map_err(|e| ProcessError::CommandFailed {
        action: "spawn child process",
        source: e.into(),
    })
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::{errno::Errno, sys::signal::killpg, unistd::Pid};

    match killpg(Pid::from_raw(child.id() as i32), signal) {
        Ok(_) | Err(Errno::ESRCH) => Ok(()),
        Err(Errno::EPERM) => Err(ProcessError::PermissionDenied {
            action: "signal process group",
            source: "operation not permitted".into(),
        }),
        Err(e) => Err(ProcessError::CommandFailed {
            action: "signal process group",
            source: e.into(),
        }),
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<()> {
    signal_group(child, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(unix)]
fn force_kill(child: &mut Child) -> Result<()> {
    signal_group(child, nix::sys::signal::Signal::SIGKILL)
}

// Other platforms ────────────────────────────────────────
#[cfg(not(unix))]
fn attach(mut cmd: Command) -> Result<Child> {
    cmd.spawn().map_err(|e| ProcessError::CommandFailed {
        action: "spawn child process",
        source: e.into(),
    })
}

// No polite signal available; the force path does the work.
#[cfg(not(unix))]
fn terminate(_child: &mut Child) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child) -> Result<()> {
    child.kill().map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ProcessError::PermissionDenied {
            action: "force-kill",
            source: e.into(),
        },
        _ => ProcessError::CommandFailed {
            action: "force-kill",
            source: e.into(),
        },
    })
}

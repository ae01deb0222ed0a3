//! Orchestrator
//! ============
//!
//! Per-suite owner of every shared resource: the strategy registry, the
//! [`SharedTempRoot`] and the [`LauncherCache`]. Construct one at suite start,
//! hand out matrices with [`contexts`](MatrixOrchestrator::contexts), and call
//! [`teardown`](MatrixOrchestrator::teardown) once at suite end.
//!
//! ```text
//! MatrixOrchestrator::new ──▶ contexts(spec) … contexts(spec) ──▶ teardown()
//!        │                          │                                │
//!        └─ temp root created       └─ launchers cached              ├─ drain cache, destroy each
//!                                                                    └─ remove temp root
//! ```
//!
//! Dropping an orchestrator that was never torn down runs the teardown, so a
//! panicking suite still stops its processes.

use std::{
    fmt::Write as _,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::Serialize;

use crate::{
    cache::LauncherCache,
    config::MatrixConfig,
    error::{MatrixError, MatrixResult},
    launcher::LauncherRegistry,
    matrix::{generator::MatrixGenerator, spec::TestSpecification, context::TestExecutionContext},
    temp_root::SharedTempRoot,
};

#[derive(Debug)]
pub struct MatrixOrchestrator {
    config: MatrixConfig,
    registry: LauncherRegistry,
    root: Arc<SharedTempRoot>,
    cache: LauncherCache,
    torn_down: AtomicBool,
}

impl MatrixOrchestrator {
    pub fn new(registry: LauncherRegistry, config: MatrixConfig) -> MatrixResult<Self> {
        config.validate()?;
        let root = Arc::new(SharedTempRoot::new(
            &config.temp_prefix,
            config.temp_parent.as_deref(),
        )?);
        let cache = LauncherCache::new(root.clone(), config.launcher_dir_prefix.clone());
        crate::info!(
            "Matrix orchestrator ready; temp root {}",
            root.path().display()
        );
        Ok(Self {
            config,
            registry,
            root,
            cache,
            torn_down: AtomicBool::new(false),
        })
    }

    /// Orchestrator with [`MatrixConfig::from_env`].
    pub fn from_env(registry: LauncherRegistry) -> MatrixResult<Self> {
        Self::new(registry, MatrixConfig::from_env())
    }

    pub fn generator(&self) -> MatrixGenerator<'_> {
        MatrixGenerator::new(
            &self.registry,
            &self.cache,
            self.config.retry,
            self.config.request_timeout,
        )
    }

    /// Every matrix cell for `spec`, with launchers resolved from the cache.
    pub fn contexts(&self, spec: &TestSpecification) -> MatrixResult<Vec<TestExecutionContext>> {
        if self.is_torn_down() {
            return Err(MatrixError::CacheClosed);
        }
        self.generator().generate(spec)
    }

    pub fn cache(&self) -> &LauncherCache {
        &self.cache
    }

    pub fn registry(&self) -> &LauncherRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn temp_root(&self) -> &SharedTempRoot {
        &self.root
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Destroy every cached launcher, then remove the shared temp root.
    ///
    /// One launcher failing to stop does not stop the others; failures are
    /// logged and collected in the returned report. Only the first call does
    /// any work.
    pub fn teardown(&self) -> TeardownReport {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            crate::debug!("Teardown already ran; nothing to do");
            return TeardownReport::default();
        }

        let mut report = TeardownReport::default();
        for (key, launcher) in self.cache.drain() {
            match launcher.destroy() {
                Ok(()) => report.destroyed += 1,
                Err(e) => {
                    crate::error!("Failed to destroy launcher {key}: {e}");
                    report.failures.push(MatrixError::Teardown {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        match self.root.remove() {
            Ok(removed) => report.temp_root_removed = removed,
            Err(e) => {
                crate::error!("Failed to remove temp root: {e}");
                report.temp_root_error = Some(e.to_string());
            }
        }

        crate::info!("{report}");
        report
    }
}

impl Drop for MatrixOrchestrator {
    fn drop(&mut self) {
        if !self.is_torn_down() {
            let report = self.teardown();
            if !report.is_clean() {
                crate::error!("Teardown on drop was not clean: {report}");
            }
        }
    }
}

/// Outcome of [`MatrixOrchestrator::teardown`].
#[derive(Debug, Default, Serialize)]
pub struct TeardownReport {
    /// Launchers whose `destroy()` succeeded.
    pub destroyed: usize,
    /// One [`MatrixError::Teardown`] per launcher that failed to stop.
    pub failures: Vec<MatrixError>,
    pub temp_root_removed: bool,
    pub temp_root_error: Option<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.temp_root_error.is_none()
    }

    /// Launchers that received a destroy call, failed or not.
    pub fn attempted(&self) -> usize {
        self.destroyed + self.failures.len()
    }
}

impl std::fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Teardown: {} destroyed, {} failed, temp root removed: {}",
            self.destroyed,
            self.failures.len(),
            self.temp_root_removed
        )?;
        let mut indented = indenter::indented(f).with_str("   ");
        for failure in &self.failures {
            writeln!(indented, "{failure}")?;
        }
        if let Some(e) = &self.temp_root_error {
            writeln!(indented, "{e}")?;
        }
        Ok(())
    }
}

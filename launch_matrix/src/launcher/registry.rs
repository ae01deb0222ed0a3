//! Launcher – Registry
//! ===================
//!
//! Maps a [`LauncherStrategyKind`] to the [`LauncherStrategy`] that knows how to
//! build launchers of that kind. Registration replaces any previous strategy
//! with the same kind.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use crate::{
    error::{MatrixError, MatrixResult},
    launcher::SharedLauncher,
    matrix::types::{ApplicationDescriptor, LauncherStrategyKind, Packaging},
};

/// Constructor side of a launch style.
pub trait LauncherStrategy: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> LauncherStrategyKind;

    /// Human-readable description used in matrix display names,
    /// e.g. `"packaged jar"`.
    fn describe(&self, packaging: Packaging) -> String;

    /// Whether this strategy can launch the given application shape at all.
    fn supports(&self, _descriptor: &ApplicationDescriptor) -> bool {
        true
    }

    /// Build a new, *unstarted* launcher bound to `working_dir`.
    fn create(
        &self,
        descriptor: ApplicationDescriptor,
        working_dir: &Path,
    ) -> MatrixResult<SharedLauncher>;
}

#[derive(Debug, Default, Clone)]
pub struct LauncherRegistry {
    strategies: BTreeMap<LauncherStrategyKind, Arc<dyn LauncherStrategy>>,
}

impl LauncherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: impl LauncherStrategy + 'static) -> &mut Self {
        self.register_shared(Arc::new(strategy))
    }

    pub fn register_shared(&mut self, strategy: Arc<dyn LauncherStrategy>) -> &mut Self {
        let kind = strategy.kind();
        if self.strategies.insert(kind.clone(), strategy).is_some() {
            crate::warn!("Replacing launcher strategy `{kind}`");
        }
        self
    }

    /// Chainable variant of [`register`](Self::register) for one-shot setup.
    pub fn with(mut self, strategy: impl LauncherStrategy + 'static) -> Self {
        self.register(strategy);
        self
    }

    pub fn get(&self, kind: &LauncherStrategyKind) -> Option<&Arc<dyn LauncherStrategy>> {
        self.strategies.get(kind)
    }

    /// Look up `kind` and check it can launch `descriptor`.
    ///
    /// Both failure modes are configuration errors: the matrix cannot be
    /// completed for this specification.
    pub fn strategy_for(
        &self,
        spec_name: &str,
        kind: &LauncherStrategyKind,
        descriptor: &ApplicationDescriptor,
    ) -> MatrixResult<&Arc<dyn LauncherStrategy>> {
        let strategy = self.get(kind).ok_or_else(|| {
            MatrixError::configuration(
                spec_name,
                format!("launcher strategy `{kind}` is not registered"),
            )
        })?;
        if !strategy.supports(descriptor) {
            return Err(MatrixError::configuration(
                spec_name,
                format!("launcher strategy `{kind}` cannot launch {descriptor}"),
            ));
        }
        Ok(strategy)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &LauncherStrategyKind> {
        self.strategies.keys()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

use std::{collections::HashSet, sync::Arc, time::Duration};

use crate::{
    cache::LauncherCache,
    client::RetryPolicy,
    error::{MatrixError, MatrixResult},
    launcher::{LauncherRegistry, LauncherStrategy},
    matrix::{
        context::TestExecutionContext,
        spec::TestSpecification,
        types::{ApplicationDescriptor, CacheKey},
    },
};

/// Expands a [`TestSpecification`] into one [`TestExecutionContext`] per
/// (container kind × launcher strategy) pair.
///
/// The whole matrix is planned and validated before the first launcher is
/// resolved, so a configuration error never leaves a partial matrix behind.
/// Cells come out grouped by container kind, in declaration order.
#[derive(Debug)]
pub struct MatrixGenerator<'a> {
    registry: &'a LauncherRegistry,
    cache: &'a LauncherCache,
    retry: RetryPolicy,
    request_timeout: Duration,
}

struct PlannedCell {
    name: String,
    descriptor: ApplicationDescriptor,
    strategy: Arc<dyn LauncherStrategy>,
}

impl<'a> MatrixGenerator<'a> {
    pub fn new(
        registry: &'a LauncherRegistry,
        cache: &'a LauncherCache,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            cache,
            retry,
            request_timeout,
        }
    }

    pub fn generate(&self, spec: &TestSpecification) -> MatrixResult<Vec<TestExecutionContext>> {
        let plan = self.plan(spec)?;
        crate::debug!("Matrix for {} has {} cell(s)", spec.name, plan.len());

        let mut contexts = Vec::with_capacity(plan.len());
        for cell in plan {
            let kind = cell.strategy.kind();
            let key = CacheKey::new(&cell.descriptor, &kind);
            let strategy = cell.strategy.clone();
            let launcher = self
                .cache
                .resolve(&key, |descriptor, working_dir| {
                    strategy.create(descriptor, working_dir)
                })?;
            contexts.push(TestExecutionContext::new(
                cell.name,
                cell.descriptor,
                kind,
                launcher,
                self.retry,
                self.request_timeout,
            ));
        }
        Ok(contexts)
    }

    /// Display names of every cell, without touching the cache.
    pub fn names(&self, spec: &TestSpecification) -> MatrixResult<Vec<String>> {
        Ok(self.plan(spec)?.into_iter().map(|cell| cell.name).collect())
    }

    fn plan(&self, spec: &TestSpecification) -> MatrixResult<Vec<PlannedCell>> {
        spec.validate()?;
        let kinds = spec.unique_container_kinds();
        let strategies = spec.unique_strategies();

        let mut plan = Vec::with_capacity(kinds.len() * strategies.len());
        let mut names = HashSet::new();
        for container in kinds {
            let descriptor = ApplicationDescriptor::new(spec.packaging, container);
            for kind in &strategies {
                let strategy = self.registry.strategy_for(&spec.name, kind, &descriptor)?;
                let name = format!(
                    "{}: {}",
                    container.capitalized(),
                    strategy.describe(spec.packaging)
                );
                if !names.insert(name.clone()) {
                    return Err(MatrixError::configuration(
                        &spec.name,
                        format!("two launcher strategies produce the display name `{name}`"),
                    ));
                }
                plan.push(PlannedCell {
                    name,
                    descriptor,
                    strategy: strategy.clone(),
                });
            }
        }
        Ok(plan)
    }
}

use std::any::{Any, TypeId};

use crate::{
    client::{LauncherClient, RetryPolicy},
    launcher::SharedLauncher,
    matrix::types::{ApplicationDescriptor, CacheKey, LauncherStrategyKind},
};

/// One matrix cell as seen by a test: a display name plus a cached launcher.
///
/// The context owns nothing; its launcher belongs to the cache and is
/// destroyed at suite teardown.
///
/// Tests obtain collaborators by type through [`resolve`](Self::resolve):
///
/// | Requested type     | Result                                   |
/// |--------------------|------------------------------------------|
/// | [`SharedLauncher`] | the cell's launcher                      |
/// | [`LauncherClient`] | client bound to the launcher's live port |
/// | anything else      | `None` (declined)                        |
#[derive(Debug, Clone)]
pub struct TestExecutionContext {
    name: String,
    descriptor: ApplicationDescriptor,
    strategy: LauncherStrategyKind,
    launcher: SharedLauncher,
    retry: RetryPolicy,
    request_timeout: std::time::Duration,
}

impl TestExecutionContext {
    pub(crate) fn new(
        name: String,
        descriptor: ApplicationDescriptor,
        strategy: LauncherStrategyKind,
        launcher: SharedLauncher,
        retry: RetryPolicy,
        request_timeout: std::time::Duration,
    ) -> Self {
        Self {
            name,
            descriptor,
            strategy,
            launcher,
            retry,
            request_timeout,
        }
    }

    /// `"<Container>: <strategy description>"`, e.g. `"Tomcat: packaged jar"`.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> ApplicationDescriptor {
        self.descriptor
    }

    pub fn strategy(&self) -> &LauncherStrategyKind {
        &self.strategy
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.descriptor, &self.strategy)
    }

    pub fn launcher(&self) -> &SharedLauncher {
        &self.launcher
    }

    /// A fresh client bound to this cell's launcher.
    pub fn client(&self) -> LauncherClient {
        LauncherClient::new(self.launcher.clone(), self.retry).with_timeout(self.request_timeout)
    }

    /// Whether [`resolve`](Self::resolve) offers a `T`.
    pub fn supports<T: Any>(&self) -> bool {
        Self::offers(TypeId::of::<T>())
    }

    /// Resolve a test-scoped capability by type; unsupported types are
    /// declined with `None`.
    pub fn resolve<T: Any>(&self) -> Option<T> {
        let requested = TypeId::of::<T>();
        let boxed: Box<dyn Any> = if requested == TypeId::of::<SharedLauncher>() {
            Box::new(self.launcher.clone())
        } else if requested == TypeId::of::<LauncherClient>() {
            Box::new(self.client())
        } else {
            crate::trace!("{}: declined capability {}", self.name, std::any::type_name::<T>());
            return None;
        };
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    fn offers(requested: TypeId) -> bool {
        requested == TypeId::of::<SharedLauncher>() || requested == TypeId::of::<LauncherClient>()
    }
}

impl std::fmt::Display for TestExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

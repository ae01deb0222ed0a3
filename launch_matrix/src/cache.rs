//! Launcher Cache
//! ==============
//!
//! Keyed store of live launchers. For every [`CacheKey`] there is at most one
//! launcher at any time.
//!
//! ## Locking
//! * The map lock is held only long enough to fetch or insert the per-key
//!   *slot*.
//! * Each slot has its own mutex; construction happens while holding it, so
//!   concurrent resolves of one key build exactly one launcher while
//!   unrelated keys construct in parallel.
//!
//! ## Generations
//! [`drain`](LauncherCache::drain) closes the cache for good. A construction
//! that was already running when the cache closed destroys its new launcher
//! instead of publishing it, so nothing escapes teardown.

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    error::{MatrixError, MatrixResult},
    launcher::SharedLauncher,
    matrix::types::{ApplicationDescriptor, CacheKey},
    temp_root::SharedTempRoot,
};

type Slot = Arc<Mutex<Option<SharedLauncher>>>;

#[derive(Debug)]
pub struct LauncherCache {
    root: Arc<SharedTempRoot>,
    dir_prefix: String,
    slots: Mutex<HashMap<CacheKey, Slot>>,
    closed: AtomicBool,
    constructed: AtomicUsize,
}

impl LauncherCache {
    pub fn new(root: Arc<SharedTempRoot>, dir_prefix: impl Into<String>) -> Self {
        Self {
            root,
            dir_prefix: dir_prefix.into(),
            slots: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            constructed: AtomicUsize::new(0),
        }
    }

    /// Return the launcher for `key`, building it with `construct` on a miss.
    ///
    /// `construct` receives the key's descriptor and a fresh directory below
    /// the shared temp root. Its failure is wrapped in
    /// [`MatrixError::Construction`] and leaves no trace in the cache.
    pub fn resolve<F>(&self, key: &CacheKey, construct: F) -> MatrixResult<SharedLauncher>
    where
        F: FnOnce(ApplicationDescriptor, &Path) -> MatrixResult<SharedLauncher>,
    {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| MatrixError::poisoned("launcher cache"))?;
            if self.is_closed() {
                return Err(MatrixError::CacheClosed);
            }
            slots.entry(key.clone()).or_default().clone()
        };

        // A panicking constructor leaves the slot empty, which is consistent.
        let mut entry = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(launcher) = entry.as_ref() {
            crate::debug!("Launcher cache hit for {key}");
            return Ok(launcher.clone());
        }

        let working_dir = self
            .root
            .create_launcher_dir(&self.dir_prefix, key)
            .map_err(|e| MatrixError::construction(key, e))?;

        let launcher = match construct(key.descriptor(), &working_dir) {
            Ok(launcher) => launcher,
            Err(e) => {
                crate::error!("Failed to construct launcher for {key}: {e}");
                if let Err(cleanup) = std::fs::remove_dir_all(&working_dir) {
                    crate::warn!(
                        "Could not remove {} after failed construction: {cleanup}",
                        working_dir.display()
                    );
                }
                return Err(MatrixError::construction(key, e));
            }
        };

        if self.is_closed() {
            crate::warn!("Launcher cache closed while constructing {key}; destroying it");
            if let Err(e) = launcher.destroy() {
                crate::error!("Failed to destroy late launcher {key}: {e}");
            }
            return Err(MatrixError::CacheClosed);
        }

        self.constructed.fetch_add(1, Ordering::SeqCst);
        crate::info!(
            "Constructed launcher {key} in {}",
            launcher.working_dir().display()
        );
        *entry = Some(launcher.clone());
        Ok(launcher)
    }

    /// Already-constructed launcher for `key`, without constructing.
    pub fn get(&self, key: &CacheKey) -> Option<SharedLauncher> {
        let slot = self.slots.lock().ok()?.get(key)?.clone();
        let entry = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entry.clone()
    }

    /// Empty the cache, close it, and hand back every live launcher.
    pub fn drain(&self) -> Vec<(CacheKey, SharedLauncher)> {
        let slots = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *slots)
        };

        let mut drained: Vec<(CacheKey, SharedLauncher)> = slots
            .into_iter()
            .filter_map(|(key, slot)| {
                // Waits for any construction still holding the slot.
                let launcher = slot
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take()?;
                Some((key, launcher))
            })
            .collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        crate::debug!("Drained {} launcher(s) from cache", drained.len());
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of launchers currently held.
    pub fn len(&self) -> usize {
        let Ok(slots) = self.slots.lock() else {
            return 0;
        };
        slots
            .values()
            .filter(|slot| {
                slot.lock()
                    .map(|entry| entry.is_some())
                    .unwrap_or_default()
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful constructions over the cache's lifetime.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn temp_root(&self) -> &SharedTempRoot {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        launcher::{Launcher, LauncherState},
        matrix::types::{ContainerKind, Packaging},
    };

    #[derive(Debug)]
    struct Inert(PathBuf);

    impl Launcher for Inert {
        fn start(&self) -> MatrixResult<()> {
            Ok(())
        }
        fn http_port(&self) -> Option<u16> {
            None
        }
        fn state(&self) -> LauncherState {
            LauncherState::Unstarted
        }
        fn working_dir(&self) -> &Path {
            &self.0
        }
        fn destroy(&self) -> MatrixResult<()> {
            Ok(())
        }
    }

    fn inert(_: ApplicationDescriptor, dir: &Path) -> MatrixResult<SharedLauncher> {
        Ok(Arc::new(Inert(dir.to_path_buf())))
    }

    fn cache() -> LauncherCache {
        let root = SharedTempRoot::new("cache-unit", None).unwrap();
        LauncherCache::new(Arc::new(root), "app-launcher")
    }

    fn key(strategy: &str) -> CacheKey {
        CacheKey {
            container: ContainerKind::Jetty,
            packaging: Packaging::War,
            strategy: strategy.into(),
        }
    }

    #[test]
    fn failed_construction_is_not_cached() {
        let cache = cache();
        let err = cache
            .resolve(&key("x"), |_, _| Err(MatrixError::Internal("boom".into())))
            .unwrap_err();
        assert!(matches!(err, MatrixError::Construction { .. }));
        assert!(cache.get(&key("x")).is_none());
        assert_eq!(cache.len(), 0);

        let launcher = cache.resolve(&key("x"), inert).unwrap();
        assert!(launcher.working_dir().is_dir());
        assert_eq!(cache.constructed(), 1);
        cache.temp_root().remove().unwrap();
    }

    #[test]
    fn closed_after_drain() {
        let cache = cache();
        cache.resolve(&key("x"), inert).unwrap();
        cache.resolve(&key("y"), inert).unwrap();
        assert_eq!(cache.len(), 2);

        let drained = cache.drain();
        assert_eq!(drained.len(), 2);
        assert!(cache.is_closed());
        assert!(cache.is_empty());
        assert!(matches!(
            cache.resolve(&key("x"), inert),
            Err(MatrixError::CacheClosed)
        ));
        assert!(cache.drain().is_empty());
        cache.temp_root().remove().unwrap();
    }
}

//! Shared Temp Root
//! ================
//!
//! One process-wide scratch directory per orchestrator. Every launcher gets a
//! private, uniquely named subdirectory below it; the whole tree is removed
//! once, at teardown.
//!
//! ```text
//! $TMPDIR/embedded-server-testsXXXXXX/
//! ├── app-launcher-tomcat_jar_packaged-<uuid>/
//! │   ├── server.port
//! │   └── stdout.log
//! └── app-launcher-jetty_jar_exploded-<uuid>/
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tempfile::TempDir;

use crate::{
    error::{MatrixError, MatrixResult},
    matrix::types::CacheKey,
};

#[derive(Debug)]
pub struct SharedTempRoot {
    path: PathBuf,
    dir: Mutex<Option<TempDir>>,
}

impl SharedTempRoot {
    /// Create the root under `parent`, or under the system temp dir.
    pub fn new(prefix: &str, parent: Option<&Path>) -> MatrixResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MatrixError::file_system("create temp parent", parent, e))?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| {
            MatrixError::file_system(
                "create temp root",
                parent.map_or_else(std::env::temp_dir, Path::to_path_buf),
                e,
            )
        })?;

        let path = dir.path().to_path_buf();
        crate::debug!("Created shared temp root {}", path.display());
        Ok(Self {
            path,
            dir: Mutex::new(Some(dir)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create a fresh, collision-free directory for one launcher.
    pub fn create_launcher_dir(&self, prefix: &str, key: &CacheKey) -> MatrixResult<PathBuf> {
        let name = sanitize_filename::sanitize_with_options(
            format!("{prefix}-{key}-{}", uuid::Uuid::new_v4()),
            sanitize_filename::Options {
                replacement: "_",
                ..Default::default()
            },
        );
        let dir = self.path.join(name);
        // `create_dir`, not `create_dir_all`: an existing directory is a collision.
        std::fs::create_dir(&dir)
            .map_err(|e| MatrixError::file_system("create launcher dir", &dir, e))?;
        Ok(dir)
    }

    /// Recursively delete the root. Returns `false` if it was already removed.
    pub fn remove(&self) -> MatrixResult<bool> {
        let dir = self
            .dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match dir {
            Some(dir) => {
                dir.close()
                    .map_err(|e| MatrixError::file_system("remove temp root", &self.path, e))?;
                crate::debug!("Removed shared temp root {}", self.path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

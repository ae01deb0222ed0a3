//! Suite file
//! ==========
//!
//! JSON description of a whole matrix run, used by `launch-matrix-cli`:
//!
//! ```json
//! {
//!   "specification": {
//!     "name": "smoke",
//!     "packaging": "jar",
//!     "launcher_strategies": ["packaged"]
//!   },
//!   "strategies": [
//!     { "kind": "packaged", "description": "packaged {packaging}",
//!       "program": "java", "args": ["-jar", "app-{container}.jar"] }
//!   ],
//!   "config": { "retry": { "max_attempts": 30, "delay": { "secs": 1, "nanos": 0 } } }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    config::MatrixConfig,
    error::{MatrixError, MatrixResult},
    launcher::{CommandStrategy, LauncherRegistry},
    matrix::spec::TestSpecification,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteFile {
    pub specification: TestSpecification,

    #[serde(default)]
    pub strategies: Vec<CommandStrategy>,

    /// Orchestrator settings; environment overrides apply when absent.
    #[serde(default)]
    pub config: Option<MatrixConfig>,
}

impl SuiteFile {
    pub fn load(path: &Path) -> MatrixResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MatrixError::file_system("read suite file", path, e))?;
        Self::from_json(&raw).map_err(|e| match e {
            MatrixError::InvalidConfig { reason, .. } => MatrixError::InvalidConfig {
                field: "suite file",
                reason: format!("{}: {reason}", path.display()),
            },
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> MatrixResult<Self> {
        serde_json::from_str(raw).map_err(|e| MatrixError::InvalidConfig {
            field: "suite file",
            reason: e.to_string(),
        })
    }

    pub fn registry(&self) -> LauncherRegistry {
        let mut registry = LauncherRegistry::new();
        for strategy in &self.strategies {
            registry.register(strategy.clone());
        }
        registry
    }

    pub fn config(&self) -> MatrixConfig {
        self.config.clone().unwrap_or_else(MatrixConfig::from_env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::types::Packaging;

    const SUITE: &str = r#"{
        "specification": {
            "name": "smoke",
            "container_kinds": ["jetty", "tomcat"],
            "packaging": "war",
            "launcher_strategies": ["packaged", "exploded"]
        },
        "strategies": [
            { "kind": "packaged", "description": "packaged {packaging}", "program": "java" },
            { "kind": "exploded", "description": "exploded {packaging}", "program": "java",
              "args": ["-cp", "{working_dir}"], "packagings": ["war"] }
        ]
    }"#;

    #[test]
    fn parses_and_builds_registry() {
        let suite = SuiteFile::from_json(SUITE).unwrap();
        assert_eq!(suite.specification.packaging, Packaging::War);
        assert_eq!(suite.strategies.len(), 2);
        assert!(suite.config.is_none());

        let registry = suite.registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&"exploded".into()).is_some());
    }

    #[test]
    fn malformed_json_is_invalid_config() {
        assert!(matches!(
            SuiteFile::from_json("{ not json"),
            Err(MatrixError::InvalidConfig { field: "suite file", .. })
        ));
    }

    #[test]
    fn missing_file_is_file_system_error() {
        let missing = Path::new("/definitely/not/here/suite.json");
        assert!(matches!(
            SuiteFile::load(missing),
            Err(MatrixError::FileSystem { .. })
        ));
    }
}

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MatrixError, MatrixResult},
    matrix::types::{ContainerKind, LauncherStrategyKind, Packaging},
};

fn default_container_kinds() -> Vec<ContainerKind> {
    ContainerKind::ALL.to_vec()
}

/// Declares which cells of the matrix a test suite wants.
///
/// One packaging, a set of container kinds (all of them unless narrowed) and a
/// non-empty set of launcher strategies. Duplicates are ignored; the first
/// occurrence decides the enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct TestSpecification {
    /// Label used in error messages, usually the test suite name.
    #[builder(into)]
    pub name: String,

    #[builder(default = default_container_kinds())]
    #[serde(default = "default_container_kinds")]
    pub container_kinds: Vec<ContainerKind>,

    pub packaging: Packaging,

    #[builder(with = |strategies: impl IntoIterator<Item = impl Into<LauncherStrategyKind>>| {
        strategies.into_iter().map(Into::into).collect()
    })]
    pub launcher_strategies: Vec<LauncherStrategyKind>,
}

impl TestSpecification {
    /// Reject specifications that cannot produce a single cell.
    pub fn validate(&self) -> MatrixResult<()> {
        if self.launcher_strategies.is_empty() {
            return Err(MatrixError::configuration(
                &self.name,
                "at least one launcher strategy must be declared",
            ));
        }
        if self.container_kinds.is_empty() {
            return Err(MatrixError::configuration(
                &self.name,
                "at least one container kind must be supported",
            ));
        }
        Ok(())
    }

    pub fn unique_container_kinds(&self) -> Vec<ContainerKind> {
        dedup(&self.container_kinds)
    }

    pub fn unique_strategies(&self) -> Vec<LauncherStrategyKind> {
        dedup(&self.launcher_strategies)
    }
}

fn dedup<T: Clone + PartialEq>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

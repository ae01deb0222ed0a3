//! Matrix – Value Types
//! ====================
//!
//! Small, immutable value objects that make up one matrix cell:
//!
//! ```text
//! ContainerKind ─┐
//!                ├─→ ApplicationDescriptor ─┐
//! Packaging ─────┘                          ├─→ CacheKey
//! LauncherStrategyKind ─────────────────────┘
//! ```
//!
//! `CacheKey` is the identity the launcher cache deduplicates on; two cells
//! that share all three components share one external process.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Embedded server container the test application is built against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Jetty,
    Tomcat,
    Undertow,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 3] = [
        ContainerKind::Jetty,
        ContainerKind::Tomcat,
        ContainerKind::Undertow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Jetty => "jetty",
            ContainerKind::Tomcat => "tomcat",
            ContainerKind::Undertow => "undertow",
        }
    }

    /// `"tomcat"` → `"Tomcat"`; used as the prefix of every display name.
    pub fn capitalized(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainerKind {
    type Err = crate::error::MatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContainerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::MatrixError::InvalidConfig {
                field: "container_kind",
                reason: format!("unknown container kind `{s}`"),
            })
    }
}

/// How the test application artefact is bundled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
    Jar,
    War,
}

impl Packaging {
    pub fn as_str(&self) -> &'static str {
        match self {
            Packaging::Jar => "jar",
            Packaging::War => "war",
        }
    }
}

impl fmt::Display for Packaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical application a launcher runs: one packaging on one container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub packaging: Packaging,
    pub container: ContainerKind,
}

impl ApplicationDescriptor {
    pub fn new(packaging: Packaging, container: ContainerKind) -> Self {
        Self {
            packaging,
            container,
        }
    }
}

impl fmt::Display for ApplicationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container, self.packaging)
    }
}

/// Identifies *how* a process is launched, e.g. `"packaged"` or `"exploded"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct LauncherStrategyKind(pub String);

impl LauncherStrategyKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LauncherStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LauncherStrategyKind {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LauncherStrategyKind {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of one cached launcher.
///
/// Displayed as `container:packaging:strategy`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub container: ContainerKind,
    pub packaging: Packaging,
    pub strategy: LauncherStrategyKind,
}

impl CacheKey {
    pub fn new(descriptor: &ApplicationDescriptor, strategy: &LauncherStrategyKind) -> Self {
        Self {
            container: descriptor.container,
            packaging: descriptor.packaging,
            strategy: strategy.clone(),
        }
    }

    pub fn descriptor(&self) -> ApplicationDescriptor {
        ApplicationDescriptor::new(self.packaging, self.container)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.container, self.packaging, self.strategy)
    }
}

//! launch_matrix – run one test suite against every server container × launch style
//! ===============================================================================
//!
//! ## What it does
//! - **Matrix generation** – A [`TestSpecification`] names the containers, one
//!   packaging and the launch strategies; [`MatrixGenerator`] expands it into
//!   one named [`TestExecutionContext`] per (container × strategy) pair.
//! - **Cached launchers** – Cells that share container, packaging and strategy
//!   share one external server process through the [`LauncherCache`].
//!   Processes start lazily, on the first request.
//! - **Late port binding** – [`LauncherClient`] looks up the launcher's port on
//!   every request and retries while the server is still coming up.
//! - **Guaranteed cleanup** – [`MatrixOrchestrator::teardown`] destroys every
//!   launcher exactly once and removes the shared temp directory, even when
//!   some launchers fail to stop.
//!
//! ---
//!
//! ```rust,no_run
//! use launch_matrix::*;
//!
//! fn main() -> MatrixResult<()> {
//!     let registry = LauncherRegistry::new().with(
//!         CommandStrategy::builder()
//!             .kind("packaged")
//!             .description("packaged {packaging}")
//!             .program("java")
//!             .args(["-jar", "build/app-{container}.{packaging}"])
//!             .build(),
//!     );
//!     let orchestrator = MatrixOrchestrator::new(registry, MatrixConfig::default())?;
//!
//!     let spec = TestSpecification::builder()
//!         .name("home_page")
//!         .packaging(Packaging::Jar)
//!         .launcher_strategies(["packaged"])
//!         .build();
//!
//!     for cell in orchestrator.contexts(&spec)? {
//!         let client: LauncherClient = cell.resolve().expect("client capability");
//!         let res = client.get("/")?;
//!         println!("{cell}: HTTP {}", res.status);
//!     }
//!
//!     println!("{}", orchestrator.teardown());
//!     Ok(())
//! }
//! ```
//!
//! ---
//!
//! ## How It Works
//!
//! ```text
//! TestSpecification
//!       │
//!       ├─→ MatrixGenerator        (plans & validates every cell)
//!       │         ↓
//!       ├─→ LauncherCache          (one launcher per CacheKey, per-key locking)
//!       │         ↓
//!       ├─→ TestExecutionContext   (name + launcher + capabilities)
//!       │         ↓
//!       └─→ LauncherClient         (port resolved per request, bounded retry)
//!
//! MatrixOrchestrator::teardown → drain cache → destroy all → remove temp root
//! ```

#[allow(unused_imports)]
use tracing::{Level, debug, error, info, span, trace, warn};

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod matrix;
pub mod orchestrator;
pub mod suite;
pub mod temp_root;

pub use cache::LauncherCache;
pub use client::{ClientError, ClientResponse, LauncherClient, Method, RetryOutcome, RetryPolicy};
pub use config::MatrixConfig;
pub use error::{MatrixError, MatrixResult};
#[cfg(unix)]
pub use launcher::process::pid_alive;
pub use launcher::{
    process::{ProcessError, ProcessGuard},
    *,
};
pub use logging::{LoggingConfig, init_test_logging};
pub use matrix::*;
pub use orchestrator::*;
pub use suite::SuiteFile;
pub use temp_root::SharedTempRoot;

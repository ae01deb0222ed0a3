//! Matrix
//! ======
//!
//! Everything needed to turn a [`TestSpecification`] into named test
//! executions: the value types of a cell, the specification itself, the
//! generator and the per-cell context handed to tests.

pub mod context;
pub mod generator;
pub mod spec;
pub mod types;

pub use context::*;
pub use generator::*;
pub use spec::*;
pub use types::*;

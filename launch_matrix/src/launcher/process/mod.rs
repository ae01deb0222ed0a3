pub mod error;
pub mod guard;

pub use error::*;
pub use guard::*;

const POLITE_WAIT: std::time::Duration = std::time::Duration::from_secs(2);
const FORCE_KILL_TIMEOUT_SECS: u64 = 1;

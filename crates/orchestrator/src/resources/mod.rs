//! RAII resource guards.
//!
//! - [`RunGuard`] - At most one in-process orchestration per project slug

mod run_guard;

pub use run_guard::{RunGuard, RunLease};

//! Task registry and lifecycle bookkeeping.

mod janitor;
#[allow(clippy::module_inception)]
mod registry;
mod types;

pub use janitor::{Janitor, SweepStats};
pub use registry::{RegistryError, TaskRegistry};
pub use types::{
    FailureKind, StageTiming, Task, TaskFailure, TaskKind, TaskResult, TaskStatus,
};

//! Backend capability adapters consumed by the tool dispatcher: SSH command
//! execution, Docker and Kubernetes pass-through CLI control, and local log
//! tails. None of these re-implement their underlying protocols; they wrap
//! the system `docker`/`kubectl` binaries or a pooled SSH session and report
//! failures as one shared [`AdapterError`] taxonomy.

pub mod docker;
pub mod error;
pub mod k8s;
pub mod logs;
pub mod pool;
mod process;
pub mod ssh;

pub use error::{AdapterError, AdapterErrorKind};
pub use process::{run_with_timeout, run_with_timeout_env, CommandOutput};

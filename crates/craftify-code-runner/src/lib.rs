//! Craftify Code Runner
//!
//! Executes a Lua snippet supplied from configuration and reports whether it
//! finished or faulted, together with everything it printed.
//!
//! Each run gets a fresh interpreter on its own thread, seeded only with the
//! caller's environment mapping and the side-effect free standard libraries.
//! Faults in the snippet (syntax errors, runtime errors, exceeded limits, even
//! a panic inside the interpreter) are contained and surface as
//! [`RunStatus::Failure`], never as a crash of the calling process.
//!
//! This isolates faults; it is not a hardened sandbox for hostile code.

mod error;
mod outcome;
mod request;
mod runner;

pub use error::RunnerError;
pub use outcome::{RunOutcome, RunStatus};
pub use request::{CodeRunRequest, DEFAULT_TASK_CODE, TASK_CODE_VAR, TASK_ENV_PREFIX};
pub use runner::{CodeRunner, RunnerConfig};

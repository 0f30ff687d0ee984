//! Craftify Runtime
//!
//! This crate executes a [`Workflow`](craftify_workflow::Workflow) once per
//! [`RunContext`].
//!
//! # Architecture
//!
//! ```text
//! WorkflowRuntime
//! └── execute(&RunContext) -> RunReport
//!     ├── classify waiting tasks in topological order
//!     │   (ready / excluded by branch / excluded by failure)
//!     ├── run the ready wave concurrently on tokio tasks
//!     └── record Completed / Failed, validate branch selections
//!
//! RunContext
//! ├── DataChannel         - values published by task bodies
//! └── outcomes            - task_id -> TaskOutcome, inspectable after the run
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use craftify_runtime::{RunContext, WorkflowRuntime};
//!
//! let runtime = WorkflowRuntime::new(workflow);
//! let ctx = RunContext::new();
//! let report = runtime.execute(&ctx).await?;
//!
//! assert!(ctx.outcome("end").unwrap().state.is_completed());
//! ```

mod context;
mod error;
mod events;
mod execution;
mod report;
mod runtime;

pub use context::{ExclusionReason, RunContext, TaskOutcome, TaskState};
pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use report::RunReport;
pub use runtime::{RuntimeConfig, WorkflowRuntime};

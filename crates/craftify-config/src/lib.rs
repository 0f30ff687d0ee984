//! Craftify Config
//!
//! Serializable workflow definitions. These describe a workflow before it is
//! resolved into executable task bodies by `craftify-resolver`.
//!
//! Definitions are usually loaded from JSON files passed to the CLI.

mod task;
mod workflow;

pub use task::{TaskDef, TaskType};
pub use workflow::WorkflowDef;

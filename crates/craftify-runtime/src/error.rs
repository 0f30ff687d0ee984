//! Runtime errors.
//!
//! Only configuration problems surface here. A failing task body is recorded
//! as [`TaskState::Failed`](crate::TaskState::Failed) and never aborts the run.

use craftify_workflow::Selection;

/// Errors that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// A branch picked tasks that are not its direct successors.
  #[error("branch task '{task_id}' selected tasks that are not its successors: {invalid:?}")]
  InvalidSelection { task_id: String, invalid: Selection },

  /// A plain task returned a selection.
  #[error("plain task '{task_id}' returned a branch selection")]
  UnexpectedSelection { task_id: String },

  /// A branch task finished without choosing any successors.
  #[error("branch task '{task_id}' returned no selection")]
  MissingSelection { task_id: String },

  /// The run context already holds outcomes from an earlier run.
  #[error("run context '{run_id}' was already used for a run")]
  ContextReused { run_id: String },
}

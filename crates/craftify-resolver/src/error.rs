use craftify_workflow::WorkflowError;
use thiserror::Error;

/// Errors that can occur during workflow resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A handler task names a handler that was never registered.
  #[error("task '{task_id}' uses unknown handler '{handler}'")]
  UnknownHandler { task_id: String, handler: String },

  /// The resolved graph failed validation.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}

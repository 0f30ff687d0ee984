use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("duplicate task id: {0}")]
  DuplicateTask(String),

  #[error("task '{task_id}' depends on unknown task '{predecessor}'")]
  UnknownPredecessor {
    task_id: String,
    predecessor: String,
  },

  #[error("cycle detected in task graph involving '{0}'")]
  CycleDetected(String),
}

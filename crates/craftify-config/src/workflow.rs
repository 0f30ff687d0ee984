use serde::{Deserialize, Serialize};

use crate::task::TaskDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  #[serde(default)]
  pub name: String,
  pub tasks: Vec<TaskDef>,
}

impl WorkflowDef {
  pub fn task(&self, task_id: &str) -> Option<&TaskDef> {
    self.tasks.iter().find(|t| t.task_id == task_id)
  }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::{TaskOutcome, TaskState};

/// Terminal states of every task after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  pub run_id: String,
  pub workflow_id: String,
  pub outcomes: BTreeMap<String, TaskOutcome>,
}

impl RunReport {
  pub fn state(&self, task_id: &str) -> Option<&TaskState> {
    self.outcomes.get(task_id).map(|o| &o.state)
  }

  pub fn completed(&self) -> Vec<&str> {
    self.filter(TaskState::is_completed)
  }

  pub fn excluded(&self) -> Vec<&str> {
    self.filter(TaskState::is_excluded)
  }

  pub fn failed(&self) -> Vec<&str> {
    self.filter(TaskState::is_failed)
  }

  pub fn has_failures(&self) -> bool {
    self.outcomes.values().any(|o| o.state.is_failed())
  }

  /// Task id -> state, for comparing two runs.
  pub fn states(&self) -> BTreeMap<&str, &TaskState> {
    self
      .outcomes
      .iter()
      .map(|(id, o)| (id.as_str(), &o.state))
      .collect()
  }

  fn filter(&self, pred: impl Fn(&TaskState) -> bool) -> Vec<&str> {
    self
      .outcomes
      .iter()
      .filter(|(_, o)| pred(&o.state))
      .map(|(id, _)| id.as_str())
      .collect()
  }
}

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use craftify_channel::DataChannel;
use craftify_workflow::{Selection, TaskContext};
use serde::{Deserialize, Serialize};

/// Why a task was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
  /// A branch pruned it, directly or through every path leading to it.
  Branch,
  /// An upstream task failed.
  Failure,
}

/// Terminal state of a task within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
  Completed,
  Excluded { reason: ExclusionReason },
  Failed { error: String },
}

impl TaskState {
  pub fn is_completed(&self) -> bool {
    matches!(self, Self::Completed)
  }

  pub fn is_excluded(&self) -> bool {
    matches!(self, Self::Excluded { .. })
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, Self::Failed { .. })
  }
}

/// What happened to a single task in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
  pub task_id: String,
  #[serde(flatten)]
  pub state: TaskState,
  /// Successors chosen, for completed branch tasks only.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub selection: Option<Selection>,
}

impl TaskOutcome {
  pub(crate) fn completed(task_id: &str, selection: Option<Selection>) -> Self {
    Self {
      task_id: task_id.to_string(),
      state: TaskState::Completed,
      selection,
    }
  }

  pub(crate) fn excluded(task_id: &str, reason: ExclusionReason) -> Self {
    Self {
      task_id: task_id.to_string(),
      state: TaskState::Excluded { reason },
      selection: None,
    }
  }

  pub(crate) fn failed(task_id: &str, error: impl Into<String>) -> Self {
    Self {
      task_id: task_id.to_string(),
      state: TaskState::Failed {
        error: error.into(),
      },
      selection: None,
    }
  }
}

/// State owned by one execution of a workflow.
///
/// Create a fresh context per run. It carries the data channel the task
/// bodies share and records every task's outcome as soon as it settles.
#[derive(Debug)]
pub struct RunContext {
  run_id: String,
  channel: DataChannel,
  outcomes: RwLock<HashMap<String, TaskOutcome>>,
  started: AtomicBool,
}

impl RunContext {
  pub fn new() -> Self {
    Self::with_run_id(uuid::Uuid::new_v4().to_string())
  }

  pub fn with_run_id(run_id: impl Into<String>) -> Self {
    Self {
      run_id: run_id.into(),
      channel: DataChannel::new(),
      outcomes: RwLock::new(HashMap::new()),
      started: AtomicBool::new(false),
    }
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn channel(&self) -> &DataChannel {
    &self.channel
  }

  /// Outcome of a task, if it has settled.
  pub fn outcome(&self, task_id: &str) -> Option<TaskOutcome> {
    self
      .outcomes
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(task_id)
      .cloned()
  }

  /// Copy of every recorded outcome.
  pub fn outcomes(&self) -> HashMap<String, TaskOutcome> {
    self
      .outcomes
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  /// Claim the context for a run. Returns `false` if it was already claimed.
  pub(crate) fn start(&self) -> bool {
    !self.started.swap(true, Ordering::SeqCst)
  }

  pub(crate) fn record(&self, outcome: TaskOutcome) {
    self
      .outcomes
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(outcome.task_id.clone(), outcome);
  }

  /// Context handed to a task body.
  pub(crate) fn task_context(&self, task_id: &str) -> TaskContext {
    TaskContext::new(self.run_id.clone(), task_id, &self.channel)
  }
}

impl Default for RunContext {
  fn default() -> Self {
    Self::new()
  }
}

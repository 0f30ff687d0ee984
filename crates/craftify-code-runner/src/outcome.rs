use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Success,
  Failure,
}

/// Result of one code run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
  pub status: RunStatus,
  /// Everything the snippet printed, including output produced before a fault.
  pub captured_output: String,
  /// Present exactly when `status` is `Failure`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
  #[serde(skip)]
  pub duration: Duration,
}

impl RunOutcome {
  pub(crate) fn success(captured_output: String, duration: Duration) -> Self {
    Self {
      status: RunStatus::Success,
      captured_output,
      error_message: None,
      duration,
    }
  }

  pub(crate) fn failure(captured_output: String, error: String, duration: Duration) -> Self {
    Self {
      status: RunStatus::Failure,
      captured_output,
      error_message: Some(error),
      duration,
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == RunStatus::Success
  }

  /// Process exit status for this outcome.
  pub fn exit_code(&self) -> i32 {
    match self.status {
      RunStatus::Success => 0,
      RunStatus::Failure => 1,
    }
  }
}

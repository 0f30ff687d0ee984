//! Execution events and notifiers for observability.
//!
//! Events are emitted during a run so callers can observe progress, persist
//! history, or stream state to a UI.

use craftify_workflow::Selection;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::context::ExclusionReason;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  RunStarted {
    run_id: String,
    workflow_id: String,
  },

  TaskStarted {
    run_id: String,
    task_id: String,
  },

  TaskCompleted {
    run_id: String,
    task_id: String,
    selection: Option<Selection>,
  },

  TaskExcluded {
    run_id: String,
    task_id: String,
    reason: ExclusionReason,
  },

  TaskFailed {
    run_id: String,
    task_id: String,
    error: String,
  },

  /// Every task settled.
  RunCompleted { run_id: String },

  /// The run was aborted by a configuration error.
  RunFailed { run_id: String, error: String },
}

/// Receives execution events.
///
/// The runtime calls `notify` for each event; implementations decide what to
/// do with them.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls the run; volume is a handful of
  // events per task.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

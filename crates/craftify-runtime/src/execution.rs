//! Graph traversal for a single run.

use std::collections::HashMap;

use craftify_workflow::{Selection, TaskKind, Workflow};
use tracing::{Instrument, error, info, info_span};

use crate::context::{ExclusionReason, RunContext, TaskOutcome, TaskState};
use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::report::RunReport;
use crate::runtime::RuntimeConfig;

/// Verdict for a task whose predecessors have all settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
  Run,
  Exclude(ExclusionReason),
}

pub(crate) struct Execution<'a, N: ExecutionNotifier> {
  workflow: &'a Workflow,
  config: &'a RuntimeConfig,
  notifier: &'a N,
  ctx: &'a RunContext,
  settled: HashMap<String, TaskOutcome>,
}

impl<'a, N: ExecutionNotifier> Execution<'a, N> {
  pub(crate) fn new(
    workflow: &'a Workflow,
    config: &'a RuntimeConfig,
    notifier: &'a N,
    ctx: &'a RunContext,
  ) -> Self {
    Self {
      workflow,
      config,
      notifier,
      ctx,
      settled: HashMap::with_capacity(workflow.len()),
    }
  }

  /// Run waves of ready tasks until nothing is left to run.
  pub(crate) async fn run(mut self) -> Result<RunReport, RuntimeError> {
    let wave_size = self.config.max_concurrent_tasks.max(1);

    loop {
      let ready = self.settle_waiting();
      if ready.is_empty() {
        break;
      }

      info!(
        run_id = %self.ctx.run_id(),
        ready_tasks = ?ready,
        "executing ready tasks"
      );

      for wave in ready.chunks(wave_size) {
        self.run_wave(wave).await?;
      }
    }

    Ok(RunReport {
      run_id: self.ctx.run_id().to_string(),
      workflow_id: self.workflow.workflow_id().to_string(),
      outcomes: self.settled.into_iter().collect(),
    })
  }

  /// Walk unsettled tasks parents-first, settling exclusions and returning
  /// the tasks that may run now.
  ///
  /// Exclusions recorded earlier in the walk are visible to later tasks, so
  /// pruning propagates down a chain in a single pass.
  fn settle_waiting(&mut self) -> Vec<String> {
    let workflow = self.workflow;
    let mut ready = Vec::new();

    for task_id in workflow.graph().topological_order() {
      if self.settled.contains_key(task_id) {
        continue;
      }
      match self.classify(task_id) {
        None => {}
        Some(Readiness::Run) => ready.push(task_id.clone()),
        Some(Readiness::Exclude(reason)) => self.settle(TaskOutcome::excluded(task_id, reason)),
      }
    }

    ready
  }

  /// Decide a task's fate, or `None` while some predecessor is unsettled.
  fn classify(&self, task_id: &str) -> Option<Readiness> {
    let upstream = self.workflow.graph().upstream(task_id);
    if upstream.is_empty() {
      return Some(Readiness::Run);
    }

    let mut outcomes = Vec::with_capacity(upstream.len());
    for predecessor in upstream {
      outcomes.push(self.settled.get(predecessor)?);
    }

    // Pruning by a branch predecessor is final, whatever the other paths did.
    let pruned = outcomes.iter().any(|o| {
      o.selection
        .as_ref()
        .is_some_and(|selection| !selection.contains(task_id))
    });
    if pruned {
      return Some(Readiness::Exclude(ExclusionReason::Branch));
    }

    let blocked = outcomes.iter().any(|o| {
      matches!(
        o.state,
        TaskState::Failed { .. }
          | TaskState::Excluded {
            reason: ExclusionReason::Failure
          }
      )
    });
    if blocked {
      return Some(Readiness::Exclude(ExclusionReason::Failure));
    }

    if outcomes.iter().any(|o| o.state.is_completed()) {
      Some(Readiness::Run)
    } else {
      Some(Readiness::Exclude(ExclusionReason::Branch))
    }
  }

  /// Spawn the task bodies of one wave and record their outcomes.
  async fn run_wave(&mut self, wave: &[String]) -> Result<(), RuntimeError> {
    let workflow = self.workflow;
    let mut started = Vec::with_capacity(wave.len());
    let mut handles = Vec::with_capacity(wave.len());

    for task_id in wave {
      let Some(node) = workflow.get_node(task_id) else {
        continue;
      };

      info!(run_id = %self.ctx.run_id(), task_id = %task_id, "task_started");
      self.notifier.notify(ExecutionEvent::TaskStarted {
        run_id: self.ctx.run_id().to_string(),
        task_id: task_id.clone(),
      });

      let span = info_span!("task_execute", run_id = %self.ctx.run_id(), task_id = %task_id);
      // Call the body inside the task: panics before the first await land in the JoinHandle.
      let body = node.body().clone();
      let task_ctx = self.ctx.task_context(task_id);
      handles.push(tokio::spawn(async move { body(task_ctx).await }.instrument(span)));
      started.push((task_id.as_str(), node.kind()));
    }

    let results = futures::future::join_all(handles).await;

    let mut first_error = None;
    for ((task_id, kind), result) in started.into_iter().zip(results) {
      let outcome = match result {
        Ok(Ok(selection)) => match self.check_selection(task_id, kind, selection) {
          Ok(selection) => TaskOutcome::completed(task_id, selection),
          Err(e) => {
            let outcome = TaskOutcome::failed(task_id, e.to_string());
            first_error.get_or_insert(e);
            outcome
          }
        },
        Ok(Err(task_error)) => TaskOutcome::failed(task_id, task_error.message),
        Err(join_error) if join_error.is_panic() => {
          TaskOutcome::failed(task_id, format!("task body panicked: {}", join_error))
        }
        Err(join_error) => TaskOutcome::failed(task_id, join_error.to_string()),
      };
      self.settle(outcome);
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Check a body's result against its task kind and declared successors.
  fn check_selection(
    &self,
    task_id: &str,
    kind: TaskKind,
    selection: Option<Selection>,
  ) -> Result<Option<Selection>, RuntimeError> {
    match (kind, selection) {
      (TaskKind::Plain, None) => Ok(None),
      (TaskKind::Plain, Some(_)) => Err(RuntimeError::UnexpectedSelection {
        task_id: task_id.to_string(),
      }),
      (TaskKind::Branch, None) => Err(RuntimeError::MissingSelection {
        task_id: task_id.to_string(),
      }),
      (TaskKind::Branch, Some(selection)) => {
        let graph = self.workflow.graph();
        let invalid: Selection = selection
          .iter()
          .filter(|successor| !graph.has_edge(task_id, successor))
          .cloned()
          .collect();
        if invalid.is_empty() {
          Ok(Some(selection))
        } else {
          Err(RuntimeError::InvalidSelection {
            task_id: task_id.to_string(),
            invalid,
          })
        }
      }
    }
  }

  /// Record a terminal state, log it and notify observers.
  fn settle(&mut self, outcome: TaskOutcome) {
    let run_id = self.ctx.run_id().to_string();
    let task_id = outcome.task_id.clone();

    let event = match &outcome.state {
      TaskState::Completed => {
        info!(run_id = %run_id, task_id = %task_id, selection = ?outcome.selection, "task_completed");
        ExecutionEvent::TaskCompleted {
          run_id,
          task_id: task_id.clone(),
          selection: outcome.selection.clone(),
        }
      }
      TaskState::Excluded { reason } => {
        info!(run_id = %run_id, task_id = %task_id, reason = ?reason, "task_excluded");
        ExecutionEvent::TaskExcluded {
          run_id,
          task_id: task_id.clone(),
          reason: *reason,
        }
      }
      TaskState::Failed { error } => {
        error!(run_id = %run_id, task_id = %task_id, error = %error, "task_failed");
        ExecutionEvent::TaskFailed {
          run_id,
          task_id: task_id.clone(),
          error: error.clone(),
        }
      }
    };

    self.notifier.notify(event);
    self.ctx.record(outcome.clone());
    self.settled.insert(task_id, outcome);
  }
}

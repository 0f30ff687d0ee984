use tracing::{error, info, instrument};

use craftify_workflow::Workflow;

use crate::context::RunContext;
use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::execution::Execution;
use crate::report::RunReport;

/// Configuration for the workflow runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Upper bound on task bodies running at the same time. `1` runs the graph
  /// sequentially in topological order.
  pub max_concurrent_tasks: usize,
}

impl RuntimeConfig {
  pub fn sequential() -> Self {
    Self {
      max_concurrent_tasks: 1,
    }
  }
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      max_concurrent_tasks: 16,
    }
  }
}

/// Executes one workflow, once per [`RunContext`].
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `WorkflowRuntime::new()` for a runtime that discards events, or
/// `WorkflowRuntime::with_notifier()` to observe them.
pub struct WorkflowRuntime<N: ExecutionNotifier = NoopNotifier> {
  workflow: Workflow,
  config: RuntimeConfig,
  notifier: N,
}

impl WorkflowRuntime<NoopNotifier> {
  pub fn new(workflow: Workflow) -> Self {
    Self::with_config(workflow, RuntimeConfig::default())
  }

  pub fn with_config(workflow: Workflow, config: RuntimeConfig) -> Self {
    Self::with_notifier(workflow, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> WorkflowRuntime<N> {
  pub fn with_notifier(workflow: Workflow, config: RuntimeConfig, notifier: N) -> Self {
    Self {
      workflow,
      config,
      notifier,
    }
  }

  pub fn workflow(&self) -> &Workflow {
    &self.workflow
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Run every task of the workflow to a terminal state.
  ///
  /// Task failures are recorded in the context and the report; only
  /// configuration errors (bad branch selections, a reused context) return
  /// `Err`.
  #[instrument(
    name = "workflow_execute",
    skip(self, ctx),
    fields(
      workflow_id = %self.workflow.workflow_id(),
      run_id = %ctx.run_id(),
    )
  )]
  pub async fn execute(&self, ctx: &RunContext) -> Result<RunReport, RuntimeError> {
    if !ctx.start() {
      return Err(RuntimeError::ContextReused {
        run_id: ctx.run_id().to_string(),
      });
    }

    info!(
      run_id = %ctx.run_id(),
      workflow_id = %self.workflow.workflow_id(),
      tasks = self.workflow.len(),
      "run_started"
    );
    self.notifier.notify(ExecutionEvent::RunStarted {
      run_id: ctx.run_id().to_string(),
      workflow_id: self.workflow.workflow_id().to_string(),
    });

    let result = Execution::new(&self.workflow, &self.config, &self.notifier, ctx)
      .run()
      .await;

    match &result {
      Ok(report) => {
        info!(
          run_id = %ctx.run_id(),
          completed = report.completed().len(),
          excluded = report.excluded().len(),
          failed = report.failed().len(),
          "run_completed"
        );
        self.notifier.notify(ExecutionEvent::RunCompleted {
          run_id: ctx.run_id().to_string(),
        });
      }
      Err(e) => {
        error!(run_id = %ctx.run_id(), error = %e, "run_failed");
        self.notifier.notify(ExecutionEvent::RunFailed {
          run_id: ctx.run_id().to_string(),
          error: e.to_string(),
        });
      }
    }

    result
  }
}

use std::sync::Arc;

use craftify_code_runner::{CodeRunRequest, CodeRunner, RunStatus};
use craftify_workflow::{Selection, TaskBody, TaskContext, TaskError, TaskFuture};
use tracing::info;

/// Channel key under which a code task publishes its captured output.
pub const OUTPUT_KEY: &str = "output";

/// Wrap a snippet as a plain task body.
///
/// The snippet runs on the blocking pool. Its captured output is published
/// under [`OUTPUT_KEY`] whether it succeeds or not; a `Failure` outcome fails
/// the task with the runner's error message.
pub fn code_task_body(runner: CodeRunner, request: CodeRunRequest) -> TaskBody {
  Arc::new(move |ctx: TaskContext| -> TaskFuture {
    let runner = runner.clone();
    let request = request.clone();
    Box::pin(async move {
      let outcome = tokio::task::spawn_blocking(move || runner.run(&request))
        .await
        .map_err(|e| TaskError::new(format!("code runner did not finish: {e}")))?;

      info!(
        run_id = %ctx.run_id,
        task_id = %ctx.task_id,
        status = ?outcome.status,
        output = %outcome.captured_output.trim_end(),
        "code task finished"
      );
      ctx.channel.put(OUTPUT_KEY, outcome.captured_output);

      match outcome.status {
        RunStatus::Success => Ok(None::<Selection>),
        RunStatus::Failure => Err(TaskError::new(
          outcome
            .error_message
            .unwrap_or_else(|| "code run failed".to_string()),
        )),
      }
    })
  })
}

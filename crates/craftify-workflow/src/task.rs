use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use craftify_channel::{ChannelError, ChannelHandle, DataChannel};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Successor ids chosen by a branch task.
pub type Selection = BTreeSet<String>;

/// Future returned by a task body.
///
/// Plain tasks resolve to `Ok(None)`, branch tasks to `Ok(Some(selection))`.
pub type TaskFuture = BoxFuture<'static, Result<Option<Selection>, TaskError>>;

/// Uniform body signature shared by every task kind.
pub type TaskBody = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// Build a [`Selection`] from anything string-like.
pub fn selection<I, S>(ids: I) -> Selection
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  ids.into_iter().map(Into::into).collect()
}

/// Whether a task's result restricts which successors run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  Plain,
  Branch,
}

/// Everything a task body may touch while it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
  pub run_id: String,
  pub task_id: String,
  pub channel: ChannelHandle,
}

impl TaskContext {
  pub fn new(run_id: impl Into<String>, task_id: impl Into<String>, channel: &DataChannel) -> Self {
    let task_id = task_id.into();
    Self {
      run_id: run_id.into(),
      channel: channel.handle(task_id.clone()),
      task_id,
    }
  }
}

/// A failure signalled by a task body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TaskError {
  pub message: String,
}

impl TaskError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

impl From<String> for TaskError {
  fn from(message: String) -> Self {
    Self { message }
  }
}

impl From<&str> for TaskError {
  fn from(message: &str) -> Self {
    Self::new(message)
  }
}

impl From<ChannelError> for TaskError {
  fn from(error: ChannelError) -> Self {
    Self::new(error.to_string())
  }
}

/// A named unit of work and the tasks it waits for.
#[derive(Clone)]
pub struct TaskNode {
  task_id: String,
  kind: TaskKind,
  predecessors: Vec<String>,
  body: TaskBody,
}

impl TaskNode {
  /// A plain task whose body either finishes or fails.
  pub fn task<F, Fut>(task_id: impl Into<String>, body: F) -> Self
  where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
  {
    let body: TaskBody = Arc::new(move |ctx: TaskContext| -> TaskFuture {
      let fut = body(ctx);
      Box::pin(async move { fut.await.map(|()| None::<Selection>) })
    });
    Self::from_body(task_id, TaskKind::Plain, body)
  }

  /// A branch task whose body picks which direct successors run.
  pub fn branch<F, Fut>(task_id: impl Into<String>, body: F) -> Self
  where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Selection, TaskError>> + Send + 'static,
  {
    let body: TaskBody = Arc::new(move |ctx: TaskContext| -> TaskFuture {
      let fut = body(ctx);
      Box::pin(async move { fut.await.map(Some) })
    });
    Self::from_body(task_id, TaskKind::Branch, body)
  }

  /// A plain task that does nothing, useful as a join or end marker.
  pub fn empty(task_id: impl Into<String>) -> Self {
    Self::task(task_id, |_| async { Ok(()) })
  }

  pub fn from_body(task_id: impl Into<String>, kind: TaskKind, body: TaskBody) -> Self {
    Self {
      task_id: task_id.into(),
      kind,
      predecessors: Vec::new(),
      body,
    }
  }

  /// Declare predecessors. Repeated ids are ignored.
  pub fn after<I, S>(mut self, predecessors: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for predecessor in predecessors {
      let predecessor = predecessor.into();
      if !self.predecessors.contains(&predecessor) {
        self.predecessors.push(predecessor);
      }
    }
    self
  }

  pub fn task_id(&self) -> &str {
    &self.task_id
  }

  pub fn kind(&self) -> TaskKind {
    self.kind
  }

  pub fn is_branch(&self) -> bool {
    self.kind == TaskKind::Branch
  }

  pub fn predecessors(&self) -> &[String] {
    &self.predecessors
  }

  pub fn body(&self) -> &TaskBody {
    &self.body
  }

  /// Start the body with the given context.
  pub fn invoke(&self, ctx: TaskContext) -> TaskFuture {
    (self.body)(ctx)
  }
}

impl fmt::Debug for TaskNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskNode")
      .field("task_id", &self.task_id)
      .field("kind", &self.kind)
      .field("predecessors", &self.predecessors)
      .finish_non_exhaustive()
  }
}

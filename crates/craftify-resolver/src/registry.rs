use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use craftify_workflow::{Selection, TaskBody, TaskContext, TaskError, TaskKind, TaskNode};

/// A named body together with the kind of task it implements.
#[derive(Clone)]
pub struct Handler {
  kind: TaskKind,
  body: TaskBody,
}

impl Handler {
  pub fn kind(&self) -> TaskKind {
    self.kind
  }

  pub fn body(&self) -> &TaskBody {
    &self.body
  }

  /// Bind this handler to a concrete task id.
  pub fn to_node(&self, task_id: impl Into<String>) -> TaskNode {
    TaskNode::from_body(task_id, self.kind, self.body.clone())
  }
}

impl fmt::Debug for Handler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Handler").field("kind", &self.kind).finish_non_exhaustive()
  }
}

/// Handlers that JSON definitions can refer to by name.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
  handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a plain body. Replaces any handler with the same name.
  pub fn register_task<F, Fut>(&mut self, name: impl Into<String>, body: F) -> &mut Self
  where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
  {
    let name = name.into();
    let node = TaskNode::task(name.clone(), body);
    self.register(name, node.kind(), node.body().clone())
  }

  /// Register a branch body. Replaces any handler with the same name.
  pub fn register_branch<F, Fut>(&mut self, name: impl Into<String>, body: F) -> &mut Self
  where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Selection, TaskError>> + Send + 'static,
  {
    let name = name.into();
    let node = TaskNode::branch(name.clone(), body);
    self.register(name, node.kind(), node.body().clone())
  }

  pub fn register(&mut self, name: impl Into<String>, kind: TaskKind, body: TaskBody) -> &mut Self {
    self.handlers.insert(name.into(), Handler { kind, body });
    self
  }

  pub fn get(&self, name: &str) -> Option<&Handler> {
    self.handlers.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.handlers.contains_key(name)
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }
}

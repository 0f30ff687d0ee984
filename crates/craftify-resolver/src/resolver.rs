use std::time::Duration;

use async_trait::async_trait;

use craftify_code_runner::{CodeRunRequest, CodeRunner};
use craftify_config::{TaskDef, TaskType, WorkflowDef};
use craftify_workflow::{TaskKind, TaskNode, Workflow};

use crate::code::code_task_body;
use crate::error::ResolveError;
use crate::registry::HandlerRegistry;

/// Resolver transforms a WorkflowDef into an executable Workflow.
#[async_trait]
pub trait Resolver: Send + Sync {
  /// Resolve a workflow definition into an executable workflow.
  ///
  /// This process:
  /// 1. Binds every task to a body (registered handler, code snippet, or no-op)
  /// 2. Validates the graph structure (unique ids, known predecessors, no cycles)
  async fn resolve(&self, def: WorkflowDef) -> Result<Workflow, ResolveError>;
}

/// Resolver backed by a handler registry and a code runner.
#[derive(Debug, Clone)]
pub struct StandardResolver {
  registry: HandlerRegistry,
  runner: CodeRunner,
}

impl StandardResolver {
  pub fn new(registry: HandlerRegistry) -> Self {
    Self {
      registry,
      runner: CodeRunner::default(),
    }
  }

  /// Use `runner` for code tasks instead of the default limits.
  pub fn with_runner(mut self, runner: CodeRunner) -> Self {
    self.runner = runner;
    self
  }

  pub fn registry(&self) -> &HandlerRegistry {
    &self.registry
  }

  fn resolve_task(&self, def: TaskDef) -> Result<TaskNode, ResolveError> {
    let node = match def.task_type {
      TaskType::Handler { handler } => match self.registry.get(&handler) {
        Some(h) => h.to_node(def.task_id),
        None => {
          return Err(ResolveError::UnknownHandler {
            task_id: def.task_id,
            handler,
          });
        }
      },
      TaskType::Code {
        code,
        environment,
        timeout_ms,
      } => {
        let mut config = self.runner.config().clone();
        if let Some(ms) = timeout_ms {
          config.timeout = Some(Duration::from_millis(ms));
        }
        let request = CodeRunRequest { code, environment };
        let body = code_task_body(CodeRunner::new(config), request);
        TaskNode::from_body(def.task_id, TaskKind::Plain, body)
      }
      TaskType::Empty => TaskNode::empty(def.task_id),
    };

    Ok(node.after(def.depends_on))
  }
}

#[async_trait]
impl Resolver for StandardResolver {
  async fn resolve(&self, def: WorkflowDef) -> Result<Workflow, ResolveError> {
    let nodes = def
      .tasks
      .into_iter()
      .map(|task| self.resolve_task(task))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Workflow::builder(def.workflow_id).nodes(nodes).build()?)
  }
}

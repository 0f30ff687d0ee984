use std::collections::HashMap;

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::task::TaskNode;

/// A validated task graph ready for execution.
#[derive(Debug, Clone)]
pub struct Workflow {
  workflow_id: String,
  nodes: HashMap<String, TaskNode>,
  graph: Graph,
}

impl Workflow {
  pub fn builder(workflow_id: impl Into<String>) -> WorkflowBuilder {
    WorkflowBuilder::new(workflow_id)
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  /// The graph structure for traversal.
  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Get a task by ID.
  pub fn get_node(&self, task_id: &str) -> Option<&TaskNode> {
    self.nodes.get(task_id)
  }

  pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
    self.nodes.values()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}

/// Collects task declarations and validates them into a [`Workflow`].
#[derive(Debug)]
pub struct WorkflowBuilder {
  workflow_id: String,
  nodes: Vec<TaskNode>,
}

impl WorkflowBuilder {
  pub fn new(workflow_id: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      nodes: Vec::new(),
    }
  }

  pub fn node(mut self, node: TaskNode) -> Self {
    self.nodes.push(node);
    self
  }

  pub fn nodes(mut self, nodes: impl IntoIterator<Item = TaskNode>) -> Self {
    self.nodes.extend(nodes);
    self
  }

  /// Validate the declarations and build the graph.
  pub fn build(self) -> Result<Workflow, WorkflowError> {
    let mut nodes: HashMap<String, TaskNode> = HashMap::with_capacity(self.nodes.len());
    for node in self.nodes {
      let task_id = node.task_id().to_string();
      if nodes.contains_key(&task_id) {
        return Err(WorkflowError::DuplicateTask(task_id));
      }
      nodes.insert(task_id, node);
    }

    validate_predecessors(&nodes)?;
    detect_cycle(&nodes)?;

    let graph = Graph::new(&nodes);

    Ok(Workflow {
      workflow_id: self.workflow_id,
      nodes,
      graph,
    })
  }
}

/// Every declared predecessor must name a task in the workflow.
fn validate_predecessors(nodes: &HashMap<String, TaskNode>) -> Result<(), WorkflowError> {
  let mut ids: Vec<&String> = nodes.keys().collect();
  ids.sort();

  for task_id in ids {
    for predecessor in nodes[task_id].predecessors() {
      if !nodes.contains_key(predecessor) {
        return Err(WorkflowError::UnknownPredecessor {
          task_id: task_id.clone(),
          predecessor: predecessor.clone(),
        });
      }
    }
  }
  Ok(())
}

/// Check for cycles using DFS over predecessor links.
fn detect_cycle(nodes: &HashMap<String, TaskNode>) -> Result<(), WorkflowError> {
  #[derive(Clone, Copy, PartialEq)]
  enum Color {
    White,
    Gray,
    Black,
  }

  fn dfs<'a>(
    task_id: &'a str,
    nodes: &'a HashMap<String, TaskNode>,
    color: &mut HashMap<&'a str, Color>,
  ) -> Option<&'a str> {
    color.insert(task_id, Color::Gray);

    for predecessor in nodes[task_id].predecessors() {
      match color.get(predecessor.as_str()) {
        Some(Color::Gray) => return Some(predecessor.as_str()),
        Some(Color::White) => {
          if let Some(found) = dfs(predecessor.as_str(), nodes, color) {
            return Some(found);
          }
        }
        _ => {}
      }
    }

    color.insert(task_id, Color::Black);
    None
  }

  let mut ids: Vec<&str> = nodes.keys().map(String::as_str).collect();
  ids.sort();

  let mut color: HashMap<&str, Color> = ids.iter().map(|id| (*id, Color::White)).collect();

  for task_id in ids {
    if color.get(task_id) == Some(&Color::White) {
      if let Some(found) = dfs(task_id, nodes, &mut color) {
        return Err(WorkflowError::CycleDetected(found.to_string()));
      }
    }
  }

  Ok(())
}

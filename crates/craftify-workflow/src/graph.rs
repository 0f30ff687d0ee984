use std::collections::{BTreeSet, HashMap, HashSet};

use crate::task::TaskNode;

/// Graph structure for traversal and analysis.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: task_id -> list of downstream task_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: task_id -> list of upstream task_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Tasks with no predecessors.
  entry_points: Vec<String>,
  /// Tasks with multiple predecessors (join points).
  join_points: HashSet<String>,
  /// Parents-before-children order, ties broken by id.
  topological_order: Vec<String>,
}

impl Graph {
  /// Build a graph from the predecessors declared on each task.
  ///
  /// Assumes predecessors exist and the relation is acyclic; the workflow
  /// builder checks both before calling this.
  pub(crate) fn new(nodes: &HashMap<String, TaskNode>) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    let mut ids: Vec<&String> = nodes.keys().collect();
    ids.sort();

    for task_id in &ids {
      adjacency.entry((*task_id).clone()).or_default();
      reverse_adjacency.entry((*task_id).clone()).or_default();
    }

    for task_id in &ids {
      for predecessor in nodes[*task_id].predecessors() {
        adjacency
          .entry(predecessor.clone())
          .or_default()
          .push((*task_id).clone());
        reverse_adjacency
          .entry((*task_id).clone())
          .or_default()
          .push(predecessor.clone());
      }
    }

    let entry_points: Vec<String> = ids
      .iter()
      .filter(|id| reverse_adjacency.get(**id).is_none_or(|v| v.is_empty()))
      .map(|id| (*id).clone())
      .collect();

    let join_points: HashSet<String> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    let topological_order = topological_sort(&adjacency, &reverse_adjacency);

    Self {
      adjacency,
      reverse_adjacency,
      entry_points,
      join_points,
      topological_order,
    }
  }

  /// Get entry points (tasks with no predecessors).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get downstream tasks for a given task.
  pub fn downstream(&self, task_id: &str) -> &[String] {
    self
      .adjacency
      .get(task_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream tasks for a given task.
  pub fn upstream(&self, task_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(task_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Check if `successor` is a direct successor of `task_id`.
  pub fn has_edge(&self, task_id: &str, successor: &str) -> bool {
    self.downstream(task_id).iter().any(|s| s == successor)
  }

  /// Check if a task is a join point (has multiple predecessors).
  pub fn is_join_point(&self, task_id: &str) -> bool {
    self.join_points.contains(task_id)
  }

  /// Get all join points.
  pub fn join_points(&self) -> &HashSet<String> {
    &self.join_points
  }

  /// Every task, parents before children.
  pub fn topological_order(&self) -> &[String] {
    &self.topological_order
  }
}

/// Kahn's algorithm over a sorted frontier so the order is stable run to run.
fn topological_sort(
  adjacency: &HashMap<String, Vec<String>>,
  reverse_adjacency: &HashMap<String, Vec<String>>,
) -> Vec<String> {
  let mut in_degree: HashMap<&str, usize> = reverse_adjacency
    .iter()
    .map(|(id, upstream)| (id.as_str(), upstream.len()))
    .collect();

  let mut frontier: BTreeSet<&str> = in_degree
    .iter()
    .filter(|(_, degree)| **degree == 0)
    .map(|(id, _)| *id)
    .collect();

  let mut order = Vec::with_capacity(in_degree.len());
  while let Some(id) = frontier.pop_first() {
    order.push(id.to_string());
    for next in adjacency.get(id).into_iter().flatten() {
      if let Some(degree) = in_degree.get_mut(next.as_str()) {
        *degree -= 1;
        if *degree == 0 {
          frontier.insert(next.as_str());
        }
      }
    }
  }

  order
}

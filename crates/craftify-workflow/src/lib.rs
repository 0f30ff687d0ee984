//! Craftify Workflow
//!
//! This crate provides the validated, immutable task graph that the runtime
//! executes. A [`Workflow`] is assembled from [`TaskNode`] declarations via
//! [`WorkflowBuilder`], which rejects graphs that could never run:
//! - duplicate task ids
//! - predecessors that do not exist
//! - cycles
//!
//! Once built, the [`Graph`] (adjacency, entry points, join points and a
//! topological order) is computed once and never mutated.

mod error;
mod graph;
mod task;
mod workflow;

pub use error::WorkflowError;
pub use graph::Graph;
pub use task::{Selection, TaskBody, TaskContext, TaskError, TaskFuture, TaskKind, TaskNode, selection};
pub use workflow::{Workflow, WorkflowBuilder};

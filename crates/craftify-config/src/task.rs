use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub task_id: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,
  #[serde(flatten)]
  pub task_type: TaskType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskType {
  /// A body registered under `handler` in the handler registry.
  Handler { handler: String },
  /// A Lua snippet run through the code runner.
  Code {
    code: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    environment: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
  },
  /// Does nothing; completes immediately.
  Empty,
}

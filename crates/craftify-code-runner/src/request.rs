use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Environment variable holding the snippet for process-level invocations.
pub const TASK_CODE_VAR: &str = "TASK_CODE";

/// Variables with this prefix are passed to the snippet, prefix stripped.
pub const TASK_ENV_PREFIX: &str = "TASK_ENV_";

/// Snippet run when `TASK_CODE` is unset.
pub const DEFAULT_TASK_CODE: &str = "print('Hello from job')";

/// Code to run and the only environment it may see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRunRequest {
  pub code: String,
  #[serde(default)]
  pub environment: HashMap<String, String>,
}

impl CodeRunRequest {
  pub fn new(code: impl Into<String>) -> Self {
    Self {
      code: code.into(),
      environment: HashMap::new(),
    }
  }

  pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.environment.insert(key.into(), value.into());
    self
  }

  /// Build a request from the current process environment.
  pub fn from_env() -> Self {
    Self::from_vars(std::env::vars())
  }

  /// Build a request from `(name, value)` pairs shaped like process variables.
  pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
    let mut code = None;
    let mut environment = HashMap::new();

    for (name, value) in vars {
      if name == TASK_CODE_VAR {
        code = Some(value);
      } else if let Some(key) = name.strip_prefix(TASK_ENV_PREFIX) {
        if !key.is_empty() {
          environment.insert(key.to_string(), value);
        }
      }
    }

    Self {
      code: code.unwrap_or_else(|| DEFAULT_TASK_CODE.to_string()),
      environment,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_from_vars_reads_code_and_prefixed_env() {
    let request = CodeRunRequest::from_vars(vars(&[
      ("TASK_CODE", "print(NAME)"),
      ("TASK_ENV_NAME", "craftify"),
      ("TASK_ENV_", "ignored"),
      ("HOME", "/root"),
    ]));

    assert_eq!(request.code, "print(NAME)");
    assert_eq!(request.environment.len(), 1);
    assert_eq!(request.environment["NAME"], "craftify");
  }

  #[test]
  fn test_from_vars_defaults_code() {
    let request = CodeRunRequest::from_vars(Vec::new());

    assert_eq!(request.code, DEFAULT_TASK_CODE);
    assert!(request.environment.is_empty());
  }
}

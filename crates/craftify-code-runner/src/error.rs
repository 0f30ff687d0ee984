use std::time::Duration;

use thiserror::Error;

/// Reasons a snippet did not complete.
///
/// These never escape [`CodeRunner::run`](crate::CodeRunner::run); they are
/// rendered into [`RunOutcome::error_message`](crate::RunOutcome).
#[derive(Debug, Error)]
pub enum RunnerError {
  /// Syntax or runtime error raised by the interpreter.
  #[error("{0}")]
  Lua(#[from] mlua::Error),

  /// The snippet ran longer than the configured timeout.
  #[error("execution timed out after {0:?}")]
  Timeout(Duration),

  /// The interpreter panicked.
  #[error("interpreter panicked: {0}")]
  Panicked(String),

  /// The isolation thread could not be started.
  #[error("failed to start runner thread: {0}")]
  Spawn(#[from] std::io::Error),
}

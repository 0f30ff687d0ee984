use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mlua::{Function, HookTriggers, Lua, LuaOptions, StdLib, Table, Value, Variadic, VmState};
use tracing::{error, info, warn};

use crate::error::RunnerError;
use crate::outcome::RunOutcome;
use crate::request::CodeRunRequest;

/// Instructions between deadline checks.
const HOOK_INSTRUCTIONS: u32 = 1_000;

/// Extra time the caller waits past the timeout before detaching the thread.
const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Globals from the base library that reach the filesystem.
const REMOVED_GLOBALS: &[&str] = &["dofile", "loadfile"];

/// Limits applied to every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
  pub timeout: Option<Duration>,
  /// Interpreter heap limit in bytes.
  pub memory_limit: Option<usize>,
}

impl Default for RunnerConfig {
  fn default() -> Self {
    Self {
      timeout: Some(Duration::from_secs(30)),
      memory_limit: Some(64 * 1024 * 1024),
    }
  }
}

impl RunnerConfig {
  pub fn unlimited() -> Self {
    Self {
      timeout: None,
      memory_limit: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn with_memory_limit(mut self, bytes: usize) -> Self {
    self.memory_limit = Some(bytes);
    self
  }
}

type OutputBuffer = Arc<Mutex<String>>;

/// Runs snippets in a fresh interpreter per call.
#[derive(Debug, Clone, Default)]
pub struct CodeRunner {
  config: RunnerConfig,
}

impl CodeRunner {
  pub fn new(config: RunnerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &RunnerConfig {
    &self.config
  }

  /// Execute `request` to completion and report the outcome.
  ///
  /// Blocks the calling thread. Never panics on faults in the snippet.
  pub fn run(&self, request: &CodeRunRequest) -> RunOutcome {
    let started = Instant::now();
    info!(
      code_len = request.code.len(),
      env_keys = request.environment.len(),
      "code_run_started"
    );

    let output: OutputBuffer = Arc::new(Mutex::new(String::new()));
    let result = self.run_isolated(request, output.clone());
    let duration = started.elapsed();
    let captured = output.lock().unwrap_or_else(|e| e.into_inner()).clone();

    match result {
      Ok(()) => {
        info!(
          duration_ms = duration.as_millis() as u64,
          output_len = captured.len(),
          "code_run_succeeded"
        );
        RunOutcome::success(captured, duration)
      }
      Err(e) => {
        error!(
          duration_ms = duration.as_millis() as u64,
          error = %e,
          "code_run_failed"
        );
        RunOutcome::failure(captured, e.to_string(), duration)
      }
    }
  }

  fn run_isolated(&self, request: &CodeRunRequest, output: OutputBuffer) -> Result<(), RunnerError> {
    let request = request.clone();
    let config = self.config.clone();
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
      .name("craftify-code-runner".to_string())
      .spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| evaluate(&request, &config, output)))
          .unwrap_or_else(|payload| Err(RunnerError::Panicked(panic_message(payload.as_ref()))));
        // The caller may have stopped waiting.
        let _ = tx.send(result);
      })?;

    await_result(&rx, self.config.timeout)
  }
}

/// Wait for the runner thread, detaching it once the deadline plus grace passes.
fn await_result(rx: &Receiver<Result<(), RunnerError>>, timeout: Option<Duration>) -> Result<(), RunnerError> {
  let received = match timeout {
    Some(timeout) => rx.recv_timeout(timeout + DEADLINE_GRACE),
    None => rx.recv().map_err(RecvTimeoutError::from),
  };

  match received {
    Ok(result) => result,
    Err(RecvTimeoutError::Timeout) => {
      let timeout = timeout.unwrap_or_default();
      warn!(timeout_ms = timeout.as_millis() as u64, "code runner thread detached after deadline");
      Err(RunnerError::Timeout(timeout))
    }
    Err(RecvTimeoutError::Disconnected) => Err(RunnerError::Panicked(
      "runner thread exited without a result".to_string(),
    )),
  }
}

/// Wall-clock limit checked from instruction hooks.
#[derive(Debug, Clone)]
struct Deadline {
  at: Instant,
  hit: Arc<AtomicBool>,
}

impl Deadline {
  fn new(timeout: Duration) -> Self {
    Self {
      at: Instant::now() + timeout,
      hit: Arc::new(AtomicBool::new(false)),
    }
  }

  fn check(&self) -> mlua::Result<VmState> {
    if self.hit.load(Ordering::SeqCst) || Instant::now() >= self.at {
      self.hit.store(true, Ordering::SeqCst);
      return Err(mlua::Error::runtime("execution deadline exceeded"));
    }
    Ok(VmState::Continue)
  }

  fn exceeded(&self) -> bool {
    self.hit.load(Ordering::SeqCst)
  }
}

/// `coroutine.wrap` rebuilt on the hooked `coroutine.create`.
const HOOKED_WRAP: &str = r#"
local create, resume, pack, unpack = coroutine.create, coroutine.resume, table.pack, table.unpack
coroutine.wrap = function(f)
  local co = create(f)
  return function(...)
    local res = pack(resume(co, ...))
    if not res[1] then error(res[2], 0) end
    return unpack(res, 2, res.n)
  end
end
"#;

/// Hook the main thread and every coroutine the snippet creates.
fn install_deadline(lua: &Lua, deadline: &Deadline) -> mlua::Result<()> {
  let main = deadline.clone();
  lua.set_hook(
    HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTIONS),
    move |_lua, _debug| main.check(),
  );

  let hooked = deadline.clone();
  let create = lua.create_function(move |lua, body: Function| {
    let thread = lua.create_thread(body)?;
    let check = hooked.clone();
    thread.set_hook(
      HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTIONS),
      move |_lua, _debug| check.check(),
    );
    Ok(thread)
  })?;

  let coroutine: Table = lua.globals().get("coroutine")?;
  coroutine.set("create", create)?;
  lua.load(HOOKED_WRAP).set_name("coroutine").exec()
}

fn evaluate(request: &CodeRunRequest, config: &RunnerConfig, output: OutputBuffer) -> Result<(), RunnerError> {
  let lua = Lua::new_with(
    StdLib::STRING | StdLib::TABLE | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE,
    LuaOptions::default(),
  )?;

  if let Some(limit) = config.memory_limit {
    lua.set_memory_limit(limit)?;
  }

  let deadline = config.timeout.map(Deadline::new);
  if let Some(deadline) = &deadline {
    install_deadline(&lua, deadline)?;
  }

  seed_globals(&lua, request, output)?;

  let result = lua.load(request.code.as_str()).set_name("task").exec();

  // A deadline error swallowed by pcall or coroutine.resume still fails the run.
  if deadline.as_ref().is_some_and(Deadline::exceeded) {
    return Err(RunnerError::Timeout(config.timeout.unwrap_or_default()));
  }
  result.map_err(RunnerError::Lua)
}

fn seed_globals(lua: &Lua, request: &CodeRunRequest, output: OutputBuffer) -> mlua::Result<()> {
  let globals = lua.globals();

  for name in REMOVED_GLOBALS {
    globals.set(*name, Value::Nil)?;
  }

  let print = lua.create_function(move |lua, args: Variadic<Value>| {
    let tostring: Function = lua.globals().get("tostring")?;
    let mut line = String::new();
    for (i, value) in args.into_iter().enumerate() {
      if i > 0 {
        line.push('\t');
      }
      let text: String = tostring.call(value)?;
      line.push_str(&text);
    }
    line.push('\n');
    output.lock().unwrap_or_else(|e| e.into_inner()).push_str(&line);
    Ok(())
  })?;
  globals.set("print", print)?;

  let env = lua.create_table()?;
  for (key, value) in &request.environment {
    env.set(key.as_str(), value.as_str())?;
  }
  globals.set("env", env)?;

  // Identifier-shaped keys are also globals, unless they would shadow one.
  for (key, value) in &request.environment {
    if is_identifier(key) && globals.get::<Value>(key.as_str())?.is_nil() {
      globals.set(key.as_str(), value.as_str())?;
    }
  }

  Ok(())
}

fn is_identifier(key: &str) -> bool {
  let mut chars = key.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_is_identifier() {
    assert!(is_identifier("GREETING"));
    assert!(is_identifier("_private1"));
    assert!(!is_identifier("1abc"));
    assert!(!is_identifier("with-dash"));
    assert!(!is_identifier(""));
  }

  #[test]
  fn test_panic_message_variants() {
    assert_eq!(panic_message(&"static"), "static");
    assert_eq!(panic_message(&String::from("owned")), "owned");
    assert_eq!(panic_message(&42_u8), "unknown panic");
  }

  #[test]
  fn test_silent_thread_is_detached_after_deadline() {
    let (_tx, rx) = mpsc::channel();
    let started = Instant::now();

    let result = await_result(&rx, Some(Duration::from_millis(20)));

    assert!(matches!(result, Err(RunnerError::Timeout(t)) if t == Duration::from_millis(20)));
    assert!(started.elapsed() < Duration::from_secs(5));
  }

  #[test]
  fn test_vanished_thread_is_reported() {
    let (tx, rx) = mpsc::channel::<Result<(), RunnerError>>();
    drop(tx);

    let result = await_result(&rx, None);

    assert!(matches!(result, Err(RunnerError::Panicked(_))));
  }
}

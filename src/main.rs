use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use craftify_code_runner::{CodeRunRequest, CodeRunner, RunnerConfig};
use craftify_config::WorkflowDef;
use craftify_resolver::{HandlerRegistry, Resolver, StandardResolver};
use craftify_runtime::{RunContext, RunReport, RuntimeConfig, WorkflowRuntime};
use craftify_sample::{ApiChain, DEFAULT_ENDPOINT, SampleConfig};

/// craftify - conditional task orchestration and a code runner
#[derive(Parser)]
#[command(name = "craftify")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a Lua snippet and report how it finished
  RunCode {
    /// Code to run (default: $TASK_CODE, then a greeting)
    #[arg(long)]
    code: Option<String>,

    /// Extra environment entries visible to the snippet
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    env: Vec<(String, String)>,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 64)]
    memory_limit_mb: usize,
  },

  /// Run a workflow definition against the sample handlers
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    #[command(flatten)]
    sample: SampleArgs,

    #[arg(long, default_value_t = RuntimeConfig::default().max_concurrent_tasks)]
    max_concurrency: usize,
  },

  /// Run the built-in conditional API chain
  Demo {
    #[command(flatten)]
    sample: SampleArgs,
  },
}

#[derive(clap::Args)]
struct SampleArgs {
  /// Endpoint queried by the sample tasks
  #[arg(long, env = "CRAFTIFY_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
  endpoint: String,

  /// Seconds the branch task waits before reading the clock
  #[arg(long, default_value_t = 60)]
  wait_secs: u64,
}

impl SampleArgs {
  fn chain(&self) -> ApiChain {
    ApiChain::new(SampleConfig {
      endpoint: self.endpoint.clone(),
      wait: Duration::from_secs(self.wait_secs),
    })
  }
}

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("craftify=info,warn")),
    )
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::RunCode {
      code,
      env,
      timeout_secs,
      memory_limit_mb,
    } => {
      let config = RunnerConfig::unlimited()
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_memory_limit(memory_limit_bytes(memory_limit_mb)?);
      Ok(run_code(code, env, config))
    }
    Commands::Run {
      workflow_file,
      sample,
      max_concurrency,
    } => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(workflow_file, sample, max_concurrency))
    }
    Commands::Demo { sample } => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_demo(sample))
    }
  }
}

fn run_code(code: Option<String>, env: Vec<(String, String)>, config: RunnerConfig) -> ExitCode {
  let mut request = CodeRunRequest::from_env();
  if let Some(code) = code {
    request.code = code;
  }
  request.environment.extend(env);

  println!("Starting task...\n");
  let outcome = CodeRunner::new(config).run(&request);
  print!("{}", outcome.captured_output);

  match &outcome.error_message {
    None => println!("\nCompleted successfully."),
    Some(message) => println!("\nError: {message}"),
  }

  ExitCode::from(outcome.exit_code() as u8)
}

async fn run_workflow(workflow_file: PathBuf, sample: SampleArgs, max_concurrency: usize) -> Result<ExitCode> {
  if max_concurrency == 0 {
    bail!("--max-concurrency must be at least 1");
  }

  let workflow_content = tokio::fs::read_to_string(&workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let workflow_def: WorkflowDef = serde_json::from_str(&workflow_content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  info!(workflow_id = %workflow_def.workflow_id, tasks = workflow_def.tasks.len(), "workflow loaded");

  let mut registry = HandlerRegistry::new();
  sample.chain().register_handlers(&mut registry);

  let workflow = StandardResolver::new(registry)
    .resolve(workflow_def)
    .await
    .context("failed to resolve workflow")?;

  info!(workflow_id = %workflow.workflow_id(), "workflow resolved");

  let runtime = WorkflowRuntime::with_config(
    workflow,
    RuntimeConfig {
      max_concurrent_tasks: max_concurrency,
    },
  );
  let report = runtime
    .execute(&RunContext::new())
    .await
    .context("workflow execution failed")?;

  print_report(&report)
}

async fn run_demo(sample: SampleArgs) -> Result<ExitCode> {
  let workflow = sample
    .chain()
    .workflow()
    .context("failed to build the sample workflow")?;

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .context("workflow execution failed")?;

  print_report(&report)
}

fn print_report(report: &RunReport) -> Result<ExitCode> {
  eprintln!("Execution completed: {}", report.run_id);
  println!("{}", serde_json::to_string_pretty(report)?);

  if report.has_failures() {
    eprintln!("Failed tasks: {}", report.failed().join(", "));
    return Ok(ExitCode::FAILURE);
  }
  Ok(ExitCode::SUCCESS)
}

fn memory_limit_bytes(mb: usize) -> Result<usize> {
  match mb.checked_mul(1024 * 1024) {
    Some(bytes) => Ok(bytes),
    None => bail!("--memory-limit-mb {mb} is too large"),
  }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got '{s}'")),
  }
}

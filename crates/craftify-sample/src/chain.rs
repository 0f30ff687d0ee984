use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use craftify_config::{TaskDef, TaskType, WorkflowDef};
use craftify_resolver::HandlerRegistry;
use craftify_workflow::{Selection, TaskContext, TaskError, TaskNode, Workflow, WorkflowError, selection};
use reqwest::Url;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::fetch::{Fetcher, HttpFetcher};

pub const WORKFLOW_ID: &str = "conditional_api_chain";
pub const DEFAULT_ENDPOINT: &str = "https://kalpak44.free.beeceptor.com";

pub const FETCH_INITIAL: &str = "fetch_initial";
pub const WAIT_AND_CHECK_MINUTE: &str = "wait_and_check_minute";
pub const PRINT_WORD_ONLY: &str = "print_word_only";
pub const SEND_QUERY_WITH_FIRST_WORD: &str = "send_query_with_first_word";
pub const END: &str = "end";

/// Published by `fetch_initial`.
pub const RESPONSE_BODY_KEY: &str = "response_body";
/// Published by either path when the body has a first word.
pub const FIRST_WORD_KEY: &str = "first_word";
/// Published by `send_query_with_first_word`.
pub const QUERY_RESPONSE_KEY: &str = "query_response";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleConfig {
  pub endpoint: String,
  /// How long the branch task waits before reading the clock.
  pub wait: Duration,
}

impl Default for SampleConfig {
  fn default() -> Self {
    Self {
      endpoint: DEFAULT_ENDPOINT.to_string(),
      wait: Duration::from_secs(60),
    }
  }
}

/// The sample's task bodies, bound to a config, a clock and a fetcher.
#[derive(Clone)]
pub struct ApiChain {
  config: SampleConfig,
  clock: Arc<dyn Clock>,
  fetcher: Arc<dyn Fetcher>,
}

impl fmt::Debug for ApiChain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ApiChain")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl ApiChain {
  /// Uses the local system clock and a real HTTP client.
  pub fn new(config: SampleConfig) -> Self {
    Self {
      config,
      clock: Arc::new(SystemClock),
      fetcher: Arc::new(HttpFetcher::default()),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn config(&self) -> &SampleConfig {
    &self.config
  }

  /// The full sample graph, ready to execute.
  pub fn workflow(&self) -> Result<Workflow, WorkflowError> {
    let [fetch, decide, print_word, send_query] = self.handler_nodes();

    Workflow::builder(WORKFLOW_ID)
      .node(fetch)
      .node(decide.after([FETCH_INITIAL]))
      .node(print_word.after([WAIT_AND_CHECK_MINUTE]))
      .node(send_query.after([WAIT_AND_CHECK_MINUTE]))
      .node(TaskNode::empty(END).after([PRINT_WORD_ONLY, SEND_QUERY_WITH_FIRST_WORD]))
      .build()
  }

  /// Expose the sample bodies under their task ids.
  pub fn register_handlers(&self, registry: &mut HandlerRegistry) {
    for node in self.handler_nodes() {
      registry.register(node.task_id(), node.kind(), node.body().clone());
    }
  }

  /// The sample graph as a definition whose handler tasks use the ids
  /// registered by [`register_handlers`](Self::register_handlers).
  pub fn definition() -> WorkflowDef {
    let handler = |id: &str, deps: &[&str]| TaskDef {
      task_id: id.to_string(),
      depends_on: deps.iter().map(|d| d.to_string()).collect(),
      task_type: TaskType::Handler {
        handler: id.to_string(),
      },
    };

    WorkflowDef {
      workflow_id: WORKFLOW_ID.to_string(),
      name: "Conditional API chain".to_string(),
      tasks: vec![
        handler(FETCH_INITIAL, &[]),
        handler(WAIT_AND_CHECK_MINUTE, &[FETCH_INITIAL]),
        handler(PRINT_WORD_ONLY, &[WAIT_AND_CHECK_MINUTE]),
        handler(SEND_QUERY_WITH_FIRST_WORD, &[WAIT_AND_CHECK_MINUTE]),
        TaskDef {
          task_id: END.to_string(),
          depends_on: vec![PRINT_WORD_ONLY.to_string(), SEND_QUERY_WITH_FIRST_WORD.to_string()],
          task_type: TaskType::Empty,
        },
      ],
    }
  }

  fn handler_nodes(&self) -> [TaskNode; 4] {
    let chain = self.clone();
    let fetch = TaskNode::task(FETCH_INITIAL, move |ctx: TaskContext| {
      let chain = chain.clone();
      async move { chain.fetch_initial(ctx).await }
    });

    let chain = self.clone();
    let decide = TaskNode::branch(WAIT_AND_CHECK_MINUTE, move |ctx: TaskContext| {
      let chain = chain.clone();
      async move { chain.wait_and_check_minute(ctx).await }
    });

    let print_word = TaskNode::task(PRINT_WORD_ONLY, |ctx: TaskContext| async move {
      print_word_only(ctx)
    });

    let chain = self.clone();
    let send_query = TaskNode::task(SEND_QUERY_WITH_FIRST_WORD, move |ctx: TaskContext| {
      let chain = chain.clone();
      async move { chain.send_query_with_first_word(ctx).await }
    });

    [fetch, decide, print_word, send_query]
  }

  async fn fetch_initial(&self, ctx: TaskContext) -> Result<(), TaskError> {
    let endpoint = &self.config.endpoint;
    let response = self
      .fetcher
      .get(endpoint)
      .await
      .map_err(|e| TaskError::new(format!("request to {endpoint} failed: {e}")))?;

    info!(
      run_id = %ctx.run_id,
      status = response.status,
      body = %response.body,
      "fetched initial response"
    );
    ctx.channel.put(RESPONSE_BODY_KEY, response.body);
    Ok(())
  }

  async fn wait_and_check_minute(&self, ctx: TaskContext) -> Result<Selection, TaskError> {
    info!(run_id = %ctx.run_id, wait_secs = self.config.wait.as_secs(), "waiting before checking the minute");
    tokio::time::sleep(self.config.wait).await;

    let minute = self.clock.minute();
    let next = if minute % 2 == 1 {
      PRINT_WORD_ONLY
    } else {
      SEND_QUERY_WITH_FIRST_WORD
    };
    info!(run_id = %ctx.run_id, minute, next, "minute checked");

    Ok(selection([next]))
  }

  async fn send_query_with_first_word(&self, ctx: TaskContext) -> Result<(), TaskError> {
    let Some(word) = first_word(&ctx)? else {
      warn!(run_id = %ctx.run_id, "no response body");
      return Ok(());
    };
    ctx.channel.put(FIRST_WORD_KEY, word.as_str());

    let url = Url::parse_with_params(&self.config.endpoint, [("word", word.as_str())])
      .map_err(|e| TaskError::new(format!("invalid endpoint {}: {e}", self.config.endpoint)))?;
    info!(run_id = %ctx.run_id, word = %word, url = %url, "querying with first word");

    let response = self
      .fetcher
      .get(url.as_str())
      .await
      .map_err(|e| TaskError::new(format!("request to {url} failed: {e}")))?;

    info!(
      run_id = %ctx.run_id,
      status = response.status,
      body = %response.body,
      "second request answered"
    );
    ctx.channel.put(QUERY_RESPONSE_KEY, response.body);
    Ok(())
  }
}

fn print_word_only(ctx: TaskContext) -> Result<(), TaskError> {
  match first_word(&ctx)? {
    Some(word) => {
      info!(run_id = %ctx.run_id, word = %word, "first word (odd minute path)");
      ctx.channel.put(FIRST_WORD_KEY, word);
    }
    None => warn!(run_id = %ctx.run_id, "no response body"),
  }
  Ok(())
}

/// First whitespace-separated word of the fetched body.
///
/// A missing entry, a non-string value and a blank body all read as `None`.
fn first_word(ctx: &TaskContext) -> Result<Option<String>, TaskError> {
  let body = match ctx.channel.get(FETCH_INITIAL, RESPONSE_BODY_KEY) {
    Ok(body) => body,
    Err(e) if e.is_not_found() => return Ok(None),
    Err(e) => return Err(e.into()),
  };

  Ok(
    body
      .as_str()
      .and_then(|text| text.split_whitespace().next())
      .map(str::to_string),
  )
}

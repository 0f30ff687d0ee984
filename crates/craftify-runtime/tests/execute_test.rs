//! Integration tests for WorkflowRuntime::execute.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use craftify_runtime::{
  ChannelNotifier, ExclusionReason, ExecutionEvent, RunContext, RuntimeConfig, RuntimeError,
  TaskState, WorkflowRuntime,
};
use craftify_workflow::{
  Selection, TaskBody, TaskContext, TaskError, TaskFuture, TaskKind, TaskNode, Workflow, selection,
};
use serde_json::json;
use tokio::sync::mpsc;

fn failing(task_id: &str) -> TaskNode {
  TaskNode::task(task_id, |_| async { Err(TaskError::new("boom")) })
}

fn picking(task_id: &str, picks: &[&str]) -> TaskNode {
  let picks = selection(picks.iter().copied());
  TaskNode::branch(task_id, move |_| {
    let picks = picks.clone();
    async move { Ok(picks) }
  })
}

fn explode() -> Result<(), TaskError> {
  panic!("kaboom")
}

fn explode_before_future(_ctx: TaskContext) -> std::future::Ready<Result<(), TaskError>> {
  panic!("kaboom before the future")
}

fn excluded(reason: ExclusionReason) -> TaskState {
  TaskState::Excluded { reason }
}

/// fetch -> decide -> {word_only, with_word} -> end
fn api_chain(pick: &str) -> Workflow {
  Workflow::builder("api-chain")
    .node(TaskNode::task("fetch", |ctx: TaskContext| async move {
      ctx.channel.put("response_body", "hello from the endpoint");
      Ok(())
    }))
    .node(picking("decide", &[pick]).after(["fetch"]))
    .node(
      TaskNode::task("word_only", |ctx: TaskContext| async move {
        let body: String = ctx.channel.get_as("fetch", "response_body")?;
        let first = body.split_whitespace().next().unwrap_or_default().to_string();
        ctx.channel.put("first_word", first);
        Ok(())
      })
      .after(["decide"]),
    )
    .node(TaskNode::empty("with_word").after(["decide"]))
    .node(TaskNode::empty("end").after(["word_only", "with_word"]))
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_branch_selects_path_and_join_still_runs() {
  let runtime = WorkflowRuntime::new(api_chain("word_only"));
  let ctx = RunContext::new();

  let report = runtime.execute(&ctx).await.unwrap();

  assert_eq!(report.outcomes.len(), 5);
  assert_eq!(report.state("fetch"), Some(&TaskState::Completed));
  assert_eq!(report.state("decide"), Some(&TaskState::Completed));
  assert_eq!(report.state("word_only"), Some(&TaskState::Completed));
  assert_eq!(report.state("with_word"), Some(&excluded(ExclusionReason::Branch)));
  assert_eq!(report.state("end"), Some(&TaskState::Completed));

  assert_eq!(
    ctx.outcome("decide").unwrap().selection,
    Some(selection(["word_only"]))
  );
  assert_eq!(ctx.channel().get("word_only", "first_word").unwrap(), json!("hello"));
}

#[tokio::test]
async fn test_other_branch_runs_the_other_path() {
  let runtime = WorkflowRuntime::new(api_chain("with_word"));
  let ctx = RunContext::new();

  let report = runtime.execute(&ctx).await.unwrap();

  assert_eq!(report.state("word_only"), Some(&excluded(ExclusionReason::Branch)));
  assert_eq!(report.state("with_word"), Some(&TaskState::Completed));
  assert_eq!(report.state("end"), Some(&TaskState::Completed));
  assert!(ctx.channel().get("word_only", "first_word").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_exclusion_propagates_down_a_chain() {
  let workflow = Workflow::builder("chain")
    .node(picking("decide", &["a"]))
    .node(TaskNode::empty("a").after(["decide"]))
    .node(TaskNode::empty("b").after(["decide"]))
    .node(TaskNode::empty("c").after(["b"]))
    .node(TaskNode::empty("d").after(["c"]))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert_eq!(report.completed(), vec!["a", "decide"]);
  assert_eq!(report.excluded(), vec!["b", "c", "d"]);
  for id in ["b", "c", "d"] {
    assert_eq!(report.state(id), Some(&excluded(ExclusionReason::Branch)));
  }
}

#[tokio::test]
async fn test_empty_selection_excludes_every_successor() {
  let workflow = Workflow::builder("nothing")
    .node(picking("decide", &[]))
    .node(TaskNode::empty("a").after(["decide"]))
    .node(TaskNode::empty("b").after(["decide"]))
    .node(TaskNode::empty("join").after(["a", "b"]))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert_eq!(report.completed(), vec!["decide"]);
  assert_eq!(report.excluded(), vec!["a", "b", "join"]);
}

#[tokio::test]
async fn test_branch_pruning_wins_over_a_completed_sibling_path() {
  // `join` is a direct successor of `decide`, which does not pick it.
  let workflow = Workflow::builder("pruned-join")
    .node(TaskNode::empty("start"))
    .node(picking("decide", &["x"]).after(["start"]))
    .node(TaskNode::empty("other").after(["start"]))
    .node(TaskNode::empty("x").after(["decide"]))
    .node(TaskNode::empty("join").after(["decide", "other"]))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert_eq!(report.state("other"), Some(&TaskState::Completed));
  assert_eq!(report.state("x"), Some(&TaskState::Completed));
  assert_eq!(report.state("join"), Some(&excluded(ExclusionReason::Branch)));
}

#[tokio::test]
async fn test_two_branches_converge() {
  let workflow = Workflow::builder("two-branches")
    .node(picking("left_decide", &["left"]))
    .node(picking("right_decide", &[]))
    .node(TaskNode::empty("left").after(["left_decide"]))
    .node(TaskNode::empty("right").after(["right_decide"]))
    .node(TaskNode::empty("join").after(["left", "right"]))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert_eq!(report.state("right"), Some(&excluded(ExclusionReason::Branch)));
  assert_eq!(report.state("join"), Some(&TaskState::Completed));
}

#[tokio::test]
async fn test_failure_excludes_downstream_but_not_siblings() {
  let workflow = Workflow::builder("failure")
    .node(TaskNode::empty("start"))
    .node(failing("bad").after(["start"]))
    .node(TaskNode::empty("good").after(["start"]))
    .node(TaskNode::empty("after_bad").after(["bad"]))
    .node(TaskNode::empty("deeper").after(["after_bad"]))
    .node(TaskNode::empty("join").after(["bad", "good"]))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert_eq!(
    report.state("bad"),
    Some(&TaskState::Failed {
      error: "boom".to_string()
    })
  );
  assert_eq!(report.state("good"), Some(&TaskState::Completed));
  assert_eq!(report.state("after_bad"), Some(&excluded(ExclusionReason::Failure)));
  assert_eq!(report.state("deeper"), Some(&excluded(ExclusionReason::Failure)));
  assert_eq!(report.state("join"), Some(&excluded(ExclusionReason::Failure)));
  assert!(report.has_failures());
}

#[tokio::test]
async fn test_failed_branch_excludes_its_successors() {
  let workflow = Workflow::builder("failed-branch")
    .node(TaskNode::branch("decide", |_| async {
      Err(TaskError::new("cannot decide"))
    }))
    .node(TaskNode::empty("a").after(["decide"]))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert!(report.state("decide").unwrap().is_failed());
  assert_eq!(report.state("a"), Some(&excluded(ExclusionReason::Failure)));
}

#[tokio::test]
async fn test_panicking_body_is_contained() {
  let workflow = Workflow::builder("panic")
    .node(TaskNode::task("explode", |_| async { explode() }))
    .node(TaskNode::empty("calm"))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  match report.state("explode") {
    Some(TaskState::Failed { error }) => assert!(error.contains("panicked")),
    other => panic!("unexpected state: {:?}", other),
  }
  assert_eq!(report.state("calm"), Some(&TaskState::Completed));
}

#[tokio::test]
async fn test_body_panicking_before_its_future_is_contained() {
  let workflow = Workflow::builder("panic-early")
    .node(TaskNode::task("explode", explode_before_future))
    .node(TaskNode::empty("calm"))
    .node(TaskNode::empty("after").after(["explode"]))
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  match report.state("explode") {
    Some(TaskState::Failed { error }) => assert!(error.contains("panicked")),
    other => panic!("unexpected state: {:?}", other),
  }
  assert_eq!(report.state("calm"), Some(&TaskState::Completed));
  assert_eq!(report.state("after"), Some(&excluded(ExclusionReason::Failure)));
}

#[tokio::test]
async fn test_selection_outside_successors_aborts_run() {
  let workflow = Workflow::builder("invalid")
    .node(TaskNode::empty("elsewhere"))
    .node(picking("decide", &["a", "elsewhere"]))
    .node(TaskNode::empty("a").after(["decide"]))
    .build()
    .unwrap();
  let ctx = RunContext::new();

  let err = WorkflowRuntime::new(workflow).execute(&ctx).await.unwrap_err();

  match err {
    RuntimeError::InvalidSelection { task_id, invalid } => {
      assert_eq!(task_id, "decide");
      assert_eq!(invalid, selection(["elsewhere"]));
    }
    other => panic!("unexpected error: {:?}", other),
  }
  assert!(ctx.outcome("decide").unwrap().state.is_failed());
  assert_eq!(ctx.outcome("a"), None);
}

#[tokio::test]
async fn test_plain_task_returning_selection_aborts_run() {
  let body: TaskBody = Arc::new(|_: TaskContext| -> TaskFuture {
    Box::pin(async { Ok::<_, TaskError>(Some(selection(["x"]))) })
  });
  let workflow = Workflow::builder("plain-selection")
    .node(TaskNode::from_body("sneaky", TaskKind::Plain, body))
    .build()
    .unwrap();

  let err = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap_err();

  assert!(matches!(err, RuntimeError::UnexpectedSelection { task_id } if task_id == "sneaky"));
}

#[tokio::test]
async fn test_branch_without_selection_aborts_run() {
  let body: TaskBody = Arc::new(|_: TaskContext| -> TaskFuture {
    Box::pin(async { Ok::<Option<Selection>, TaskError>(None) })
  });
  let workflow = Workflow::builder("missing-selection")
    .node(TaskNode::from_body("silent", TaskKind::Branch, body))
    .build()
    .unwrap();

  let err = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap_err();

  assert!(matches!(err, RuntimeError::MissingSelection { task_id } if task_id == "silent"));
}

#[tokio::test]
async fn test_node_reachable_twice_runs_once() {
  let runs = Arc::new(AtomicUsize::new(0));
  let counter = runs.clone();

  let workflow = Workflow::builder("diamond")
    .node(TaskNode::empty("start"))
    .node(TaskNode::empty("left").after(["start"]))
    .node(TaskNode::empty("right").after(["start"]))
    .node(
      TaskNode::task("end", move |_| {
        let counter = counter.clone();
        async move {
          counter.fetch_add(1, Ordering::SeqCst);
          Ok(())
        }
      })
      .after(["left", "right"]),
    )
    .build()
    .unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert_eq!(runs.load(Ordering::SeqCst), 1);
  assert_eq!(report.completed().len(), 4);
}

#[tokio::test]
async fn test_fresh_contexts_give_identical_states() {
  let runtime = WorkflowRuntime::new(api_chain("word_only"));

  let first = runtime.execute(&RunContext::new()).await.unwrap();
  let second = runtime.execute(&RunContext::new()).await.unwrap();

  assert_ne!(first.run_id, second.run_id);
  assert_eq!(first.states(), second.states());
}

#[tokio::test]
async fn test_reused_context_is_rejected() {
  let runtime = WorkflowRuntime::new(api_chain("word_only"));
  let ctx = RunContext::with_run_id("only-once");

  runtime.execute(&ctx).await.unwrap();
  let err = runtime.execute(&ctx).await.unwrap_err();

  assert!(matches!(err, RuntimeError::ContextReused { run_id } if run_id == "only-once"));
}

#[tokio::test]
async fn test_concurrent_runs_on_one_context_are_rejected() {
  let runtime = WorkflowRuntime::new(api_chain("word_only"));
  let ctx = RunContext::with_run_id("shared");

  let (first, second) = tokio::join!(runtime.execute(&ctx), runtime.execute(&ctx));

  let results = [first, second];
  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(results.iter().any(|r| matches!(
    r,
    Err(RuntimeError::ContextReused { run_id }) if run_id == "shared"
  )));
}

#[tokio::test]
async fn test_sequential_config_runs_in_topological_order() {
  let order = Arc::new(Mutex::new(Vec::new()));

  let record = |id: &'static str| {
    let order = order.clone();
    TaskNode::task(id, move |_| {
      let order = order.clone();
      async move {
        order.lock().unwrap().push(id);
        Ok(())
      }
    })
  };

  let workflow = Workflow::builder("ordered")
    .node(record("c").after(["a", "b"]))
    .node(record("b").after(["a"]))
    .node(record("a"))
    .node(record("d").after(["c"]))
    .build()
    .unwrap();

  WorkflowRuntime::with_config(workflow, RuntimeConfig::sequential())
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c", "d"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_tasks_run_concurrently() {
  // Both bodies must be in flight at once to get past the barrier.
  let barrier = Arc::new(tokio::sync::Barrier::new(2));

  let waiting = |id: &str| {
    let barrier = barrier.clone();
    TaskNode::task(id, move |_| {
      let barrier = barrier.clone();
      async move {
        barrier.wait().await;
        Ok(())
      }
    })
  };

  let workflow = Workflow::builder("parallel")
    .node(waiting("a"))
    .node(waiting("b"))
    .build()
    .unwrap();

  let report = tokio::time::timeout(
    Duration::from_secs(5),
    WorkflowRuntime::new(workflow).execute(&RunContext::new()),
  )
  .await
  .expect("tasks did not run concurrently")
  .unwrap();

  assert_eq!(report.completed(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_events_follow_the_run() {
  let (sender, mut receiver) = mpsc::unbounded_channel();
  let runtime = WorkflowRuntime::with_notifier(
    api_chain("word_only"),
    RuntimeConfig::sequential(),
    ChannelNotifier::new(sender),
  );
  let ctx = RunContext::with_run_id("observed");

  runtime.execute(&ctx).await.unwrap();

  let mut events = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    events.push(event);
  }

  assert_eq!(
    events.first(),
    Some(&ExecutionEvent::RunStarted {
      run_id: "observed".to_string(),
      workflow_id: "api-chain".to_string(),
    })
  );
  assert_eq!(
    events.last(),
    Some(&ExecutionEvent::RunCompleted {
      run_id: "observed".to_string(),
    })
  );
  assert!(events.contains(&ExecutionEvent::TaskExcluded {
    run_id: "observed".to_string(),
    task_id: "with_word".to_string(),
    reason: ExclusionReason::Branch,
  }));
  assert!(events.contains(&ExecutionEvent::TaskCompleted {
    run_id: "observed".to_string(),
    task_id: "decide".to_string(),
    selection: Some(selection(["word_only"])),
  }));

  let started = events
    .iter()
    .filter(|e| matches!(e, ExecutionEvent::TaskStarted { .. }))
    .count();
  assert_eq!(started, 4);
}

#[tokio::test]
async fn test_empty_workflow_completes_immediately() {
  let workflow = Workflow::builder("empty").build().unwrap();

  let report = WorkflowRuntime::new(workflow)
    .execute(&RunContext::new())
    .await
    .unwrap();

  assert!(report.outcomes.is_empty());
}

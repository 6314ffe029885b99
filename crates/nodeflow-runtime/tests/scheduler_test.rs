mod support;

use nodeflow_core::{Edge, ExecutedRecord, ExecutionEvent, GraphPayload, NodeSpec};
use nodeflow_runtime::{NodeRegistry, Scheduler};
use serde_json::json;
use std::sync::{Arc, Mutex};
use support::{context, executed_ids, register, ChoiceNode, FailingNode, RecordingNode};

fn seeded(node_id: &str, data: serde_json::Value) -> ExecutedRecord {
    ExecutedRecord::new(node_id, node_id, vec![data])
}

#[tokio::test]
async fn test_linear_graph_resolves_root_output() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    payload.add_node(NodeSpec::new("A", "test.echo"));
    payload.add_node(NodeSpec::new("B", "test.echo").with_param("value", "{{A[data][0].value]}}"));
    payload.add_node(NodeSpec::new("C", "test.echo"));
    payload.connect("A", "B");
    payload.connect("B", "C");
    payload.executed = vec![seeded("A", json!({ "data": [{ "value": "x" }] }))];

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();

    assert_eq!(executed_ids(&executed), vec!["A", "B", "C"]);
    let calls = echo.calls();
    assert_eq!(calls.len(), 2, "root A must not run");
    assert_eq!(calls[0].1.get("value"), Some(&json!("x")));
    assert_eq!(executed[1].data, vec![json!({ "data": { "value": "x" } })]);
}

#[tokio::test]
async fn test_index_reference_expands_into_one_call_per_element() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    payload.add_node(NodeSpec::new("A", "test.echo"));
    payload.add_node(
        NodeSpec::new("B", "test.echo").with_param("item", "{{A[data][$index].value]}}"),
    );
    payload.connect("A", "B");
    payload.executed = vec![seeded(
        "A",
        json!({ "data": [{ "value": "a" }, { "value": "b" }, { "value": "c" }] }),
    )];

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();

    let calls = echo.calls();
    let iterations: Vec<_> = calls.iter().map(|(i, _)| *i).collect();
    assert_eq!(iterations, vec![Some(0), Some(1), Some(2)]);
    let items: Vec<_> = calls.iter().map(|(_, p)| p["item"].clone()).collect();
    assert_eq!(items, vec![json!("a"), json!("b"), json!("c")]);

    assert_eq!(executed_ids(&executed), vec!["A", "B"]);
    assert_eq!(executed[1].data.len(), 3);
}

#[tokio::test]
async fn test_error_mid_loop_aborts_the_run() {
    let echo = RecordingNode::new("test.echo");
    let failing = Arc::new(FailingNode {
        fail_on: 2,
        attempts: Mutex::new(0),
    });
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    register(&mut registry, "test.fail", failing.clone());
    let ctx = context(registry);
    let mut events = ctx.subscribe_events();

    let mut payload = GraphPayload::new(vec!["A".into()]);
    payload.add_node(NodeSpec::new("A", "test.echo"));
    payload.add_node(NodeSpec::new("B", "test.echo"));
    payload.add_node(NodeSpec::new("C", "test.fail").with_param("n", "{{A[data][$index]}}"));
    payload.add_node(NodeSpec::new("D", "test.echo"));
    payload.connect("A", "B");
    payload.connect("B", "C");
    payload.connect("C", "D");
    payload.executed = vec![seeded("A", json!({ "data": [1, 2, 3, 4, 5] }))];

    let failure = Scheduler::new(&ctx).execute(&payload).await.unwrap_err();

    assert_eq!(failure.node_id, "C");
    assert_eq!(failure.error, "iteration 2 exploded");
    assert_eq!(executed_ids(&failure.executed), vec!["A", "B", "C"]);
    assert_eq!(failure.executed[2].error(), Some("iteration 2 exploded"));
    assert_eq!(*failing.attempts.lock().unwrap(), 3);
    assert_eq!(echo.calls().len(), 1, "D must never run");

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ExecutionEvent::NodeFailed { node_id, .. } => {
                assert_eq!(node_id, "C");
                saw_failure = true;
            }
            ExecutionEvent::WorkflowCompleted { success, .. } => assert!(!success),
            _ => {}
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_cycle_is_bounded_by_loop_budget() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    for id in ["A", "B", "C"] {
        payload.add_node(NodeSpec::new(id, "test.echo"));
    }
    payload.connect("A", "B");
    payload.connect("B", "C");
    payload.connect("C", "B");

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();

    let runs_of = |id: &str| executed.iter().filter(|r| r.node_id == id).count();
    assert_eq!(runs_of("B"), 4, "first visit plus three re-visits");
    assert_eq!(runs_of("C"), 4);
    assert_eq!(executed_ids(&executed)[..4], ["B", "C", "B", "C"]);
}

#[tokio::test]
async fn test_spent_budget_drops_only_that_successor() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    for id in ["A", "B", "C", "D"] {
        payload.add_node(NodeSpec::new(id, "test.echo"));
    }
    payload.connect("A", "B");
    payload.connect("B", "C");
    // C lists B before D, so B's budget runs out first on the last pass
    payload.connect("C", "B");
    payload.connect("C", "D");

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();

    let runs_of = |id: &str| executed.iter().filter(|r| r.node_id == id).count();
    assert_eq!(runs_of("B"), 4);
    assert_eq!(runs_of("C"), 4);
    assert_eq!(runs_of("D"), 4, "D is still reached after B is dropped");
}

#[tokio::test]
async fn test_self_loop_terminates() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    payload.add_node(NodeSpec::new("A", "test.echo"));
    payload.add_node(NodeSpec::new("B", "test.echo"));
    payload.connect("A", "B");
    payload.connect("B", "B");

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed.len(), 4);
}

#[tokio::test]
async fn test_same_depth_paths_are_coalesced() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    for id in ["A", "B", "C", "D", "E"] {
        payload.add_node(NodeSpec::new(id, "test.echo"));
    }
    payload.connect("A", "B");
    payload.connect("A", "C");
    payload.connect("B", "D");
    payload.connect("C", "D");
    payload.connect("D", "E");

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed_ids(&executed), vec!["B", "C", "D", "E"]);
}

#[tokio::test]
async fn test_second_arrival_at_new_depth_runs_again() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    for id in ["A", "B", "C"] {
        payload.add_node(NodeSpec::new(id, "test.echo"));
    }
    payload.connect("A", "B");
    payload.connect("A", "C");
    payload.connect("B", "C");

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed_ids(&executed), vec!["B", "C", "C"]);
}

#[tokio::test]
async fn test_branch_suppresses_untaken_port() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    register(&mut registry, "test.choice", Arc::new(ChoiceNode));
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["start".into()]);
    payload.add_node(NodeSpec::new("start", "test.echo"));
    payload.add_node(NodeSpec::new("ifElse_0", "test.choice").with_param("take", 0));
    payload.add_node(NodeSpec::new("yes", "test.echo"));
    payload.add_node(NodeSpec::new("no", "test.echo"));
    payload.connect("start", "ifElse_0");
    payload.edges.push(Edge::from_output("ifElse_0", 0, "yes"));
    payload.edges.push(Edge::from_output("ifElse_0", 1, "no"));

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed_ids(&executed), vec!["ifElse_0", "yes"]);
}

#[tokio::test]
async fn test_pruned_target_still_reachable_through_other_path() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    register(&mut registry, "test.choice", Arc::new(ChoiceNode));
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["start".into()]);
    payload.add_node(NodeSpec::new("start", "test.echo"));
    payload.add_node(NodeSpec::new("ifElse_0", "test.choice").with_param("take", 0));
    payload.add_node(NodeSpec::new("yes", "test.echo"));
    payload.add_node(NodeSpec::new("no", "test.echo"));
    payload.connect("start", "ifElse_0");
    payload.edges.push(Edge::from_output("ifElse_0", 0, "yes"));
    payload.edges.push(Edge::from_output("ifElse_0", 1, "no"));
    payload.connect("yes", "no");

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed_ids(&executed), vec!["ifElse_0", "yes", "no"]);
}

#[tokio::test]
async fn test_undecided_branch_fails_open() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    register(&mut registry, "test.choice", Arc::new(ChoiceNode));
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["start".into()]);
    payload.add_node(NodeSpec::new("start", "test.echo"));
    payload.add_node(NodeSpec::new("ifElse_0", "test.choice"));
    payload.add_node(NodeSpec::new("yes", "test.echo"));
    payload.add_node(NodeSpec::new("no", "test.echo"));
    payload.connect("start", "ifElse_0");
    payload.edges.push(Edge::from_output("ifElse_0", 0, "yes"));
    payload.edges.push(Edge::from_output("ifElse_0", 1, "no"));

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed_ids(&executed), vec!["ifElse_0", "yes", "no"]);
}

#[tokio::test]
async fn test_missing_adapter_prunes_node_but_run_continues() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);
    let mut events = ctx.subscribe_events();

    let mut payload = GraphPayload::new(vec!["A".into()]);
    payload.add_node(NodeSpec::new("A", "test.echo"));
    payload.add_node(NodeSpec::new("ghost", "vendor.unknown"));
    payload.add_node(NodeSpec::new("after_ghost", "test.echo"));
    payload.add_node(NodeSpec::new("sibling", "test.echo"));
    payload.connect("A", "ghost");
    payload.connect("A", "sibling");
    payload.connect("ghost", "after_ghost");

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed_ids(&executed), vec!["sibling"]);

    let skipped: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            ExecutionEvent::NodeSkipped { node_id, .. } => Some(node_id),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["ghost".to_string()]);
}

#[tokio::test]
async fn test_reference_to_unexecuted_node_is_left_verbatim() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    payload.add_node(NodeSpec::new("A", "test.echo"));
    payload.add_node(NodeSpec::new("B", "test.echo").with_param("text", "hi {{later[0].data]}}"));
    payload.add_node(NodeSpec::new("later", "test.echo"));
    payload.connect("A", "B");
    payload.connect("B", "later");

    Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(echo.calls()[0].1["text"], json!("hi {{later[0].data]}}"));
}

#[tokio::test]
async fn test_empty_loop_array_runs_zero_iterations() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    payload.add_node(NodeSpec::new("A", "test.echo"));
    payload.add_node(NodeSpec::new("B", "test.echo").with_param("item", "{{A[data][$index]}}"));
    payload.connect("A", "B");
    payload.executed = vec![seeded("A", json!({ "data": [] }))];

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert!(echo.calls().is_empty());
    assert_eq!(executed_ids(&executed), vec!["A", "B"]);
    assert!(executed[1].data.is_empty());
}

#[tokio::test]
async fn test_precomputed_adjacency_overrides_edges() {
    let echo = RecordingNode::new("test.echo");
    let mut registry = NodeRegistry::new();
    register(&mut registry, "test.echo", echo.clone());
    let ctx = context(registry);

    let mut payload = GraphPayload::new(vec!["A".into()]);
    for id in ["A", "B", "C"] {
        payload.add_node(NodeSpec::new(id, "test.echo"));
    }
    payload.connect("A", "B");
    payload.graph = Some(
        [
            ("A".to_string(), vec!["C".to_string(), "B".to_string()]),
            ("B".to_string(), vec![]),
            ("C".to_string(), vec![]),
        ]
        .into_iter()
        .collect(),
    );

    let executed = Scheduler::new(&ctx).execute(&payload).await.unwrap();
    assert_eq!(executed_ids(&executed), vec!["C", "B"]);
}

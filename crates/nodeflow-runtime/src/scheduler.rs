use crate::expander::ParamArena;
use crate::router;
use crate::runtime::RunContext;
use chrono::Utc;
use nodeflow_core::{
    Adjacency, BranchDecision, Edge, ExecutedRecord, ExecutionEvent, GraphPayload, Node,
    NodeContext, NodeError, NodeSpec, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use thiserror::Error;

/// A run aborted by an adapter error
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("Node {node_id} failed: {error}")]
pub struct RunFailure {
    /// Records up to and including the failing node's error record
    pub executed: Vec<ExecutedRecord>,
    pub node_id: String,
    pub error: String,
}

#[derive(Debug, Clone)]
struct QueueItem {
    node_id: String,
    depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct Explored {
    remaining_loop: u32,
    last_seen_depth: usize,
}

/// Output of every invocation of one node
#[derive(Debug, Default)]
struct NodeRun {
    records: Vec<Value>,
    decisions: Vec<BranchDecision>,
}

/// Breadth-first executor over a node graph that may contain cycles
pub struct Scheduler<'a> {
    ctx: &'a RunContext,
}

impl<'a> Scheduler<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Execute a payload, continuing from any records it already carries
    pub async fn execute(&self, payload: &GraphPayload) -> Result<Vec<ExecutedRecord>, RunFailure> {
        let adjacency = payload.adjacency();
        self.execute_graph(
            &payload.starting_node_ids,
            &payload.nodes,
            &payload.edges,
            &adjacency,
            payload.executed.clone(),
        )
        .await
    }

    /// Walk the graph from `roots`, which count as already satisfied.
    ///
    /// Nodes run in queue order. A node reached again at a depth it was
    /// already seen at is coalesced; reached at a new depth it spends one
    /// unit of its loop budget and is dropped once the budget is spent.
    pub async fn execute_graph(
        &self,
        roots: &[String],
        nodes: &[NodeSpec],
        edges: &[Edge],
        adjacency: &Adjacency,
        mut executed: Vec<ExecutedRecord>,
    ) -> Result<Vec<ExecutedRecord>, RunFailure> {
        let run_id = self.ctx.run_id();
        let max_loop = self.ctx.config().max_loop;
        let start_time = Instant::now();
        let already_executed = executed.len();

        self.ctx.event_bus().emit(ExecutionEvent::WorkflowStarted {
            run_id,
            starting_node_ids: roots.to_vec(),
            timestamp: Utc::now(),
        });
        tracing::info!(%run_id, roots = ?roots, "Starting graph execution");

        let root_ids: HashSet<&str> = roots.iter().map(String::as_str).collect();
        let mut queue = VecDeque::new();
        let mut explored: HashMap<String, Explored> = HashMap::new();

        for root in roots {
            queue.push_back(QueueItem {
                node_id: root.clone(),
                depth: 0,
            });
            explored.insert(
                root.clone(),
                Explored {
                    remaining_loop: max_loop,
                    last_seen_depth: 0,
                },
            );
        }

        while let Some(QueueItem { node_id, depth }) = queue.pop_front() {
            let mut ignore = HashSet::new();

            if !root_ids.contains(node_id.as_str()) {
                let Some(spec) = nodes.iter().find(|n| n.id == node_id) else {
                    self.skip(&node_id, "node is not part of the graph");
                    continue;
                };
                let Some(adapter) = self.ctx.registry().create_node(&spec.name) else {
                    self.skip(&node_id, &format!("no adapter registered for '{}'", spec.name));
                    continue;
                };

                match self.run_node(spec, adapter.as_ref(), depth, &executed).await {
                    Ok(run) => {
                        if adapter.is_branch() {
                            ignore = router::prune_edges(&node_id, &run.decisions, edges);
                            if !ignore.is_empty() {
                                tracing::debug!(node_id = %node_id, ignored = ?ignore, "Branch pruned successors");
                            }
                        }
                        executed.push(ExecutedRecord::new(&spec.id, &spec.label, run.records));
                    }
                    Err(e) => {
                        let error = e.to_string();
                        tracing::error!(node_id = %node_id, "Node failed: {}", error);

                        executed.push(ExecutedRecord::failed(&spec.id, &spec.label, &error));
                        self.ctx.event_bus().emit(ExecutionEvent::NodeFailed {
                            run_id,
                            node_id: node_id.clone(),
                            error: error.clone(),
                            timestamp: Utc::now(),
                        });
                        self.finish(false, executed.len() - already_executed, start_time);

                        return Err(RunFailure {
                            executed,
                            node_id,
                            error,
                        });
                    }
                }
            }

            let next_depth = depth + 1;
            for neighbour in adjacency.get(&node_id).into_iter().flatten() {
                if ignore.contains(neighbour) {
                    continue;
                }

                match explored.get_mut(neighbour) {
                    // Seen before: a cycle, or a second path to the same node
                    Some(state) => {
                        if state.last_seen_depth == next_depth {
                            continue;
                        }
                        if state.remaining_loop == 0 {
                            tracing::debug!(node_id = %neighbour, "Loop budget exhausted, dropping");
                            continue;
                        }
                        state.remaining_loop -= 1;
                        state.last_seen_depth = next_depth;
                    }
                    None => {
                        explored.insert(
                            neighbour.clone(),
                            Explored {
                                remaining_loop: max_loop,
                                last_seen_depth: next_depth,
                            },
                        );
                    }
                }

                queue.push_back(QueueItem {
                    node_id: neighbour.clone(),
                    depth: next_depth,
                });
            }
        }

        self.finish(true, executed.len() - already_executed, start_time);
        Ok(executed)
    }

    /// Invoke the adapter once per expanded parameter set, in order
    async fn run_node(
        &self,
        spec: &NodeSpec,
        adapter: &dyn Node,
        depth: usize,
        executed: &[ExecutedRecord],
    ) -> Result<NodeRun, NodeError> {
        let run_id = self.ctx.run_id();
        let arena = ParamArena::build(&spec.params, executed);

        self.ctx.event_bus().emit(ExecutionEvent::NodeStarted {
            run_id,
            node_id: spec.id.clone(),
            node_type: spec.name.clone(),
            iterations: arena.len(),
            depth,
            timestamp: Utc::now(),
        });
        tracing::info!(node_id = %spec.id, node_type = %spec.name, depth, iterations = arena.len(), "Executing node");

        let start = Instant::now();
        let mut run = NodeRun::default();

        for (iteration, params) in arena.into_iterations() {
            let ctx = NodeContext {
                node_id: spec.id.clone(),
                label: spec.label.clone(),
                params,
                iteration,
                events: self.ctx.event_bus().create_emitter(run_id, spec.id.clone()),
                cancellation: self.ctx.cancellation().child_token(),
            };

            let output = adapter.execute(ctx).await?;
            run.records.extend(output.records);
            run.decisions.push(output.branch);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(node_id = %spec.id, records = run.records.len(), "Node completed in {}ms", duration_ms);
        self.ctx.event_bus().emit(ExecutionEvent::NodeCompleted {
            run_id,
            node_id: spec.id.clone(),
            records: run.records.len(),
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(run)
    }

    fn skip(&self, node_id: &str, reason: &str) {
        tracing::warn!(node_id = %node_id, "Skipping node: {}", reason);
        self.ctx.event_bus().emit(ExecutionEvent::NodeSkipped {
            run_id: self.ctx.run_id(),
            node_id: node_id.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn finish(&self, success: bool, executed_nodes: usize, start_time: Instant) {
        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(success, executed_nodes, "Graph execution finished in {}ms", duration_ms);
        self.ctx.event_bus().emit(ExecutionEvent::WorkflowCompleted {
            run_id: self.ctx.run_id(),
            success,
            executed_nodes,
            duration_ms,
            timestamp: Utc::now(),
        });
    }
}

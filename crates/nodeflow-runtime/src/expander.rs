//! Loop expansion of a node's parameters over `$index` references.

use crate::template::{scan, VariableReference, VariableResolver, INDEX_PLACEHOLDER};
use nodeflow_core::path::PropertyPath;
use nodeflow_core::{ExecutedRecord, Map, Value};

/// How many times a node's adapter is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationPlan {
    /// No `$index` reference resolved to an array
    Single,
    /// One invocation per index `0..n`
    Loop(usize),
}

impl IterationPlan {
    pub fn count(&self) -> usize {
        match self {
            IterationPlan::Single => 1,
            IterationPlan::Loop(n) => *n,
        }
    }
}

/// Decide the iteration count for a parameter bag.
///
/// Every string reachable from `params` is searched for references using
/// `$index`; the array each one loops over is resolved against `executed`.
/// The shortest array wins so that no iteration indexes past the end of
/// any of them.
pub fn plan_iterations(params: &Map<String, Value>, executed: &[ExecutedRecord]) -> IterationPlan {
    let resolver = VariableResolver::new(executed);
    let mut min_len: Option<usize> = None;
    for value in params.values() {
        collect_loop_lengths(value, &resolver, &mut min_len);
    }
    match min_len {
        Some(n) => IterationPlan::Loop(n),
        None => IterationPlan::Single,
    }
}

fn collect_loop_lengths(value: &Value, resolver: &VariableResolver<'_>, min_len: &mut Option<usize>) {
    match value {
        Value::String(s) if s.contains(INDEX_PLACEHOLDER) => {
            for occurrence in scan(s) {
                if !occurrence.inner.contains(INDEX_PLACEHOLDER) {
                    continue;
                }
                if let Some(len) = referenced_array_len(occurrence.inner, resolver) {
                    *min_len = Some(min_len.map_or(len, |m| m.min(len)));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_loop_lengths(item, resolver, min_len);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_loop_lengths(item, resolver, min_len);
            }
        }
        _ => {}
    }
}

fn referenced_array_len(inner: &str, resolver: &VariableResolver<'_>) -> Option<usize> {
    let reference = VariableReference::parse(inner);
    let array_path = reference.array_path()?;
    let record = resolver.find(&reference.node_id)?;
    let array_path = resolver.resolve(array_path, "", None);
    match PropertyPath::parse(&array_path).lookup_record(record)? {
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Resolved parameter snapshots, one per iteration
#[derive(Debug, Clone, PartialEq)]
pub struct ParamArena {
    plan: IterationPlan,
    snapshots: Vec<Map<String, Value>>,
}

impl ParamArena {
    /// Plan the iterations and resolve one snapshot per iteration
    pub fn build(params: &Map<String, Value>, executed: &[ExecutedRecord]) -> Self {
        let plan = plan_iterations(params, executed);
        let resolver = VariableResolver::new(executed);
        let snapshots = match plan {
            IterationPlan::Single => vec![resolve_params(params, &resolver, None)],
            IterationPlan::Loop(n) => (0..n)
                .map(|index| resolve_params(params, &resolver, Some(index)))
                .collect(),
        };
        Self { plan, snapshots }
    }

    pub fn plan(&self) -> IterationPlan {
        self.plan
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, iteration: usize) -> Option<&Map<String, Value>> {
        self.snapshots.get(iteration)
    }

    /// Snapshots paired with their loop index (`None` for a single run)
    pub fn into_iterations(self) -> impl Iterator<Item = (Option<usize>, Map<String, Value>)> {
        let looped = matches!(self.plan, IterationPlan::Loop(_));
        self.snapshots
            .into_iter()
            .enumerate()
            .map(move |(index, params)| (looped.then_some(index), params))
    }
}

/// Resolve every string in a parameter bag for one loop index
pub fn resolve_params(
    params: &Map<String, Value>,
    resolver: &VariableResolver<'_>,
    loop_index: Option<usize>,
) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), resolve_tree(value, key, resolver, loop_index)))
        .collect()
}

fn resolve_tree(
    value: &Value,
    key: &str,
    resolver: &VariableResolver<'_>,
    loop_index: Option<usize>,
) -> Value {
    match value {
        Value::String(s) => resolver.resolve_value(s, key, loop_index),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_tree(item, key, resolver, loop_index))
                .collect(),
        ),
        Value::Object(map) => Value::Object(resolve_params(map, resolver, loop_index)),
        other => other.clone(),
    }
}

//! Graph execution runtime
//!
//! This crate provides the engine that walks a node graph breadth-first,
//! resolves `{{...}}` variable references against earlier results, expands
//! nodes over `$index` loops, and prunes the inactive side of branches.

pub mod expander;
mod graph;
mod registry;
pub mod router;
mod runtime;
mod scheduler;
pub mod template;

pub use expander::{plan_iterations, IterationPlan, ParamArena};
pub use graph::{unknown_node_types, GraphAnalysis};
pub use registry::{NodeFactory, NodeMetadata, NodeRegistry, ParamDefinition};
pub use router::prune_edges;
pub use runtime::{EngineConfig, RunContext};
pub use scheduler::{RunFailure, Scheduler};
pub use template::{VariableReference, VariableResolver};

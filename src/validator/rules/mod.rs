//! Built-in validation rules, grouped by what they inspect:
//!
//! - `structure.rs` - required fields, unique ids, edge endpoints, start nodes
//! - `graph.rs` - self-loops, cycles, outgoing edges, reachability
//! - `conditions.rs` - decision conditions
//! - `nodes.rs` - calculation and subprocess payloads
//! - `output.rs` - end node templates and output types

mod conditions;
mod graph;
mod nodes;
mod output;
mod structure;

pub use conditions::DecisionConditionRule;
pub use graph::{CycleRule, OutgoingEdgeRule, ReachabilityRule, SelfLoopRule};
pub use nodes::{CalculationRule, DerivedVariableRule, SubprocessRule};
pub use output::{OutputTemplateRule, OutputTypeRule};
pub use structure::{DuplicateIdRule, EdgeReferenceRule, RequiredFieldsRule, StartNodeRule};

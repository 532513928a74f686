//! Streaming join execution over variable-binding rows.
//!
//! Inputs and outputs are pull-based [`Operator`]s producing immutable
//! [`Row`]s: partial mappings from variables to values. Two rows join when
//! every variable bound in both carries the same value; the merged row
//! covers the union of the two domains.
//!
//! Four algorithms are provided. [`dispatch::join`] and
//! [`dispatch::left_join`] cover the common case by materializing the
//! right side and streaming the left. [`dispatch::hash_join`] and
//! [`dispatch::nested_loop_join`] select a specific strategy, and
//! [`dispatch::pipeline_hash_join`] joins without materializing either
//! input up front.
//!
//! The engine is generic over the value type: anything `Eq + Hash +
//! Clone` (plus the usual thread-safety bounds) joins. Values are never
//! interpreted, only compared and hashed.

pub mod binding;
pub mod combine;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod hash_join;
pub mod join_key;
pub mod nested_loop;
pub mod operator;
pub mod pipeline;
pub mod table;
pub mod table_join;
pub mod tracking;
pub mod var_registry;

pub use binding::{merge, Binding, Row, Value};
pub use context::ExecutionContext;
pub use dispatch::{hash_join, join, left_join, nested_loop_join, pipeline_hash_join};
pub use error::{JoinError, Result};
pub use hash_join::HashJoinOperator;
pub use join_key::{JoinKey, Key};
pub use nested_loop::NestedLoopJoinOperator;
pub use operator::{BoxedOperator, Operator, OperatorState, RowsOperator};
pub use pipeline::PipelineHashJoinOperator;
pub use table::Table;
pub use table_join::{JoinCondition, JoinType, TableJoinOperator};
pub use tracking::{FuelExceededError, Tracker};
pub use var_registry::{VarId, VarRegistry};

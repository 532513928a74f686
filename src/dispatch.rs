//! Entry points for building join operators.
//!
//! Each function wires up an unopened operator; the caller drives the
//! open/next/close lifecycle. `join` and `left_join` pick the
//! general-purpose table join; the remaining functions select a specific
//! algorithm for callers that know their inputs.

use crate::binding::Value;
use crate::join_key::JoinKey;
use crate::operator::BoxedOperator;
use crate::hash_join::HashJoinOperator;
use crate::nested_loop::NestedLoopJoinOperator;
use crate::pipeline::PipelineHashJoinOperator;
use crate::table_join::{JoinCondition, JoinType, TableJoinOperator};
use std::sync::Arc;

/// Inner join of two inputs.
///
/// Materializes the right side, then streams the left against it, matching
/// on the shared variables of the two schemas.
pub fn join<V: Value>(left: BoxedOperator<V>, right: BoxedOperator<V>) -> BoxedOperator<V> {
    Box::new(TableJoinOperator::new(JoinType::Plain, left, right, None))
}

/// Left outer join of two inputs.
///
/// Left rows with no match (or whose every merged candidate is rejected by
/// `condition`) are preserved with right-only variables unbound. The
/// condition, when present, sees only merged rows.
pub fn left_join<V: Value>(
    left: BoxedOperator<V>,
    right: BoxedOperator<V>,
    condition: Option<Arc<dyn JoinCondition<V>>>,
) -> BoxedOperator<V> {
    Box::new(TableJoinOperator::new(JoinType::Left, left, right, condition))
}

/// Inner join using an explicit join key: the left side is materialized
/// and indexed, the right side streams and probes.
pub fn hash_join<V: Value>(
    join_key: JoinKey,
    left: BoxedOperator<V>,
    right: BoxedOperator<V>,
) -> BoxedOperator<V> {
    Box::new(HashJoinOperator::new(join_key, left, right))
}

/// Inner join comparing all pairs. No key needed; quadratic.
pub fn nested_loop_join<V: Value>(
    left: BoxedOperator<V>,
    right: BoxedOperator<V>,
) -> BoxedOperator<V> {
    Box::new(NestedLoopJoinOperator::new(left, right))
}

/// Inner join that indexes both sides incrementally and emits matches as
/// input rows arrive, without materializing either side up front.
pub fn pipeline_hash_join<V: Value>(
    join_key: JoinKey,
    left: BoxedOperator<V>,
    right: BoxedOperator<V>,
) -> BoxedOperator<V> {
    Box::new(PipelineHashJoinOperator::new(join_key, left, right))
}

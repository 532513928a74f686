//! Table join: materialize the right side, stream the left against it.
//!
//! This is the general-purpose worker behind [`crate::dispatch::join`] and
//! [`crate::dispatch::left_join`]. It supports plain and left-outer
//! semantics and an optional condition evaluated over merged rows. The
//! join key is derived from the two schemas, so rows are matched through
//! a hash index over the shared variables whenever there are any.

use crate::binding::{Row, Value};
use crate::combine::RowCombiner;
use crate::context::ExecutionContext;
use crate::error::{JoinError, Result};
use crate::join_key::JoinKey;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::table::Table;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;

/// Join semantics for [`TableJoinOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Inner join: only merged rows are produced
    Plain,
    /// Left outer join: a left row with no surviving match is preserved,
    /// extended with unbound slots for right-only variables
    Left,
}

/// A filter over merged rows.
///
/// Conditions are opaque to the engine and are only ever evaluated on the
/// merged row, never on a bare input row. For left joins this ordering is
/// semantic: a merged row rejected by the condition does not count as a
/// match, and the left row is preserved if no candidate survives.
pub trait JoinCondition<V: Value>: Send + Sync {
    fn evaluate(&self, row: &Row<V>, ctx: &ExecutionContext<'_>) -> Result<bool>;
}

impl<V: Value, F> JoinCondition<V> for F
where
    F: Fn(&Row<V>, &ExecutionContext<'_>) -> Result<bool> + Send + Sync,
{
    fn evaluate(&self, row: &Row<V>, ctx: &ExecutionContext<'_>) -> Result<bool> {
        self(row, ctx)
    }
}

pub struct TableJoinOperator<V> {
    join_type: JoinType,
    join_key: JoinKey,
    left: BoxedOperator<V>,
    right: Option<BoxedOperator<V>>,
    condition: Option<Arc<dyn JoinCondition<V>>>,
    combiner: RowCombiner,
    schema: Arc<[VarId]>,
    table: Option<Table<V>>,
    pending: VecDeque<Row<V>>,
    state: OperatorState,
}

impl<V: Value> TableJoinOperator<V> {
    pub fn new(
        join_type: JoinType,
        left: BoxedOperator<V>,
        right: BoxedOperator<V>,
        condition: Option<Arc<dyn JoinCondition<V>>>,
    ) -> Self {
        let join_key = JoinKey::from_schemas(left.schema(), right.schema());
        let combiner = RowCombiner::new(left.schema(), right.schema());
        let schema = combiner.schema().clone();
        Self {
            join_type,
            join_key,
            left,
            right: Some(right),
            condition,
            combiner,
            schema,
            table: None,
            pending: VecDeque::new(),
            state: OperatorState::Created,
        }
    }

    /// Match one left row against the table, queueing the survivors. For a
    /// left join with no survivor, queue the extended left row instead.
    fn probe_one(&mut self, left_row: &Row<V>, ctx: &ExecutionContext<'_>) -> Result<()> {
        let table = self.table.as_ref().unwrap();
        let mut matched = false;
        for pos in table.probe(left_row) {
            let right_row = &table.rows()[pos as usize];
            if let Some(merged) = self.combiner.try_merge(left_row, right_row) {
                let keep = match &self.condition {
                    Some(cond) => cond.evaluate(&merged, ctx)?,
                    None => true,
                };
                if keep {
                    matched = true;
                    self.pending.push_back(merged);
                }
            }
        }
        if !matched && self.join_type == JoinType::Left {
            self.pending.push_back(self.combiner.extend_left(left_row));
        }
        Ok(())
    }

    /// Exhaustion releases the streamed input; `close` then only finalizes
    /// state. The right input was already drained and closed during open.
    fn finish(&mut self) {
        self.left.close();
        self.table = None;
        self.state = OperatorState::Exhausted;
    }
}

#[async_trait]
impl<V: Value> Operator<V> for TableJoinOperator<V> {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.can_open() {
            return Err(JoinError::OperatorAlreadyOpened);
        }
        let right = self.right.take().unwrap();
        let table =
            match Table::materialize_keyed(right, self.join_key.clone(), ctx).await {
                Ok(table) => table,
                Err(e) => {
                    self.left.close();
                    self.state = OperatorState::Closed;
                    return Err(e);
                }
            };
        if let Err(e) = self.left.open(ctx).await {
            self.state = OperatorState::Open;
            self.close();
            return Err(e);
        }
        self.table = Some(table);
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<Row<V>>> {
        match self.state {
            OperatorState::Open => {}
            OperatorState::Exhausted => return Ok(None),
            OperatorState::Created => return Err(JoinError::OperatorNotOpened),
            OperatorState::Closed => return Err(JoinError::OperatorClosed),
        }
        loop {
            if let Some(row) = self.pending.pop_front() {
                ctx.tracker.consume_fuel_one()?;
                return Ok(Some(row));
            }
            if ctx.tracker.is_cancelled() {
                self.finish();
                return Ok(None);
            }
            match self.left.next(ctx).await? {
                Some(left_row) => self.probe_one(&left_row, ctx)?,
                None => {
                    self.finish();
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        if self.state != OperatorState::Exhausted {
            self.left.close();
            if let Some(mut right) = self.right.take() {
                right.close();
            }
        }
        self.table = None;
        self.pending.clear();
        self.state = OperatorState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::operator::RowsOperator;
    use crate::var_registry::VarRegistry;

    fn row(vars: &[u16], vals: &[i64]) -> Row<i64> {
        let schema: Arc<[VarId]> = Arc::from(
            vars.iter()
                .map(|v| VarId(*v))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        );
        Row::new(schema, vals.iter().map(|v| Binding::Bound(*v)).collect()).unwrap()
    }

    fn source(vars: &[u16], rows: Vec<Row<i64>>) -> BoxedOperator<i64> {
        let schema: Arc<[VarId]> = Arc::from(
            vars.iter()
                .map(|v| VarId(*v))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        );
        Box::new(RowsOperator::new(schema, rows))
    }

    async fn drain(op: &mut dyn Operator<i64>, ctx: &ExecutionContext<'_>) -> Vec<Row<i64>> {
        let mut out = Vec::new();
        op.open(ctx).await.unwrap();
        while let Some(row) = op.next(ctx).await.unwrap() {
            out.push(row);
        }
        op.close();
        out
    }

    #[tokio::test]
    async fn test_plain_join() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![row(&[0], &[1])]);
        let right = source(
            &[0, 1],
            vec![row(&[0, 1], &[1, 2]), row(&[0, 1], &[1, 3]), row(&[0, 1], &[9, 5])],
        );
        let mut op = TableJoinOperator::new(JoinType::Plain, left, right, None);
        let out = drain(&mut op, &ctx).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_left_join_preserves_unmatched() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![row(&[0], &[1]), row(&[0], &[2])]);
        let right = source(&[0, 1], vec![row(&[0, 1], &[1, 10])]);
        let mut op = TableJoinOperator::new(JoinType::Left, left, right, None);
        let out = drain(&mut op, &ctx).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get(VarId(1)), Some(&10));
        // Unmatched left row survives with ?y unbound.
        assert_eq!(out[1].get(VarId(0)), Some(&2));
        assert_eq!(out[1].get(VarId(1)), None);
        assert_eq!(out[1].schema(), &[VarId(0), VarId(1)]);
    }

    #[tokio::test]
    async fn test_left_join_condition_rejects_all_matches() {
        // When the condition rejects every merged row, the left row is
        // preserved as if nothing matched.
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![row(&[0], &[1])]);
        let right = source(&[0, 1], vec![row(&[0, 1], &[1, 10])]);
        let cond: Arc<dyn JoinCondition<i64>> =
            Arc::new(|r: &Row<i64>, _: &ExecutionContext<'_>| -> crate::error::Result<bool> {
                Ok(r.get(VarId(1)) != Some(&10))
            });
        let mut op = TableJoinOperator::new(JoinType::Left, left, right, Some(cond));
        let out = drain(&mut op, &ctx).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(VarId(0)), Some(&1));
        assert_eq!(out[0].get(VarId(1)), None);
    }

    #[tokio::test]
    async fn test_plain_join_condition_filters() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![row(&[0], &[1])]);
        let right = source(
            &[0, 1],
            vec![row(&[0, 1], &[1, 2]), row(&[0, 1], &[1, 3])],
        );
        let cond: Arc<dyn JoinCondition<i64>> =
            Arc::new(|r: &Row<i64>, _: &ExecutionContext<'_>| -> crate::error::Result<bool> {
                Ok(r.get(VarId(1)) == Some(&3))
            });
        let mut op = TableJoinOperator::new(JoinType::Plain, left, right, Some(cond));
        let out = drain(&mut op, &ctx).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(VarId(1)), Some(&3));
    }

    #[tokio::test]
    async fn test_disjoint_left_join_is_cartesian() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![row(&[0], &[1])]);
        let right = source(&[1], vec![row(&[1], &[10]), row(&[1], &[20])]);
        let mut op = TableJoinOperator::new(JoinType::Left, left, right, None);
        let out = drain(&mut op, &ctx).await;
        assert_eq!(out.len(), 2);
    }
}

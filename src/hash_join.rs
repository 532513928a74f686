//! Hash join: materialize and index the left side on the join key during
//! open, then stream the right side, probing the index per row.

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

pub struct HashJoinOperator<V> {
    join_key: JoinKey,
    left: Option<BoxedOperator<V>>,
    right: BoxedOperator<V>,
    combiner: RowCombiner,
    schema: Arc<[VarId]>,
    table: Option<Table<V>>,
    /// Merged rows produced by the last probe, not yet handed out
    pending: VecDeque<Row<V>>,
    state: OperatorState,
}

impl<V: Value> HashJoinOperator<V> {
    pub fn new(join_key: JoinKey, left: BoxedOperator<V>, right: BoxedOperator<V>) -> Self {
        let combiner = RowCombiner::new(left.schema(), right.schema());
        let schema = combiner.schema().clone();
        Self {
            join_key,
            left: Some(left),
            right,
            combiner,
            schema,
            table: None,
            pending: VecDeque::new(),
            state: OperatorState::Created,
        }
    }

    /// Exhaustion releases the probe input; `close` then only finalizes
    /// state. The build input was already drained and closed during open.
    fn finish(&mut self) {
        self.right.close();
        self.table = None;
        self.state = OperatorState::Exhausted;
    }
}

#[async_trait]
impl<V: Value> Operator<V> for HashJoinOperator<V> {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.can_open() {
            return Err(JoinError::OperatorAlreadyOpened);
        }
        let mut left = self.left.take().unwrap();
        if let Err(e) = self
            .join_key
            .check_covers(left.schema(), self.right.schema(), ctx)
        {
            left.close();
            self.right.close();
            self.state = OperatorState::Closed;
            return Err(e);
        }
        let table = match Table::materialize_keyed(left, self.join_key.clone(), ctx).await {
            Ok(table) => table,
            Err(e) => {
                self.right.close();
                self.state = OperatorState::Closed;
                return Err(e);
            }
        };
        if let Err(e) = self.right.open(ctx).await {
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
            match self.right.next(ctx).await? {
                Some(probe_row) => {
                    let table = self.table.as_ref().unwrap();
                    for pos in table.probe(&probe_row) {
                        let build_row = &table.rows()[pos as usize];
                        if let Some(merged) = self.combiner.try_merge(build_row, &probe_row) {
                            self.pending.push_back(merged);
                        }
                    }
                }
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
            if let Some(mut left) = self.left.take() {
                left.close();
            }
            self.right.close();
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

    fn row(vars: &[u16], vals: &[Option<i64>]) -> Row<i64> {
        let schema: Arc<[VarId]> = Arc::from(
            vars.iter()
                .map(|v| VarId(*v))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        );
        let values = vals
            .iter()
            .map(|v| match v {
                Some(x) => Binding::Bound(*x),
                None => Binding::Unbound,
            })
            .collect();
        Row::new(schema, values).unwrap()
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
    async fn test_keyed_join() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![row(&[0], &[Some(1)])]);
        let right = source(
            &[0, 1],
            vec![
                row(&[0, 1], &[Some(1), Some(2)]),
                row(&[0, 1], &[Some(1), Some(3)]),
                row(&[0, 1], &[Some(9), Some(5)]),
            ],
        );
        let mut op = HashJoinOperator::new(JoinKey::new(vec![VarId(0)]), left, right);
        let out = drain(&mut op, &ctx).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get(VarId(1)), Some(&2));
        assert_eq!(out[1].get(VarId(1)), Some(&3));
    }

    #[tokio::test]
    async fn test_unbound_key_var_still_matches() {
        // A build row with the key var unbound is compatible with any probe.
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(
            &[0, 1],
            vec![
                row(&[0, 1], &[Some(1), Some(10)]),
                row(&[0, 1], &[None, Some(20)]),
            ],
        );
        let right = source(&[0], vec![row(&[0], &[Some(1)])]);
        let mut op = HashJoinOperator::new(JoinKey::new(vec![VarId(0)]), left, right);
        let out = drain(&mut op, &ctx).await;

        assert_eq!(out.len(), 2);
        // The unbound slot takes the probe side's value.
        assert!(out.iter().all(|r| r.get(VarId(0)) == Some(&1)));
    }

    #[tokio::test]
    async fn test_malformed_key_rejected_at_open() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![]);
        let right = source(&[1], vec![]);
        let mut op = HashJoinOperator::new(JoinKey::new(vec![VarId(7)]), left, right);
        let err = op.open(&ctx).await.unwrap_err();
        assert!(matches!(err, JoinError::MalformedJoinKey(_)));
    }

    #[tokio::test]
    async fn test_empty_key_degrades_to_full_scan() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let left = source(&[0], vec![row(&[0], &[Some(1)]), row(&[0], &[Some(2)])]);
        let right = source(&[1], vec![row(&[1], &[Some(10)])]);
        let mut op = HashJoinOperator::new(JoinKey::new(vec![]), left, right);
        let out = drain(&mut op, &ctx).await;
        assert_eq!(out.len(), 2);
    }
}

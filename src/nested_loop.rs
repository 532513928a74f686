//! Nested-loop join: materialize the left side, then stream the right,
//! checking every left row against each right row.
//!
//! Quadratic, but it needs no join key and is the correctness baseline the
//! other algorithms are checked against.

use crate::binding::{Row, Value};
use crate::combine::RowCombiner;
use crate::context::ExecutionContext;
use crate::error::{JoinError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::table::Table;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::sync::Arc;

pub struct NestedLoopJoinOperator<V> {
    left: Option<BoxedOperator<V>>,
    right: BoxedOperator<V>,
    combiner: RowCombiner,
    schema: Arc<[VarId]>,
    left_table: Option<Table<V>>,
    /// Right row currently being scanned against the left table
    current_right: Option<Row<V>>,
    /// Scan position into the left table for `current_right`
    left_pos: usize,
    state: OperatorState,
}

impl<V: Value> NestedLoopJoinOperator<V> {
    pub fn new(left: BoxedOperator<V>, right: BoxedOperator<V>) -> Self {
        let combiner = RowCombiner::new(left.schema(), right.schema());
        let schema = combiner.schema().clone();
        Self {
            left: Some(left),
            right,
            combiner,
            schema,
            left_table: None,
            current_right: None,
            left_pos: 0,
            state: OperatorState::Created,
        }
    }

    /// Exhaustion releases the inputs; `close` then only finalizes state.
    fn finish(&mut self) {
        self.right.close();
        self.left_table = None;
        self.current_right = None;
        self.state = OperatorState::Exhausted;
    }
}

#[async_trait]
impl<V: Value> Operator<V> for NestedLoopJoinOperator<V> {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.can_open() {
            return Err(JoinError::OperatorAlreadyOpened);
        }
        let left = self.left.take().unwrap();
        let table = match Table::materialize(left, ctx).await {
            Ok(table) => table,
            Err(e) => {
                // The right side was never opened; release it directly.
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
        self.left_table = Some(table);
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
            if ctx.tracker.is_cancelled() {
                self.finish();
                return Ok(None);
            }
            // Continue scanning the left table for the current right row.
            if let Some(right_row) = &self.current_right {
                let table = self.left_table.as_ref().unwrap();
                while self.left_pos < table.len() {
                    let pos = self.left_pos;
                    self.left_pos += 1;
                    if let Some(merged) = self.combiner.try_merge(&table.rows()[pos], right_row) {
                        ctx.tracker.consume_fuel_one()?;
                        return Ok(Some(merged));
                    }
                }
                self.current_right = None;
            }
            match self.right.next(ctx).await? {
                Some(row) => {
                    self.current_right = Some(row);
                    self.left_pos = 0;
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
        self.left_table = None;
        self.current_right = None;
        self.state = OperatorState::Closed;
    }
}

//! Pipelined hash join: a symmetric hash join that indexes both sides
//! incrementally and emits matches as rows arrive, with no up-front
//! materialization barrier.
//!
//! Each pulled row probes the opposite side's buffer, then joins its own
//! side's buffer. A matching pair is therefore emitted exactly once, when
//! the later of its two rows arrives. The first result can appear after a
//! single pull from each input.

use crate::binding::{Row, Value};
use crate::combine::RowCombiner;
use crate::context::ExecutionContext;
use crate::error::{JoinError, Result};
use crate::join_key::JoinKey;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::table::KeyIndex;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;

/// Rows buffered so far for one input, with an incremental key index.
struct Side<V> {
    rows: Vec<Row<V>>,
    index: KeyIndex<V>,
    exhausted: bool,
}

impl<V: Value> Side<V> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            index: KeyIndex::new(),
            exhausted: false,
        }
    }

    fn push(&mut self, key: &JoinKey, row: Row<V>) {
        self.index.insert(key.key_of(&row), self.rows.len() as u32);
        self.rows.push(row);
    }

    /// Buffered rows that may match `row`, in arrival order.
    fn candidates(&self, key: &JoinKey, row: &Row<V>) -> Vec<u32> {
        self.index
            .candidates(key.key_of(row).as_ref(), self.rows.len())
    }
}

pub struct PipelineHashJoinOperator<V> {
    join_key: JoinKey,
    left: BoxedOperator<V>,
    right: BoxedOperator<V>,
    combiner: RowCombiner,
    schema: Arc<[VarId]>,
    left_side: Side<V>,
    right_side: Side<V>,
    pending: VecDeque<Row<V>>,
    state: OperatorState,
}

impl<V: Value> PipelineHashJoinOperator<V> {
    pub fn new(join_key: JoinKey, left: BoxedOperator<V>, right: BoxedOperator<V>) -> Self {
        let combiner = RowCombiner::new(left.schema(), right.schema());
        let schema = combiner.schema().clone();
        Self {
            join_key,
            left,
            right,
            combiner,
            schema,
            left_side: Side::new(),
            right_side: Side::new(),
            pending: VecDeque::new(),
            state: OperatorState::Created,
        }
    }

    /// Pull one row from one input and enqueue the matches it completes.
    /// Alternates by buffered size, favoring the smaller side so memory
    /// grows evenly.
    async fn advance(&mut self, ctx: &ExecutionContext<'_>) -> Result<bool> {
        let pull_left = if self.left_side.exhausted {
            false
        } else if self.right_side.exhausted {
            true
        } else {
            self.left_side.rows.len() <= self.right_side.rows.len()
        };

        if pull_left {
            match self.left.next(ctx).await? {
                Some(row) => {
                    for pos in self.right_side.candidates(&self.join_key, &row) {
                        let other = &self.right_side.rows[pos as usize];
                        if let Some(merged) = self.combiner.try_merge(&row, other) {
                            self.pending.push_back(merged);
                        }
                    }
                    // Buffering is only for probes by future right rows;
                    // once the right side is done, drop the row after
                    // probing so the live side streams in O(1) memory.
                    if !self.right_side.exhausted {
                        self.left_side.push(&self.join_key, row);
                    }
                }
                None => self.left_side.exhausted = true,
            }
        } else {
            match self.right.next(ctx).await? {
                Some(row) => {
                    for pos in self.left_side.candidates(&self.join_key, &row) {
                        let other = &self.left_side.rows[pos as usize];
                        if let Some(merged) = self.combiner.try_merge(other, &row) {
                            self.pending.push_back(merged);
                        }
                    }
                    if !self.left_side.exhausted {
                        self.right_side.push(&self.join_key, row);
                    }
                }
                None => self.right_side.exhausted = true,
            }
        }

        Ok(!(self.left_side.exhausted && self.right_side.exhausted))
    }

    /// Exhaustion releases both inputs; `close` then only finalizes state.
    fn finish(&mut self) {
        self.left.close();
        self.right.close();
        self.left_side = Side::new();
        self.right_side = Side::new();
        self.state = OperatorState::Exhausted;
    }
}

#[async_trait]
impl<V: Value> Operator<V> for PipelineHashJoinOperator<V> {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.can_open() {
            return Err(JoinError::OperatorAlreadyOpened);
        }
        if let Err(e) = self
            .join_key
            .check_covers(self.left.schema(), self.right.schema(), ctx)
        {
            self.left.close();
            self.right.close();
            self.state = OperatorState::Closed;
            return Err(e);
        }
        if let Err(e) = self.left.open(ctx).await {
            self.right.close();
            self.state = OperatorState::Closed;
            return Err(e);
        }
        if let Err(e) = self.right.open(ctx).await {
            self.left.close();
            self.state = OperatorState::Closed;
            return Err(e);
        }
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
            if ctx.tracker.is_cancelled() || !self.advance(ctx).await? {
                if let Some(row) = self.pending.pop_front() {
                    ctx.tracker.consume_fuel_one()?;
                    return Ok(Some(row));
                }
                self.finish();
                return Ok(None);
            }
        }
    }

    fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        if self.state != OperatorState::Exhausted {
            self.left.close();
            self.right.close();
        }
        self.left_side = Side::new();
        self.right_side = Side::new();
        self.pending.clear();
        self.state = OperatorState::Closed;
    }
}

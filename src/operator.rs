//! The pull-based operator trait every join implements, plus a
//! pre-materialized source operator used at plan leaves and in tests.

use crate::binding::{Row, Value};
use crate::context::ExecutionContext;
use crate::error::{JoinError, Result};
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::sync::Arc;

/// Lifecycle state of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Created but not yet opened
    Created,
    /// Opened and producing rows
    Open,
    /// All rows produced
    Exhausted,
    /// Closed, resources released
    Closed,
}

impl OperatorState {
    pub fn can_open(&self) -> bool {
        matches!(self, OperatorState::Created)
    }

    pub fn can_next(&self) -> bool {
        matches!(self, OperatorState::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, OperatorState::Closed)
    }
}

/// A pull-based producer of rows.
///
/// Lifecycle: construct, `open` once, call `next` until it yields `None`,
/// then `close`. `close` is required on every exit path, including error
/// and early abandonment, and it must be safe to call more than once.
/// Operators own their children and propagate `close` to them.
#[async_trait]
pub trait Operator<V: Value>: Send + Sync {
    /// Ordered variables of the rows this operator produces. Available
    /// before `open`.
    fn schema(&self) -> &[VarId];

    /// Acquire resources and do any construction-phase work (for the
    /// blocking joins, materializing the build side happens here).
    async fn open(&mut self, ctx: &ExecutionContext<'_>) -> Result<()>;

    /// Produce the next row, or `None` when exhausted.
    async fn next(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<Row<V>>>;

    /// Release resources. Idempotent; never errors.
    fn close(&mut self);

    /// Optional cardinality hint for planners. `None` when unknown.
    fn estimated_rows(&self) -> Option<usize> {
        None
    }
}

pub type BoxedOperator<V> = Box<dyn Operator<V> + Send + Sync>;

/// Operator over an in-memory list of rows.
///
/// Serves as the leaf for pre-computed inputs and as the standard test
/// source. Rows are yielded in list order.
pub struct RowsOperator<V> {
    schema: Arc<[VarId]>,
    rows: Vec<Row<V>>,
    pos: usize,
    state: OperatorState,
}

impl<V: Value> RowsOperator<V> {
    pub fn new(schema: Arc<[VarId]>, rows: Vec<Row<V>>) -> Self {
        Self {
            schema,
            rows,
            pos: 0,
            state: OperatorState::Created,
        }
    }

    /// Empty source over the given schema.
    pub fn empty(schema: Arc<[VarId]>) -> Self {
        Self::new(schema, Vec::new())
    }
}

#[async_trait]
impl<V: Value> Operator<V> for RowsOperator<V> {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, _ctx: &ExecutionContext<'_>) -> Result<()> {
        if !self.state.can_open() {
            return Err(JoinError::OperatorAlreadyOpened);
        }
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn next(&mut self, _ctx: &ExecutionContext<'_>) -> Result<Option<Row<V>>> {
        match self.state {
            OperatorState::Open => {}
            OperatorState::Exhausted => return Ok(None),
            OperatorState::Created => return Err(JoinError::OperatorNotOpened),
            OperatorState::Closed => return Err(JoinError::OperatorClosed),
        }
        if self.pos >= self.rows.len() {
            self.state = OperatorState::Exhausted;
            return Ok(None);
        }
        let row = self.rows[self.pos].clone();
        self.pos += 1;
        Ok(Some(row))
    }

    fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.rows.clear();
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::var_registry::VarRegistry;

    fn one_row_op() -> RowsOperator<i64> {
        let schema: Arc<[VarId]> = Arc::from(vec![VarId(0)].into_boxed_slice());
        let row = Row::new(schema.clone(), vec![Binding::Bound(1i64)]).unwrap();
        RowsOperator::new(schema, vec![row])
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let mut op = one_row_op();

        op.open(&ctx).await.unwrap();
        assert!(op.next(&ctx).await.unwrap().is_some());
        assert!(op.next(&ctx).await.unwrap().is_none());
        // Exhausted operators keep returning None.
        assert!(op.next(&ctx).await.unwrap().is_none());
        op.close();
        op.close();
    }

    #[tokio::test]
    async fn test_next_before_open_errors() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let mut op = one_row_op();
        assert!(matches!(
            op.next(&ctx).await.unwrap_err(),
            JoinError::OperatorNotOpened
        ));
    }

    #[tokio::test]
    async fn test_double_open_errors() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let mut op = one_row_op();
        op.open(&ctx).await.unwrap();
        assert!(matches!(
            op.open(&ctx).await.unwrap_err(),
            JoinError::OperatorAlreadyOpened
        ));
    }

    #[tokio::test]
    async fn test_next_after_close_errors() {
        let vars = VarRegistry::new();
        let ctx = ExecutionContext::new(&vars);
        let mut op = one_row_op();
        op.open(&ctx).await.unwrap();
        op.close();
        assert!(matches!(
            op.next(&ctx).await.unwrap_err(),
            JoinError::OperatorClosed
        ));
    }
}

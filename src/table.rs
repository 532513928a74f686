//! Materialized row table with an optional hash index over a join key.
//!
//! The blocking joins build one of these from their build-side operator
//! during `open`. Materialization drains the source to exhaustion and
//! closes it before returning, on success and on error alike.

use crate::binding::{Row, Value};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::join_key::{JoinKey, Key};
use crate::operator::BoxedOperator;
use crate::var_registry::VarId;
use std::collections::HashMap;
use std::sync::Arc;

/// Hash index from key projection to row positions.
///
/// Rows whose key projection is undefined (a key variable unbound or
/// absent) cannot be bucketed; they land in `unkeyed` and are candidates
/// for every probe, since an unbound key slot is compatible with any
/// value.
#[derive(Debug, Default)]
pub struct KeyIndex<V> {
    buckets: HashMap<Key<V>, Vec<u32>>,
    unkeyed: Vec<u32>,
}

impl<V: Value> KeyIndex<V> {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            unkeyed: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: Option<Key<V>>, pos: u32) {
        match key {
            Some(k) => self.buckets.entry(k).or_default().push(pos),
            None => self.unkeyed.push(pos),
        }
    }

    /// Candidate row positions for a probe projection, in table order.
    ///
    /// A probe with no projection of its own must consider every row; a
    /// keyed probe considers its bucket plus the unkeyed rows.
    pub fn candidates(&self, key: Option<&Key<V>>, row_count: usize) -> Vec<u32> {
        match key {
            None => (0..row_count as u32).collect(),
            Some(k) => {
                let bucket = self.buckets.get(k).map(|v| v.as_slice()).unwrap_or(&[]);
                if self.unkeyed.is_empty() {
                    return bucket.to_vec();
                }
                let mut out = Vec::with_capacity(bucket.len() + self.unkeyed.len());
                out.extend_from_slice(bucket);
                out.extend_from_slice(&self.unkeyed);
                out.sort_unstable();
                out
            }
        }
    }
}

/// A fully materialized side of a join.
#[derive(Debug)]
pub struct Table<V> {
    schema: Arc<[VarId]>,
    rows: Vec<Row<V>>,
    key: JoinKey,
    index: Option<KeyIndex<V>>,
}

impl<V: Value> Table<V> {
    /// Drain `source` into an unindexed table.
    pub async fn materialize(
        mut source: BoxedOperator<V>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        let schema: Arc<[VarId]> = Arc::from(source.schema().to_vec().into_boxed_slice());
        let mut rows = Vec::new();
        let result: Result<()> = async {
            source.open(ctx).await?;
            while let Some(row) = source.next(ctx).await? {
                ctx.tracker.consume_fuel_one()?;
                rows.push(row);
                if ctx.tracker.is_cancelled() {
                    break;
                }
            }
            Ok(())
        }
        .await;
        source.close();
        result?;
        tracing::debug!(rows = rows.len(), "materialized join table");
        Ok(Self {
            schema,
            rows,
            key: JoinKey::new(Vec::new()),
            index: None,
        })
    }

    /// Drain `source` into a table indexed on `key`.
    pub async fn materialize_keyed(
        source: BoxedOperator<V>,
        key: JoinKey,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Self> {
        let mut table = Self::materialize(source, ctx).await?;
        let mut index = KeyIndex::new();
        for (pos, row) in table.rows.iter().enumerate() {
            index.insert(key.key_of(row), pos as u32);
        }
        table.key = key;
        table.index = Some(index);
        Ok(table)
    }

    pub fn schema(&self) -> &Arc<[VarId]> {
        &self.schema
    }

    pub fn rows(&self) -> &[Row<V>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Candidate rows for a probe row, as table positions in table order.
    /// Unindexed tables yield every position.
    pub fn probe(&self, probe_row: &Row<V>) -> Vec<u32> {
        match &self.index {
            None => (0..self.rows.len() as u32).collect(),
            Some(index) => {
                let probe_key = self.key.key_of(probe_row);
                index.candidates(probe_key.as_ref(), self.rows.len())
            }
        }
    }
}

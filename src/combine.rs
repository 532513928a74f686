//! Precomputed row combination for a fixed pair of schemas.
//!
//! [`crate::binding::merge`] resolves column positions per call. Join
//! operators merge every left row against many right rows over the same
//! two schemas, so the column mapping is computed once here and replayed
//! per pair.

use crate::binding::{Binding, Row, Value};
use crate::var_registry::VarId;
use std::sync::Arc;

/// Combines rows from a fixed left schema with rows from a fixed right
/// schema. The combined schema is the left schema followed by right-only
/// variables.
#[derive(Clone, Debug)]
pub struct RowCombiner {
    combined_schema: Arc<[VarId]>,
    /// (left column, right column) pairs for shared variables
    shared: Vec<(usize, usize)>,
    /// Right columns for variables absent from the left schema
    right_only: Vec<usize>,
}

impl RowCombiner {
    pub fn new(left: &[VarId], right: &[VarId]) -> Self {
        let mut shared = Vec::new();
        let mut right_only = Vec::new();
        let mut combined: Vec<VarId> = left.to_vec();

        for (j, var) in right.iter().enumerate() {
            match left.iter().position(|v| v == var) {
                Some(i) => shared.push((i, j)),
                None => {
                    right_only.push(j);
                    combined.push(*var);
                }
            }
        }

        Self {
            combined_schema: Arc::from(combined.into_boxed_slice()),
            shared,
            right_only,
        }
    }

    pub fn schema(&self) -> &Arc<[VarId]> {
        &self.combined_schema
    }

    /// Merge a left row with a right row, or `None` when a shared variable
    /// is bound to different values on the two sides.
    pub fn try_merge<V: Value>(&self, left: &Row<V>, right: &Row<V>) -> Option<Row<V>> {
        for (i, j) in &self.shared {
            if let (Binding::Bound(x), Binding::Bound(y)) = (left.value_at(*i), right.value_at(*j))
            {
                if x != y {
                    return None;
                }
            }
        }

        let left_len = left.schema().len();
        let mut values: Vec<Binding<V>> = Vec::with_capacity(self.combined_schema.len());
        for i in 0..left_len {
            values.push(left.value_at(i).clone());
        }
        // Shared vars unbound on the left take the right side's binding.
        for (i, j) in &self.shared {
            if !values[*i].is_bound() {
                values[*i] = right.value_at(*j).clone();
            }
        }
        for j in &self.right_only {
            values.push(right.value_at(*j).clone());
        }

        Some(Row::from_parts(self.combined_schema.clone(), values))
    }

    /// Extend a left row over the combined schema, leaving right-only
    /// variables unbound. Used for preserved rows in left joins.
    pub fn extend_left<V: Value>(&self, left: &Row<V>) -> Row<V> {
        let left_len = left.schema().len();
        let mut values: Vec<Binding<V>> = Vec::with_capacity(self.combined_schema.len());
        for i in 0..left_len {
            values.push(left.value_at(i).clone());
        }
        for _ in &self.right_only {
            values.push(Binding::Unbound);
        }
        Row::from_parts(self.combined_schema.clone(), values)
    }
}

//! Binding and row types for join execution
//!
//! This module contains:
//! - `Value`: the capability bound required of the term type
//! - `Binding<V>`: a single slot in a row (bound value or unbound marker)
//! - `Row<V>`: one solution - positional bindings against a schema
//! - `merge`: the compatibility/merge rule joining two rows
//!
//! The engine never interprets the structure of a value; it only compares
//! values for equality and hashes them for key projection.

use crate::error::{JoinError, Result};
use crate::var_registry::VarId;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Capability bound for the term/value type the engine joins over.
///
/// Blanket-implemented; callers never implement it by hand.
pub trait Value: Debug + Clone + Eq + Hash + Send + Sync + 'static {}

impl<T: Debug + Clone + Eq + Hash + Send + Sync + 'static> Value for T {}

/// A single slot in a row: a bound value or the unbound marker.
///
/// `Unbound` is how a preserved left-join row extends over variables that
/// only the right side advertises. It is compatible with anything during
/// merging; the bound side's value wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding<V> {
    /// Variable is not bound
    Unbound,
    /// Variable is bound to a value
    Bound(V),
}

impl<V> Binding<V> {
    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }

    pub fn as_value(&self) -> Option<&V> {
        match self {
            Binding::Bound(v) => Some(v),
            Binding::Unbound => None,
        }
    }
}

/// One solution row: bindings in schema order.
///
/// # Invariants
///
/// - `values.len() == schema.len()`
/// - The schema contains no duplicate variables
///
/// Rows are immutable after construction. Schema and values are Arc-backed,
/// so cloning a row is two reference-count bumps; tables and pending queues
/// clone rows freely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row<V> {
    schema: Arc<[VarId]>,
    values: Arc<[Binding<V>]>,
}

impl<V: Value> Row<V> {
    /// Create a row, validating the value count against the schema.
    pub fn new(schema: Arc<[VarId]>, values: Vec<Binding<V>>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(JoinError::Internal(format!(
                "row has {} values for {} schema variables",
                values.len(),
                schema.len()
            )));
        }
        debug_assert!(
            (1..schema.len()).all(|i| !schema[..i].contains(&schema[i])),
            "row schema contains duplicate variables"
        );
        Ok(Self::from_parts(schema, values))
    }

    /// Internal constructor for callers that already hold the invariants.
    pub(crate) fn from_parts(schema: Arc<[VarId]>, values: Vec<Binding<V>>) -> Self {
        Self {
            schema,
            values: Arc::from(values.into_boxed_slice()),
        }
    }

    /// The ordered variable set this row is positioned against.
    pub fn schema(&self) -> &[VarId] {
        &self.schema
    }

    /// Binding at a schema position. Panics on out-of-range columns; callers
    /// index with positions derived from this row's own schema.
    pub fn value_at(&self, col: usize) -> &Binding<V> {
        &self.values[col]
    }

    /// Value bound to `var`, or None when the variable is absent or unbound.
    /// Never errors for an unknown variable.
    pub fn get(&self, var: VarId) -> Option<&V> {
        let col = self.schema.iter().position(|v| *v == var)?;
        self.values[col].as_value()
    }

    /// Whether `var` is bound in this row.
    pub fn contains(&self, var: VarId) -> bool {
        self.get(var).is_some()
    }

    /// Number of bound variables (unbound slots do not count).
    pub fn size(&self) -> usize {
        self.values.iter().filter(|b| b.is_bound()).count()
    }

    /// True iff no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Bound (variable, value) pairs in schema order.
    ///
    /// Useful for order-insensitive comparison: two rows are the same
    /// solution iff their sorted pair lists are equal.
    pub fn bound_pairs(&self) -> Vec<(VarId, &V)> {
        self.schema
            .iter()
            .zip(self.values.iter())
            .filter_map(|(var, b)| b.as_value().map(|v| (*var, v)))
            .collect()
    }
}

/// Merge two rows if they are compatible.
///
/// Two rows are compatible iff every variable bound in both carries equal
/// values. The merged row's domain is the union of both domains: `a`'s
/// schema first, then `b`-only variables. A variable bound on one side only
/// takes the bound side's value; incompatibility returns `None` without
/// allocating.
///
/// `None` is the expected outcome for most pairs in a join - it is not an
/// error. Algorithms use [`crate::combine::RowCombiner`] instead, which
/// precomputes the column mapping for a fixed schema pair; this standalone
/// form exists for callers merging rows of arbitrary shape.
pub fn merge<V: Value>(a: &Row<V>, b: &Row<V>) -> Option<Row<V>> {
    // Compatibility pass first: no allocation before we know the pair merges.
    for (i, var) in a.schema().iter().enumerate() {
        if let Some(j) = b.schema().iter().position(|v| v == var) {
            if let (Binding::Bound(x), Binding::Bound(y)) = (a.value_at(i), b.value_at(j)) {
                if x != y {
                    return None;
                }
            }
        }
    }

    let mut schema: Vec<VarId> = a.schema().to_vec();
    let mut values: Vec<Binding<V>> = a.values.to_vec();

    // Shared variables unbound on the `a` side take `b`'s binding.
    for (i, var) in a.schema().iter().enumerate() {
        if !values[i].is_bound() {
            if let Some(j) = b.schema().iter().position(|v| v == var) {
                values[i] = b.value_at(j).clone();
            }
        }
    }

    for (j, var) in b.schema().iter().enumerate() {
        if !a.schema().contains(var) {
            schema.push(*var);
            values.push(b.value_at(j).clone());
        }
    }

    Some(Row::from_parts(
        Arc::from(schema.into_boxed_slice()),
        values,
    ))
}

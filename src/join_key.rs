//! Join key: the variable set two sides are matched on, and the projection
//! of a row onto that set for hash bucketing.

use crate::binding::{Row, Value};
use crate::context::ExecutionContext;
use crate::error::{JoinError, Result};
use crate::var_registry::VarId;

/// Ordered set of variables a hash-based join equates rows on.
///
/// An empty key is legal: every pair of rows projects to the same (empty)
/// key, so a keyed join degrades to comparing all pairs rather than
/// silently dropping rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinKey {
    vars: Box<[VarId]>,
}

impl JoinKey {
    pub fn new(vars: Vec<VarId>) -> Self {
        Self {
            vars: vars.into_boxed_slice(),
        }
    }

    /// Derive the key from two schemas: the shared variables, in left
    /// schema order.
    pub fn from_schemas(left: &[VarId], right: &[VarId]) -> Self {
        let vars: Vec<VarId> = left
            .iter()
            .filter(|v| right.contains(v))
            .copied()
            .collect();
        Self::new(vars)
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Reject keys naming variables neither input advertises.
    ///
    /// Called once at open; a key var missing from both schemas can never
    /// match and signals a planner bug, so it is an error rather than an
    /// empty result.
    pub fn check_covers(
        &self,
        left: &[VarId],
        right: &[VarId],
        ctx: &ExecutionContext<'_>,
    ) -> Result<()> {
        for var in self.vars.iter() {
            if !left.contains(var) && !right.contains(var) {
                let name = ctx
                    .vars
                    .name_of(*var)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("?{}", var.0));
                return Err(JoinError::MalformedJoinKey(format!(
                    "join key variable {} appears in neither input schema",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Project a row onto the key.
    ///
    /// Returns `None` when any key variable is unbound or absent in the
    /// row; such rows cannot be bucketed and must be matched by scanning.
    pub fn key_of<V: Value>(&self, row: &Row<V>) -> Option<Key<V>> {
        let mut values = Vec::with_capacity(self.vars.len());
        for var in self.vars.iter() {
            values.push(row.get(*var)?.clone());
        }
        Some(Key(values.into_boxed_slice()))
    }
}

/// A row's projection onto a join key: the key variables' values in key
/// order. Hash/Eq derive from the value type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key<V>(Box<[V]>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::var_registry::VarRegistry;
    use std::sync::Arc;

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

    #[test]
    fn test_from_schemas_intersection_in_left_order() {
        let left = [VarId(2), VarId(0), VarId(1)];
        let right = [VarId(1), VarId(2), VarId(5)];
        let key = JoinKey::from_schemas(&left, &right);
        assert_eq!(key.vars(), &[VarId(2), VarId(1)]);
    }

    #[test]
    fn test_from_schemas_disjoint_is_empty() {
        let key = JoinKey::from_schemas(&[VarId(0)], &[VarId(1)]);
        assert!(key.is_empty());
    }

    #[test]
    fn test_key_of_bound_and_unbound() {
        let key = JoinKey::new(vec![VarId(0), VarId(1)]);
        let full = row(&[0, 1, 2], &[Some(1), Some(2), Some(3)]);
        assert_eq!(key.key_of(&full), key.key_of(&row(&[1, 0], &[Some(2), Some(1)])));

        // Unbound key var: no projection.
        let partial = row(&[0, 1], &[Some(1), None]);
        assert!(key.key_of(&partial).is_none());

        // Absent key var: no projection.
        let absent = row(&[0], &[Some(1)]);
        assert!(key.key_of(&absent).is_none());
    }

    #[test]
    fn test_empty_key_projects_everything_equal() {
        let key = JoinKey::new(vec![]);
        let a = key.key_of(&row(&[0], &[Some(1)])).unwrap();
        let b = key.key_of(&row(&[1], &[Some(9)])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_check_covers() {
        let mut vars = VarRegistry::new();
        let x = vars.intern("x");
        let y = vars.intern("y");
        let z = vars.intern("z");
        let ctx = ExecutionContext::new(&vars);

        let key = JoinKey::new(vec![x]);
        assert!(key.check_covers(&[x, y], &[x, z], &ctx).is_ok());

        // Covered by one side only is still fine.
        assert!(key.check_covers(&[y], &[x], &ctx).is_ok());

        let bad = JoinKey::new(vec![z]);
        let err = bad.check_covers(&[x], &[y], &ctx).unwrap_err();
        assert!(matches!(err, JoinError::MalformedJoinKey(_)));
    }
}

//! Variable interning.
//!
//! Everything inside the engine speaks `VarId`: schemas, join keys and key
//! projections compare and hash the compact id, never the surface name.
//! The registry exists for the boundary in both directions - interning
//! names when inputs are built, and recovering a name when an error
//! message wants to point at a variable.

use std::collections::HashMap;

/// Compact variable identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u16);

/// Name table minting `VarId`s.
///
/// Interning the same name twice yields the same id. Ids are dense and
/// start at zero, so a registry with n names covers exactly `VarId(0)`
/// through `VarId(n - 1)`.
#[derive(Debug, Default)]
pub struct VarRegistry {
    ids: HashMap<String, VarId>,
    names: Vec<String>,
}

impl VarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, minting a fresh id on first sight.
    pub fn intern(&mut self, name: &str) -> VarId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let next = self.names.len();
        assert!(
            next < u16::MAX as usize,
            "variable id space exhausted at {next} names"
        );
        let id = VarId(next as u16);
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        id
    }

    /// Name behind an id, when this registry minted it.
    ///
    /// Ids from elsewhere (callers may construct `VarId`s directly) resolve
    /// to `None`; diagnostics then fall back to the numeric id.
    pub fn name_of(&self, id: VarId) -> Option<&str> {
        self.names.get(id.0 as usize).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut vars = VarRegistry::new();
        let x = vars.intern("x");
        let y = vars.intern("y");
        assert_ne!(x, y);
        assert_eq!(vars.intern("x"), x);
        assert_eq!(vars.name_of(x), Some("x"));
        assert_eq!(vars.name_of(y), Some("y"));
    }

    #[test]
    fn test_unknown_id_has_no_name() {
        let vars = VarRegistry::new();
        assert_eq!(vars.name_of(VarId(3)), None);
    }

    #[test]
    fn test_ids_are_dense() {
        let mut vars = VarRegistry::new();
        for i in 0..5u16 {
            assert_eq!(vars.intern(&format!("v{i}")), VarId(i));
        }
    }
}

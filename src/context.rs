//! Per-execution context threaded through operator calls.

use crate::tracking::Tracker;
use crate::var_registry::VarRegistry;

/// Read-only execution environment: the variable registry for diagnostics
/// and a tracker for fuel accounting and cancellation.
pub struct ExecutionContext<'a> {
    pub vars: &'a VarRegistry,
    pub tracker: Tracker,
}

impl<'a> ExecutionContext<'a> {
    /// Context with tracking disabled.
    pub fn new(vars: &'a VarRegistry) -> Self {
        Self {
            vars,
            tracker: Tracker::disabled(),
        }
    }

    pub fn with_tracker(vars: &'a VarRegistry, tracker: Tracker) -> Self {
        Self { vars, tracker }
    }
}

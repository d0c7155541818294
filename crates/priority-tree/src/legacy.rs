//! Evaluation modes.
//!
//! Older rule content was written for a simpler evaluator that only knows
//! positive conditions. [`EvalMode::Legacy`] keeps that content working: an
//! `Unless` guard is reported and treated as absent, exactly as the simpler
//! evaluator ignored fields it did not understand. Wake-time replacement
//! versus tightening is a scheduling concern and lives with the caller's
//! [`EvalContext`](crate::EvalContext).

use tracing::warn;

use crate::{Condition, Guard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    #[default]
    Priority,
    Legacy,
}

impl EvalMode {
    pub(crate) fn guard_holds<C, Cd>(
        self,
        guard: Option<&Guard<Cd>>,
        ctx: &mut C,
        label: Option<&str>,
    ) -> bool
    where
        Cd: Condition<C>,
    {
        match (self, guard) {
            (_, None) => true,
            (_, Some(Guard::When(condition))) => condition.check(ctx),
            (EvalMode::Priority, Some(Guard::Unless(condition))) => !condition.check(ctx),
            (EvalMode::Legacy, Some(Guard::Unless(_))) => {
                warn!(
                    target: "priority_tree::eval",
                    node = label.unwrap_or("<unlabelled>"),
                    "legacy evaluator ignores negated guards"
                );
                true
            }
        }
    }
}

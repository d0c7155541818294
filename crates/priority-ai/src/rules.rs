//! Custom rules registered by rule authors.
//!
//! The catalog covers the common vocabulary as enum variants. Anything else
//! is registered here under a name, interned to a [`RuleId`], and referenced
//! from trees through the `Custom` variants. Resolution by name happens once,
//! when a tree is authored; evaluation only ever sees ids.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::AiContext;
use crate::error::{AiError, Result};
use crate::events::GameEvent;

/// Interned rule name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

pub type ConditionFn = Arc<dyn Fn(&mut AiContext<'_>) -> bool + Send + Sync>;
/// Used for configurations, behaviours and waypoint generators alike.
pub type ActionFn = Arc<dyn Fn(&mut AiContext<'_>) + Send + Sync>;
pub type ResponseFn = Arc<dyn Fn(&mut AiContext<'_>, &GameEvent) + Send + Sync>;

#[derive(Default)]
pub struct RuleTable {
    ids: HashMap<String, RuleId>,
    names: Vec<String>,
    conditions: HashMap<RuleId, ConditionFn>,
    actions: HashMap<RuleId, ActionFn>,
    responses: HashMap<RuleId, ResponseFn>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_condition(
        &mut self,
        name: &str,
        f: impl Fn(&mut AiContext<'_>) -> bool + Send + Sync + 'static,
    ) -> RuleId {
        let id = self.intern(name);
        self.conditions.insert(id, Arc::new(f));
        id
    }

    /// Registers a configuration, behaviour or waypoint generator.
    pub fn register_action(
        &mut self,
        name: &str,
        f: impl Fn(&mut AiContext<'_>) + Send + Sync + 'static,
    ) -> RuleId {
        let id = self.intern(name);
        self.actions.insert(id, Arc::new(f));
        id
    }

    pub fn register_response(
        &mut self,
        name: &str,
        f: impl Fn(&mut AiContext<'_>, &GameEvent) + Send + Sync + 'static,
    ) -> RuleId {
        let id = self.intern(name);
        self.responses.insert(id, Arc::new(f));
        id
    }

    /// Looks up a previously registered name.
    pub fn id(&self, name: &str) -> Result<RuleId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| AiError::UnknownRule(name.to_string()))
    }

    pub fn name(&self, id: RuleId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn condition(&self, id: RuleId) -> Option<ConditionFn> {
        self.conditions.get(&id).cloned()
    }

    pub fn action(&self, id: RuleId) -> Option<ActionFn> {
        self.actions.get(&id).cloned()
    }

    pub fn response(&self, id: RuleId) -> Option<ResponseFn> {
        self.responses.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn intern(&mut self, name: &str) -> RuleId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = RuleId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }
}

impl fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTable")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_interned_once() {
        let mut rules = RuleTable::new();
        let a = rules.register_condition("isMiner", |_| true);
        let b = rules.register_action("isMiner", |_| {});
        assert_eq!(a, b);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.name(a), Some("isMiner"));
        assert!(rules.condition(a).is_some());
        assert!(rules.action(a).is_some());
        assert!(rules.response(a).is_none());
    }

    #[test]
    fn unknown_name_is_an_error() {
        let rules = RuleTable::new();
        assert!(matches!(rules.id("nope"), Err(AiError::UnknownRule(name)) if name == "nope"));
    }
}

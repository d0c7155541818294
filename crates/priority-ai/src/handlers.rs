//! Event handler table.
//!
//! A behaviour describes the reactions it wants as a [`HandlerSet`]. The
//! [`HandlerManager`] diffs it against what is installed so that unchanged
//! bindings survive untouched across reconsiderations. Two bindings are
//! mandatory: `aiAwoken` reconsiders and `shipDied` tears the controller
//! down.

use std::collections::BTreeMap;

use tracing::{trace, warn};

use crate::events::EventKind;
use crate::responses::Response;

/// Reactions requested by a behaviour.
///
/// An entry may be `None`, which mirrors an author binding something that
/// cannot be called. Such entries are reported and skipped on install.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerSet {
    entries: BTreeMap<EventKind, Option<Response>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: EventKind, response: Response) -> Self {
        self.insert(kind, response);
        self
    }

    pub fn insert(&mut self, kind: EventKind, response: Response) {
        self.entries.insert(kind, Some(response));
    }

    /// Binds `kind` to a possibly missing response.
    pub fn insert_raw(&mut self, kind: EventKind, response: Option<Response>) {
        self.entries.insert(kind, response);
    }

    pub fn remove(&mut self, kind: EventKind) {
        self.entries.remove(&kind);
    }

    pub fn get(&self, kind: EventKind) -> Option<Response> {
        self.entries.get(&kind).copied().flatten()
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventKind, Option<Response>)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

/// One installed binding. `serial` changes only when the binding is
/// (re)installed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub response: Response,
    pub serial: u64,
}

/// What an `apply` call changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerDiff {
    pub installed: Vec<EventKind>,
    pub removed: Vec<EventKind>,
    pub skipped: Vec<EventKind>,
}

#[derive(Debug, Default)]
pub struct HandlerManager {
    installed: BTreeMap<EventKind, Binding>,
    next_serial: u64,
}

impl HandlerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `set` by difference, forcing the two mandatory bindings.
    pub fn apply(&mut self, set: &HandlerSet, role: &str) -> HandlerDiff {
        let mut diff = HandlerDiff::default();
        let mut wanted = self.callable(set, role, &mut diff);
        wanted.insert(EventKind::AiAwoken, Response::Reconsider);
        wanted.insert(EventKind::ShipDied, Response::Teardown);

        self.installed.retain(|kind, binding| {
            let keep = wanted.get(kind) == Some(&binding.response);
            if !keep {
                diff.removed.push(*kind);
            }
            keep
        });
        for (kind, response) in wanted {
            if !self.installed.contains_key(&kind) {
                self.bind(kind, response);
                diff.installed.push(kind);
            }
        }
        trace!(
            target: "priority_ai::handlers",
            installed = diff.installed.len(),
            removed = diff.removed.len(),
            "applied handlers"
        );
        diff
    }

    /// Installs `set` wholesale, rebinding every entry. Only the teardown
    /// binding is mandatory.
    pub fn replace_all(&mut self, set: &HandlerSet, role: &str) -> HandlerDiff {
        let mut diff = HandlerDiff {
            removed: self.installed.keys().copied().collect(),
            ..HandlerDiff::default()
        };
        self.installed.clear();
        let mut wanted = self.callable(set, role, &mut diff);
        wanted.insert(EventKind::ShipDied, Response::Teardown);
        for (kind, response) in wanted {
            self.bind(kind, response);
            diff.installed.push(kind);
        }
        diff
    }

    /// Removes every binding, mandatory ones included.
    pub fn clear(&mut self) {
        self.installed.clear();
    }

    pub fn response_for(&self, kind: EventKind) -> Option<Response> {
        self.installed.get(&kind).map(|b| b.response)
    }

    pub fn binding(&self, kind: EventKind) -> Option<Binding> {
        self.installed.get(&kind).copied()
    }

    pub fn installed(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.installed.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    fn callable(
        &self,
        set: &HandlerSet,
        role: &str,
        diff: &mut HandlerDiff,
    ) -> BTreeMap<EventKind, Response> {
        let mut wanted = BTreeMap::new();
        for (kind, response) in set.iter() {
            match response {
                Some(response) => {
                    wanted.insert(kind, response);
                }
                None => {
                    warn!(
                        target: "priority_ai::handlers",
                        event = %kind,
                        role,
                        "handler is not callable; skipped"
                    );
                    diff.skipped.push(kind);
                }
            }
        }
        wanted
    }

    fn bind(&mut self, kind: EventKind, response: Response) {
        self.next_serial += 1;
        self.installed.insert(
            kind,
            Binding {
                response,
                serial: self.next_serial,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mandatory_handlers_always_present() {
        let mut manager = HandlerManager::new();
        manager.apply(&HandlerSet::new(), "trader");
        assert_eq!(manager.response_for(EventKind::AiAwoken), Some(Response::Reconsider));
        assert_eq!(manager.response_for(EventKind::ShipDied), Some(Response::Teardown));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn diff_keeps_unchanged_bindings() {
        let mut manager = HandlerManager::new();
        let first = HandlerSet::new()
            .with(EventKind::ShipAttackedOther, Response::ShipAttackedOther)
            .with(EventKind::ShipKilledOther, Response::ShipKilledOther);
        manager.apply(&first, "trader");
        let before = manager.binding(EventKind::ShipAttackedOther).unwrap();

        let second = HandlerSet::new()
            .with(EventKind::ShipAttackedOther, Response::ShipAttackedOther)
            .with(EventKind::ShipFiredMissile, Response::ShipFiredMissile);
        let diff = manager.apply(&second, "trader");

        assert_eq!(diff.removed, vec![EventKind::ShipKilledOther]);
        assert_eq!(diff.installed, vec![EventKind::ShipFiredMissile]);
        assert_eq!(manager.binding(EventKind::ShipAttackedOther), Some(before));
        assert!(manager.response_for(EventKind::ShipKilledOther).is_none());
    }

    #[test]
    fn changed_binding_is_reinstalled() {
        let mut manager = HandlerManager::new();
        manager.apply(
            &HandlerSet::new().with(EventKind::ShipTargetLost, Response::ShipTargetLost),
            "trader",
        );
        let diff = manager.apply(
            &HandlerSet::new().with(EventKind::ShipTargetLost, Response::ExpectWitchspaceTargetLost),
            "trader",
        );
        assert_eq!(diff.removed, vec![EventKind::ShipTargetLost]);
        assert_eq!(diff.installed, vec![EventKind::ShipTargetLost]);
        assert_eq!(
            manager.response_for(EventKind::ShipTargetLost),
            Some(Response::ExpectWitchspaceTargetLost)
        );
    }

    #[test]
    fn uncallable_entries_are_skipped() {
        let mut manager = HandlerManager::new();
        let mut set = HandlerSet::new();
        set.insert_raw(EventKind::EscortDock, None);
        let diff = manager.apply(&set, "escort");
        assert_eq!(diff.skipped, vec![EventKind::EscortDock]);
        assert!(manager.response_for(EventKind::EscortDock).is_none());
    }

    #[test]
    fn mandatory_handlers_cannot_be_overridden() {
        let mut manager = HandlerManager::new();
        let set = HandlerSet::new().with(EventKind::ShipDied, Response::ShipKilledOther);
        manager.apply(&set, "trader");
        assert_eq!(manager.response_for(EventKind::ShipDied), Some(Response::Teardown));
    }

    #[test]
    fn replace_all_rebinds_everything() {
        let mut manager = HandlerManager::new();
        let set = HandlerSet::new().with(EventKind::ShipTargetLost, Response::ShipTargetLost);
        manager.replace_all(&set, "trader");
        let before = manager.binding(EventKind::ShipTargetLost).unwrap();
        manager.replace_all(&set, "trader");
        let after = manager.binding(EventKind::ShipTargetLost).unwrap();
        assert_ne!(before.serial, after.serial);
        assert!(manager.response_for(EventKind::AiAwoken).is_none());
        assert_eq!(manager.response_for(EventKind::ShipDied), Some(Response::Teardown));
    }

    #[test]
    fn clear_removes_mandatory_bindings() {
        let mut manager = HandlerManager::new();
        manager.apply(&HandlerSet::new(), "trader");
        manager.clear();
        assert!(manager.is_empty());
    }
}

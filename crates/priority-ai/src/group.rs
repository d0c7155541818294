//! Shared state of a ship group.
//!
//! Groups belong to the host. The engine reads membership through
//! [`Host::group`] and writes only two things: the leader (once, when none is
//! alive) and the [`GroupBlackboard`] every member may consult.

use tracing::debug;

use crate::host::{EntityId, GroupId, Host};

/// Scratch state shared by all members of one group.
///
/// Members write through the methods below; fields stay public for hosts
/// that persist or inspect groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupBlackboard {
    /// Tonnes of cargo demanded from the current victim.
    pub cargo_demand: Option<u32>,
    pub cargo_demand_met: bool,
    /// Largest member count seen since combat began.
    pub group_power: Option<f64>,
}

impl GroupBlackboard {
    /// Records a demand unless one is already outstanding. Returns whether
    /// this call placed it.
    pub fn demand_cargo(&mut self, tonnes: u32) -> bool {
        if self.cargo_demand.is_some() {
            return false;
        }
        self.cargo_demand = Some(tonnes);
        self.cargo_demand_met = false;
        true
    }

    pub fn mark_demand_met(&mut self) {
        self.cargo_demand_met = true;
    }

    pub fn forget_cargo_demand(&mut self) {
        self.cargo_demand = None;
        self.cargo_demand_met = false;
    }

    /// Remembers the strongest the group has been. Returns the recorded
    /// strength.
    pub fn record_power(&mut self, members: usize) -> f64 {
        let members = members as f64;
        let power = self.group_power.get_or_insert(members);
        if members > *power {
            *power = members;
        }
        *power
    }

    /// True once the group has lost a quarter of its recorded strength.
    pub fn attrition_reached(&self, members: usize) -> bool {
        self.group_power
            .is_some_and(|power| (members as f64) < power * 0.75)
    }
}

/// The group's leader, if it is still alive.
pub fn live_leader(host: &dyn Host, group: GroupId) -> Option<EntityId> {
    let leader = host.group(group)?.leader?;
    host.ship(leader).map(|_| leader)
}

/// Live members of `group`, leader included.
pub fn live_members(host: &dyn Host, group: GroupId) -> Vec<EntityId> {
    host.group(group)
        .map(|g| {
            g.ships
                .iter()
                .copied()
                .filter(|&id| host.ship(id).is_some_and(|s| s.is_in_space()))
                .collect()
        })
        .unwrap_or_default()
}

/// Appoints a leader if the group has none alive.
///
/// Preference goes to the first member able to jump on its own, so a group
/// never ends up led by a ship that cannot take it out of the system.
/// `leader_role` replaces the new leader's primary role when given.
pub fn appoint_leader(
    host: &mut dyn Host,
    group: GroupId,
    leader_role: Option<&str>,
) -> Option<EntityId> {
    if let Some(leader) = live_leader(host, group) {
        return Some(leader);
    }
    let members = live_members(host, group);
    let chosen = members
        .iter()
        .copied()
        .find(|&id| host.ship(id).is_some_and(|s| s.has_hyperspace_motor()))
        .or_else(|| members.first().copied())?;

    host.group_mut(group)?.leader = Some(chosen);
    if let Some(role) = leader_role
        && let Some(ship) = host.ship_mut(chosen)
    {
        ship.primary_role = role.to_string();
    }
    debug!(
        target: "priority_ai::catalog",
        group = group.0,
        leader = %chosen,
        "appointed group leader"
    );
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Equipment, GroupState, InMemoryHost, ShipState};

    fn host_with_group() -> InMemoryHost {
        let mut host = InMemoryHost::new();
        let mut slow = ShipState::new(EntityId(1), "pirate");
        slow.equipment = Equipment::empty();
        host.add_ship(slow);
        host.add_ship(ShipState::new(EntityId(2), "pirate"));
        host.add_ship(ShipState::new(EntityId(3), "pirate"));
        host.add_group(GroupState::new(
            GroupId(1),
            vec![EntityId(1), EntityId(2), EntityId(3)],
        ));
        host
    }

    #[test]
    fn appoints_first_member_with_hyperdrive() {
        let mut host = host_with_group();
        let leader = appoint_leader(&mut host, GroupId(1), Some("pirate-leader"));
        assert_eq!(leader, Some(EntityId(2)));
        assert_eq!(host.ship(EntityId(2)).unwrap().primary_role, "pirate-leader");
    }

    #[test]
    fn existing_leader_is_kept() {
        let mut host = host_with_group();
        host.group_mut(GroupId(1)).unwrap().leader = Some(EntityId(3));
        assert_eq!(appoint_leader(&mut host, GroupId(1), None), Some(EntityId(3)));
    }

    #[test]
    fn dead_leader_is_replaced() {
        let mut host = host_with_group();
        host.group_mut(GroupId(1)).unwrap().leader = Some(EntityId(3));
        host.ships.remove(&EntityId(3));
        assert_eq!(appoint_leader(&mut host, GroupId(1), None), Some(EntityId(2)));
    }

    #[test]
    fn attrition_uses_peak_recorded_power() {
        let mut board = GroupBlackboard::default();
        assert_eq!(board.record_power(3), 3.0);
        assert_eq!(board.record_power(4), 4.0);
        assert_eq!(board.record_power(2), 4.0);
        assert!(!board.attrition_reached(3));
        assert!(board.attrition_reached(2));
    }

    #[test]
    fn only_one_outstanding_cargo_demand() {
        let mut board = GroupBlackboard::default();
        assert!(board.demand_cargo(10));
        assert!(!board.demand_cargo(5));
        board.mark_demand_met();
        board.forget_cargo_demand();
        assert!(!board.cargo_demand_met);
        assert!(board.demand_cargo(5));
    }
}

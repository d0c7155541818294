//! A self-contained [`Host`] for tests and headless tools.
//!
//! Positions and scanner contents are computed from the stored ship states;
//! everything a controller sends back is recorded for inspection.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{
    DockingInstructions, EntityId, GroupId, GroupState, Host, Obstacle, ScanClass,
    ScheduledAction, ShipCommand, ShipEffect, ShipState, ShipStatus, SystemId, SystemInfo, Vector,
    Wormhole,
};

#[derive(Debug, Default)]
pub struct InMemoryHost {
    pub clock: f64,
    pub ships: BTreeMap<EntityId, ShipState>,
    pub groups: BTreeMap<GroupId, GroupState>,
    pub system: SystemInfo,
    pub wormholes: Vec<Wormhole>,
    /// Threat overrides; unlisted entities score 1.
    pub threats: HashMap<EntityId, f64>,
    /// Category name to member roles.
    pub role_categories: HashMap<String, HashSet<String>>,
    /// Neighbouring systems and their distance in light years.
    pub neighbours: Vec<(SystemId, f64)>,
    pub routes: HashMap<SystemId, SystemId>,
    pub blockers: HashMap<EntityId, Obstacle>,
    /// Reply each station gives to docking requests.
    pub docking_replies: HashMap<EntityId, DockingInstructions>,
    pub exit_allowed: bool,
    pub escort_offers_accepted: bool,

    pub commands: Vec<(EntityId, ShipCommand)>,
    pub effects: Vec<(EntityId, ShipEffect)>,
    pub messages: Vec<(EntityId, String)>,
    pub timers: Vec<(EntityId, f64, ScheduledAction)>,
    pub exits: Vec<(EntityId, Option<SystemId>)>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            clock: 1_000.0,
            exit_allowed: true,
            ..Self::default()
        }
    }

    pub fn add_ship(&mut self, ship: ShipState) -> EntityId {
        let id = ship.id;
        self.ships.insert(id, ship);
        id
    }

    /// Stores a group and points each member's `group` field at it.
    pub fn add_group(&mut self, group: GroupState) -> GroupId {
        let id = group.id;
        for member in &group.ships {
            if let Some(ship) = self.ships.get_mut(member) {
                ship.group = Some(id);
            }
        }
        self.groups.insert(id, group);
        id
    }

    /// Stores an escort group and points the leader's `escort_group` at it.
    pub fn add_escort_group(&mut self, leader: EntityId, group: GroupState) -> GroupId {
        let id = group.id;
        if let Some(ship) = self.ships.get_mut(&leader) {
            ship.escort_group = Some(id);
        }
        self.groups.insert(id, group);
        id
    }

    pub fn add_to_category(&mut self, category: &str, role: &str) {
        self.role_categories
            .entry(category.to_string())
            .or_default()
            .insert(role.to_string());
    }

    pub fn advance(&mut self, seconds: f64) {
        self.clock += seconds;
    }

    /// Removes an entity as if it had been destroyed.
    pub fn destroy(&mut self, id: EntityId) {
        self.ships.remove(&id);
        for group in self.groups.values_mut() {
            group.remove(id);
        }
    }

    pub fn last_command(&self, id: EntityId) -> Option<ShipCommand> {
        self.commands
            .iter()
            .rev()
            .find(|(ship, _)| *ship == id)
            .map(|(_, command)| *command)
    }

    pub fn messages_from(&self, id: EntityId) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(ship, _)| *ship == id)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    pub fn effects_of(&self, id: EntityId) -> Vec<ShipEffect> {
        self.effects
            .iter()
            .filter(|(ship, _)| *ship == id)
            .map(|(_, effect)| *effect)
            .collect()
    }

    fn position(&self, id: EntityId) -> Option<Vector> {
        self.ships.get(&id).map(|s| s.position)
    }
}

impl Host for InMemoryHost {
    fn now(&self) -> f64 {
        self.clock
    }

    fn ship(&self, id: EntityId) -> Option<&ShipState> {
        self.ships.get(&id)
    }

    fn ship_mut(&mut self, id: EntityId) -> Option<&mut ShipState> {
        self.ships.get_mut(&id)
    }

    fn group(&self, id: GroupId) -> Option<&GroupState> {
        self.groups.get(&id)
    }

    fn group_mut(&mut self, id: GroupId) -> Option<&mut GroupState> {
        self.groups.get_mut(&id)
    }

    fn system(&self) -> &SystemInfo {
        &self.system
    }

    fn stations(&self) -> Vec<EntityId> {
        self.ships
            .values()
            .filter(|s| s.is_station && s.status != ShipStatus::Dead)
            .map(|s| s.id)
            .collect()
    }

    fn wormholes(&self) -> &[Wormhole] {
        &self.wormholes
    }

    fn player(&self) -> Option<EntityId> {
        self.ships
            .values()
            .find(|s| s.is_player && s.status != ShipStatus::Dead)
            .map(|s| s.id)
    }

    fn scan(&self, id: EntityId, ignore_unpowered: bool) -> Vec<EntityId> {
        let Some(me) = self.ships.get(&id) else {
            return Vec::new();
        };
        let mut seen: Vec<(f64, EntityId)> = self
            .ships
            .values()
            .filter(|s| s.id != id && s.status != ShipStatus::Dead)
            .filter(|s| {
                !ignore_unpowered
                    || !matches!(s.scan_class, ScanClass::Cargo | ScanClass::Rock | ScanClass::Buoy)
            })
            .map(|s| (s.position.distance(me.position), s.id))
            .filter(|(d, _)| *d < me.scanner_range)
            .collect();
        seen.sort_by(|a, b| a.0.total_cmp(&b.0));
        seen.into_iter().map(|(_, id)| id).collect()
    }

    fn threat_assessment(&self, id: EntityId, _full: bool) -> f64 {
        self.threats.get(&id).copied().unwrap_or(1.0)
    }

    fn in_role_category(&self, id: EntityId, category: &str) -> bool {
        let Some(ship) = self.ships.get(&id) else {
            return false;
        };
        self.role_categories
            .get(category)
            .is_some_and(|roles| roles.contains(&ship.primary_role))
    }

    fn systems_in_range(&self, fuel: f64) -> Vec<SystemId> {
        self.neighbours
            .iter()
            .filter(|(_, d)| *d <= fuel)
            .map(|(s, _)| *s)
            .collect()
    }

    fn distance_to_system(&self, system: SystemId) -> f64 {
        if system == self.system.id {
            return 0.0;
        }
        self.neighbours
            .iter()
            .find(|(s, _)| *s == system)
            .map_or(f64::INFINITY, |(_, d)| *d)
    }

    fn route_next_hop(&self, system: SystemId) -> Option<SystemId> {
        self.routes.get(&system).copied()
    }

    fn course_blocker(&self, id: EntityId) -> Option<Obstacle> {
        self.blockers.get(&id).copied()
    }

    fn safe_course(&self, id: EntityId) -> Vector {
        let Some(ship) = self.ships.get(&id) else {
            return Vector::ZERO;
        };
        let Some(blocker) = self.blockers.get(&id) else {
            return ship.destination;
        };
        let (centre, radius) = match blocker {
            Obstacle::Planet(body) | Obstacle::Sun(body) => (body.position, body.radius),
            Obstacle::Ship(other) => (
                self.position(*other).unwrap_or(ship.destination),
                1_000.0,
            ),
        };
        let away = (ship.position - centre).normalize_or_zero();
        centre + away * radius * 2.0
    }

    fn command(&mut self, id: EntityId, command: ShipCommand) {
        self.commands.push((id, command));
    }

    fn effect(&mut self, id: EntityId, effect: ShipEffect) {
        self.effects.push((id, effect));
    }

    fn comms_message(&mut self, id: EntityId, message: &str) {
        self.messages.push((id, message.to_string()));
    }

    fn request_docking(&mut self, id: EntityId, station: EntityId) {
        let reply = self.docking_replies.get(&station).copied();
        if let Some(ship) = self.ships.get_mut(&id) {
            ship.docking = reply;
        }
    }

    fn exit_system(&mut self, id: EntityId, destination: Option<SystemId>) -> bool {
        self.exits.push((id, destination));
        if !self.exit_allowed {
            return false;
        }
        if let Some(ship) = self.ships.get_mut(&id) {
            ship.status = ShipStatus::EnteringWitchspace;
        }
        true
    }

    fn offer_to_escort(&mut self, _id: EntityId, _leader: EntityId) -> bool {
        self.escort_offers_accepted
    }

    fn schedule(&mut self, id: EntityId, delay: f64, action: ScheduledAction) {
        self.timers.push((id, self.clock + delay, action));
    }
}

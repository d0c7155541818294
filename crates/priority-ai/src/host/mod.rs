//! The boundary between the decision engine and the simulation.
//!
//! The engine never owns entities. Every lookup goes through [`Host`] and
//! returns `Option`, so an entity destroyed between two accesses within the
//! same pass is simply skipped.

mod command;
mod memory;
mod types;

pub use command::{ScheduledAction, ShipCommand, ShipEffect};
pub use memory::InMemoryHost;
pub use types::{
    AlertCondition, Allegiance, Body, DockingInstructions, DockingMessage, EntityId, Equipment,
    GroupId, GroupState, MissileProfile, Obstacle, ScanClass, ShipState, ShipStatus, SystemId,
    SystemInfo, Vector, Wormhole,
};

/// Services the simulation provides to controllers.
pub trait Host {
    /// Monotonic simulation time in seconds.
    fn now(&self) -> f64;

    fn ship(&self, id: EntityId) -> Option<&ShipState>;
    fn ship_mut(&mut self, id: EntityId) -> Option<&mut ShipState>;

    fn group(&self, id: GroupId) -> Option<&GroupState>;
    fn group_mut(&mut self, id: GroupId) -> Option<&mut GroupState>;

    fn system(&self) -> &SystemInfo;
    fn stations(&self) -> Vec<EntityId>;
    fn wormholes(&self) -> &[Wormhole];
    fn player(&self) -> Option<EntityId>;

    /// Entities on `id`'s scanner, nearest first.
    fn scan(&self, id: EntityId, ignore_unpowered: bool) -> Vec<EntityId>;

    /// Host-side threat score of one entity. `full` includes combat bonuses.
    fn threat_assessment(&self, id: EntityId, full: bool) -> f64;

    /// Whether a ship's primary role belongs to a named role category.
    fn in_role_category(&self, id: EntityId, category: &str) -> bool;

    /// Systems reachable with `fuel` light years of fuel.
    fn systems_in_range(&self, fuel: f64) -> Vec<SystemId>;
    fn distance_to_system(&self, system: SystemId) -> f64;
    /// First hop of the route toward `system`, or `None` if unreachable.
    fn route_next_hop(&self, system: SystemId) -> Option<SystemId>;

    fn course_blocker(&self, id: EntityId) -> Option<Obstacle>;
    fn safe_course(&self, id: EntityId) -> Vector;

    /// Replaces the ship's current flight order.
    fn command(&mut self, id: EntityId, command: ShipCommand);
    fn effect(&mut self, id: EntityId, effect: ShipEffect);
    fn comms_message(&mut self, id: EntityId, message: &str);

    /// Asks `station` for docking instructions and stores them on the ship.
    fn request_docking(&mut self, id: EntityId, station: EntityId);
    /// Attempts a witchspace jump. Returns false if it cannot start.
    fn exit_system(&mut self, id: EntityId, destination: Option<SystemId>) -> bool;
    fn offer_to_escort(&mut self, id: EntityId, leader: EntityId) -> bool;

    /// Runs `action` for `id` once, `delay` seconds from now.
    fn schedule(&mut self, id: EntityId, delay: f64, action: ScheduledAction);
}

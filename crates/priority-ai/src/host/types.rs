//! World data the engine reads through [`Host`](super::Host).

use std::fmt;

use bitflags::bitflags;
use strum::{AsRefStr, Display, EnumString};

use crate::group::GroupBlackboard;

pub type Vector = glam::DVec3;

/// Identifies any simulated entity: ships, stations, missiles, cargo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

/// Identifies a star system within the current galaxy.
pub type SystemId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ScanClass {
    Neutral,
    Police,
    Military,
    Thargoid,
    Station,
    Cargo,
    Rock,
    Buoy,
    Missile,
    Mine,
    Player,
}

impl ScanClass {
    /// Classes that never fight back.
    pub fn is_inanimate(self) -> bool {
        matches!(
            self,
            ScanClass::Rock | ScanClass::Cargo | ScanClass::Buoy | ScanClass::Missile | ScanClass::Mine
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ShipStatus {
    InFlight,
    Launching,
    Docked,
    ExitingWitchspace,
    EnteringWitchspace,
    Dead,
}

impl ShipStatus {
    pub fn is_in_space(self) -> bool {
        matches!(
            self,
            ShipStatus::InFlight | ShipStatus::Launching | ShipStatus::ExitingWitchspace
        )
    }
}

/// Alert level; `Red` is the only level that counts as being in combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum AlertCondition {
    Docked = 0,
    Green = 1,
    Yellow = 2,
    Red = 3,
}

impl AlertCondition {
    /// One step calmer, never below green.
    pub fn reduced(self) -> Self {
        match self {
            AlertCondition::Red => AlertCondition::Yellow,
            AlertCondition::Yellow | AlertCondition::Green => AlertCondition::Green,
            AlertCondition::Docked => AlertCondition::Docked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Allegiance {
    Galcop,
    Neutral,
    Chaotic,
    Pirate,
    Hunter,
    Private,
    Restricted,
    Thargoid,
}

bitflags! {
    /// Working equipment fitted to a ship.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Equipment: u8 {
        const ECM = 1 << 0;
        const FUEL_SCOOPS = 1 << 1;
        const FUEL_INJECTION = 1 << 2;
        const HYPERDRIVE = 1 << 3;
        const ESCAPE_POD = 1 << 4;
        const CLOAK = 1 << 5;
        /// Fitted as the forward weapon.
        const MINING_LASER = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockingMessage {
    Approach,
    ApproachCoordinates,
    BackOff,
    HoldPosition,
    TryAgainLater,
    TooBigToDock,
    DockingRefused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DockingInstructions {
    pub message: DockingMessage,
    pub stage: u8,
}

/// Missile tuning taken from the missile's ship data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MissileProfile {
    /// Fuel range in metres; the engine default applies when absent.
    pub range: Option<f64>,
    /// Detonation proximity in metres.
    pub proximity: Option<f64>,
}

/// Planet or sun.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub id: u32,
    pub position: Vector,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wormhole {
    pub id: EntityId,
    pub position: Vector,
    /// Simulation time after which the wormhole is gone.
    pub expiry: f64,
}

/// Something lying across a ship's course.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obstacle {
    Planet(Body),
    Sun(Body),
    Ship(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub id: SystemId,
    /// 0 (anarchy) through 7 (corporate state).
    pub government: u8,
    pub interstellar: bool,
    pub main_station: Option<EntityId>,
    pub main_planet: Option<Body>,
    pub sun: Option<Body>,
    pub sun_unstable: bool,
    pub planets: Vec<Body>,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            id: 0,
            government: 4,
            interstellar: false,
            main_station: None,
            main_planet: None,
            sun: None,
            sun_unstable: false,
            planets: Vec::new(),
        }
    }
}

/// Everything the engine may know about one entity.
///
/// Flight controls (`destination`, `desired_range`, `desired_speed`) are
/// written by configurations and consumed by the next command.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipState {
    pub id: EntityId,
    pub name: String,
    pub class_name: String,
    pub primary_role: String,
    pub scan_class: ScanClass,
    pub status: ShipStatus,
    pub is_station: bool,
    pub is_player: bool,
    pub is_main_station: bool,
    pub is_pirate: bool,
    pub is_cloaked: bool,
    pub is_derelict: bool,
    pub is_fleeing: bool,
    pub has_hostile_target: bool,
    pub allegiance: Option<Allegiance>,

    pub position: Vector,
    pub velocity: Vector,
    pub forward: Vector,
    pub speed: f64,
    pub max_speed: f64,
    pub collision_radius: f64,
    pub scanner_range: f64,
    pub distance_travelled: f64,

    pub energy: f64,
    pub max_energy: f64,
    pub fuel: f64,
    pub heat_insulation: f64,
    pub equipment: Equipment,
    /// Number of depleted or damaged systems.
    pub damage: u32,
    pub bounty: u32,
    pub marked_for_fines: bool,
    pub alert: AlertCondition,
    pub accuracy: f64,
    pub lights: bool,

    pub cargo_capacity: u32,
    pub cargo_available: u32,
    pub commodity: Option<String>,
    /// Tonnes pirates have demanded of this ship.
    pub pirate_demand: Option<u32>,
    /// Set once this ship has dumped cargo to satisfy a demand.
    pub paid_pirates: bool,

    pub target: Option<EntityId>,
    pub defense_targets: Vec<EntityId>,
    pub aggressor: Option<EntityId>,
    pub owner: Option<EntityId>,
    pub group: Option<GroupId>,
    pub escort_group: Option<GroupId>,
    pub max_escorts: u32,

    pub home_system: SystemId,
    pub destination_system: SystemId,

    pub destination: Vector,
    pub desired_range: f64,
    pub desired_speed: f64,

    pub docking: Option<DockingInstructions>,
    pub missile: Option<MissileProfile>,
}

impl ShipState {
    /// A healthy neutral ship in flight at the origin.
    pub fn new(id: EntityId, primary_role: impl Into<String>) -> Self {
        let role = primary_role.into();
        Self {
            id,
            name: format!("ship {}", id.0),
            class_name: "Cobra Mark III".to_string(),
            primary_role: role,
            scan_class: ScanClass::Neutral,
            status: ShipStatus::InFlight,
            is_station: false,
            is_player: false,
            is_main_station: false,
            is_pirate: false,
            is_cloaked: false,
            is_derelict: false,
            is_fleeing: false,
            has_hostile_target: false,
            allegiance: None,
            position: Vector::ZERO,
            velocity: Vector::ZERO,
            forward: Vector::Z,
            speed: 0.0,
            max_speed: 350.0,
            collision_radius: 50.0,
            scanner_range: 25_600.0,
            distance_travelled: 0.0,
            energy: 256.0,
            max_energy: 256.0,
            fuel: 7.0,
            heat_insulation: 1.0,
            equipment: Equipment::HYPERDRIVE,
            damage: 0,
            bounty: 0,
            marked_for_fines: false,
            alert: AlertCondition::Green,
            accuracy: 0.0,
            lights: true,
            cargo_capacity: 20,
            cargo_available: 20,
            commodity: None,
            pirate_demand: None,
            paid_pirates: false,
            target: None,
            defense_targets: Vec::new(),
            aggressor: None,
            owner: None,
            group: None,
            escort_group: None,
            max_escorts: 0,
            home_system: 0,
            destination_system: 0,
            destination: Vector::ZERO,
            desired_range: 0.0,
            desired_speed: 0.0,
            docking: None,
            missile: None,
        }
    }

    pub fn at(mut self, position: Vector) -> Self {
        self.position = position;
        self
    }

    pub fn with_scan_class(mut self, scan_class: ScanClass) -> Self {
        self.scan_class = scan_class;
        self
    }

    /// A station with the given allegiance.
    pub fn station(id: EntityId, allegiance: Allegiance) -> Self {
        let mut ship = Self::new(id, "station");
        ship.scan_class = ScanClass::Station;
        ship.is_station = true;
        ship.allegiance = Some(allegiance);
        ship.max_speed = 0.0;
        ship.equipment = Equipment::empty();
        ship
    }

    pub fn is_in_space(&self) -> bool {
        self.status.is_in_space()
    }

    pub fn has_hyperspace_motor(&self) -> bool {
        self.equipment.contains(Equipment::HYPERDRIVE)
    }

    pub fn has(&self, equipment: Equipment) -> bool {
        self.equipment.contains(equipment)
    }

    pub fn add_defense_target(&mut self, other: EntityId) {
        if other != self.id && !self.defense_targets.contains(&other) {
            self.defense_targets.push(other);
        }
    }

    pub fn remove_defense_target(&mut self, other: EntityId) {
        self.defense_targets.retain(|&t| t != other);
    }

    pub fn energy_ratio(&self) -> f64 {
        if self.max_energy <= 0.0 {
            0.0
        } else {
            self.energy / self.max_energy
        }
    }

    pub fn cargo_used(&self) -> u32 {
        self.cargo_capacity.saturating_sub(self.cargo_available)
    }
}

/// An externally owned grouping of ships.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupState {
    pub id: GroupId,
    pub leader: Option<EntityId>,
    pub ships: Vec<EntityId>,
    pub blackboard: GroupBlackboard,
}

impl GroupState {
    pub fn new(id: GroupId, ships: Vec<EntityId>) -> Self {
        Self {
            id,
            leader: None,
            ships,
            blackboard: GroupBlackboard::default(),
        }
    }

    pub fn led_by(mut self, leader: EntityId) -> Self {
        self.leader = Some(leader);
        self
    }

    pub fn contains(&self, ship: EntityId) -> bool {
        self.ships.contains(&ship)
    }

    pub fn count(&self) -> usize {
        self.ships.len()
    }

    pub fn remove(&mut self, ship: EntityId) {
        self.ships.retain(|&s| s != ship);
        if self.leader == Some(ship) {
            self.leader = None;
        }
    }
}

impl Default for GroupId {
    fn default() -> Self {
        GroupId(0)
    }
}

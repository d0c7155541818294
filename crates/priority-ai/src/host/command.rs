//! What a controller asks of the host.
//!
//! A behaviour issues at most one [`ShipCommand`] per reconsideration. Side
//! effects that are not flight orders go through [`ShipEffect`], and delayed
//! ones through [`ScheduledAction`].

use super::types::EntityId;

/// Flight and combat orders. Each one replaces the previous order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShipCommand {
    /// Fly to `desired_range` of `destination` at `desired_speed`.
    FlyToRangeFromDestination,
    FaceDestination,
    Attack,
    Flee,
    /// Close on the current target to `desired_range` (missiles).
    Intercept,
    Escort,
    Idle,
    Tumble,
    /// Scoop up the current target.
    Collect,
    /// Break up the current target with a mining laser.
    Mine,
    /// Come to a halt and stay there.
    Stop,
    LandOnPlanet,
    /// Enter a specific wormhole, or follow whatever the target used.
    EnterWormhole(Option<EntityId>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShipEffect {
    FireEcm,
    Explode,
    BroadcastDistress,
    RequestHelpFromGroup,
    NotifyGroupOfWormhole,
    DockEscorts,
    MarkTargetForFines,
    PatrolReportIn { station: EntityId },
    /// Delivered to `target` as a `ShipAttackerDistracted` event.
    NotifyDistraction { target: EntityId, by: EntityId },
    /// Raises `offender`'s legal status by OR-ing in `mask`.
    RaiseBounty { offender: EntityId, mask: u32 },
    /// Jettisons cargo, e.g. to satisfy a pirate demand.
    DumpCargo { tonnes: u32 },
    /// Scales `ship`'s bounty to `factor` of its current value.
    ReduceBounty { ship: EntityId, factor: f64 },
    // Station launches; the host picks the ship and adds it to the
    // station's group.
    LaunchDefenseShip,
    LaunchMiner,
    LaunchPatrol,
    LaunchScavenger,
}

/// Host-timed actions decoupled from reconsideration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    SelfDestruct,
}

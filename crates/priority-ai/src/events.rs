//! Game events delivered by the host.
//!
//! The host calls [`Controller::dispatch`](crate::Controller::dispatch) with
//! a [`GameEvent`]; the controller looks its [`EventKind`] up in the
//! installed handler table.

use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::host::EntityId;

/// Handler table key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    AiAwoken,
    ShipDied,
    ApproachingPlanetSurface,
    CargoDumpedNearby,
    CascadeWeaponDetected,
    CommsMessageReceived,
    DistressMessageReceived,
    EscortAccepted,
    EscortDock,
    HelpRequestReceived,
    OffenceCommittedNearby,
    PlayerWillEnterWitchspace,
    ShipAcceptedEscort,
    ShipAchievedDesiredRange,
    ShipAttackedOther,
    ShipAttackedWithMissile,
    ShipAttackerDistracted,
    ShipBeingAttacked,
    ShipBeingAttackedUnsuccessfully,
    ShipFiredMissile,
    ShipHitByEcm,
    ShipKilledOther,
    ShipLaunchedEscapePod,
    ShipLaunchedFromStation,
    ShipScoopedFuel,
    ShipScoopedOther,
    ShipTargetCloaked,
    ShipTargetLost,
    ShipWillEnterWormhole,
    ShipWitchspaceBlocked,
    StationWithdrewDockingClearance,
    WormholeSuggested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    AiAwoken,
    ShipDied { killer: Option<EntityId> },
    ApproachingPlanetSurface,
    CargoDumpedNearby { cargo: EntityId, ship: EntityId },
    CascadeWeaponDetected { weapon: EntityId },
    CommsMessageReceived { message: String, sender: EntityId },
    DistressMessageReceived { aggressor: EntityId, sender: EntityId },
    EscortAccepted { escort: EntityId },
    EscortDock,
    HelpRequestReceived { ally: EntityId, enemy: EntityId },
    OffenceCommittedNearby { attacker: EntityId, victim: EntityId },
    PlayerWillEnterWitchspace,
    ShipAcceptedEscort { mother: EntityId },
    ShipAchievedDesiredRange,
    ShipAttackedOther { other: EntityId },
    ShipAttackedWithMissile { missile: EntityId, whom: EntityId },
    ShipAttackerDistracted { whom: EntityId },
    /// `whom` is absent when the attacker could not be identified.
    ShipBeingAttacked { whom: Option<EntityId> },
    ShipBeingAttackedUnsuccessfully { whom: EntityId },
    ShipFiredMissile { missile: EntityId, target: EntityId },
    ShipHitByEcm,
    ShipKilledOther { other: EntityId },
    ShipLaunchedEscapePod,
    ShipLaunchedFromStation { station: EntityId },
    ShipScoopedFuel,
    ShipScoopedOther { commodity: String },
    ShipTargetCloaked,
    ShipTargetLost { target: Option<EntityId> },
    ShipWillEnterWormhole,
    ShipWitchspaceBlocked { blocker: EntityId },
    StationWithdrewDockingClearance,
    WormholeSuggested { wormhole: EntityId },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::AiAwoken => EventKind::AiAwoken,
            GameEvent::ShipDied { .. } => EventKind::ShipDied,
            GameEvent::ApproachingPlanetSurface => EventKind::ApproachingPlanetSurface,
            GameEvent::CargoDumpedNearby { .. } => EventKind::CargoDumpedNearby,
            GameEvent::CascadeWeaponDetected { .. } => EventKind::CascadeWeaponDetected,
            GameEvent::CommsMessageReceived { .. } => EventKind::CommsMessageReceived,
            GameEvent::DistressMessageReceived { .. } => EventKind::DistressMessageReceived,
            GameEvent::EscortAccepted { .. } => EventKind::EscortAccepted,
            GameEvent::EscortDock => EventKind::EscortDock,
            GameEvent::HelpRequestReceived { .. } => EventKind::HelpRequestReceived,
            GameEvent::OffenceCommittedNearby { .. } => EventKind::OffenceCommittedNearby,
            GameEvent::PlayerWillEnterWitchspace => EventKind::PlayerWillEnterWitchspace,
            GameEvent::ShipAcceptedEscort { .. } => EventKind::ShipAcceptedEscort,
            GameEvent::ShipAchievedDesiredRange => EventKind::ShipAchievedDesiredRange,
            GameEvent::ShipAttackedOther { .. } => EventKind::ShipAttackedOther,
            GameEvent::ShipAttackedWithMissile { .. } => EventKind::ShipAttackedWithMissile,
            GameEvent::ShipAttackerDistracted { .. } => EventKind::ShipAttackerDistracted,
            GameEvent::ShipBeingAttacked { .. } => EventKind::ShipBeingAttacked,
            GameEvent::ShipBeingAttackedUnsuccessfully { .. } => {
                EventKind::ShipBeingAttackedUnsuccessfully
            }
            GameEvent::ShipFiredMissile { .. } => EventKind::ShipFiredMissile,
            GameEvent::ShipHitByEcm => EventKind::ShipHitByEcm,
            GameEvent::ShipKilledOther { .. } => EventKind::ShipKilledOther,
            GameEvent::ShipLaunchedEscapePod => EventKind::ShipLaunchedEscapePod,
            GameEvent::ShipLaunchedFromStation { .. } => EventKind::ShipLaunchedFromStation,
            GameEvent::ShipScoopedFuel => EventKind::ShipScoopedFuel,
            GameEvent::ShipScoopedOther { .. } => EventKind::ShipScoopedOther,
            GameEvent::ShipTargetCloaked => EventKind::ShipTargetCloaked,
            GameEvent::ShipTargetLost { .. } => EventKind::ShipTargetLost,
            GameEvent::ShipWillEnterWormhole => EventKind::ShipWillEnterWormhole,
            GameEvent::ShipWitchspaceBlocked { .. } => EventKind::ShipWitchspaceBlocked,
            GameEvent::StationWithdrewDockingClearance => {
                EventKind::StationWithdrewDockingClearance
            }
            GameEvent::WormholeSuggested { .. } => EventKind::WormholeSuggested,
        }
    }
}

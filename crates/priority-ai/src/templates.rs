//! Reusable priority list fragments.
//!
//! Each function returns fresh nodes that a role's tree splices in, either
//! directly or as a branch:
//!
//! ```rust,ignore
//! let mut nodes = vec![when(Cond::LosingCombat, Behaviour::FleeCombat).reconsider(5.0)];
//! nodes.extend(templates::return_to_base());
//! nodes.push(fallback(Behaviour::Idle));
//! let tree = AiTree::new("trader", nodes);
//! ```

use priority_tree::branch;

use crate::catalog::{AiNode, Behaviour, Cond, Setup};

/// Docks at the selected station, flying toward it (via the main planet
/// when it orbits there) until close. Without a selected station, picks a
/// trade station if a friendly one exists.
pub fn return_to_base() -> Vec<AiNode> {
    vec![
        AiNode::new()
            .labelled("Return to base")
            .when(Cond::HasSelectedStation)
            .truebranch(approach_selected_station())
            .falsebranch(vec![
                AiNode::new()
                    .when(Cond::FriendlyStationExists)
                    .configure(Setup::SelectRandomTradeStation)
                    .behaviour(Behaviour::Reconsider),
            ]),
    ]
}

/// Docks at a friendly station if there is one, otherwise lands on a
/// planet, otherwise leaves the system.
pub fn return_to_base_or_planet() -> Vec<AiNode> {
    vec![
        AiNode::new()
            .labelled("Return to base or planet")
            .when(Cond::FriendlyStationNearby)
            .configure(Setup::SetNearbyFriendlyStationForDocking)
            .behaviour(Behaviour::DockWithStation)
            .reconsider(30.0),
        AiNode::new()
            .when(Cond::FriendlyStationExists)
            .configure(Setup::SetDestinationToNearestFriendlyStation)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(30.0),
        branch(
            Cond::HasSelectedPlanet,
            vec![
                AiNode::new()
                    .preconfigure(Setup::SetDestinationToSelectedPlanet)
                    .when(Cond::NearDestination)
                    .behaviour(Behaviour::LandOnPlanet),
                AiNode::new()
                    .behaviour(Behaviour::ApproachDestination)
                    .reconsider(30.0),
            ],
        ),
        AiNode::new()
            .when(Cond::PlanetExists)
            .configure(Setup::SelectPlanet)
            .behaviour(Behaviour::Reconsider),
        AiNode::new()
            .when(Cond::CanWitchspaceOut)
            .configure(Setup::SelectWitchspaceDestination)
            .behaviour(Behaviour::EnterWitchspace)
            .reconsider(20.0),
    ]
}

/// Leaves by any means: a nearby wormhole, an own jump, or failing both,
/// waiting at the witchpoint. The short reconsiders keep passing wormholes
/// from being missed.
pub fn witchspace_jump_anywhere() -> Vec<AiNode> {
    vec![
        AiNode::new()
            .labelled("Wormhole search")
            .when(Cond::WormholeNearby)
            .configure(Setup::SetDestinationToNearestWormhole)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(30.0),
        AiNode::new()
            .labelled("No wormholes nearby")
            .when(Cond::CanWitchspaceOut)
            .configure(Setup::SelectWitchspaceDestination)
            .behaviour(Behaviour::EnterWitchspace)
            .reconsider(10.0),
        AiNode::new()
            .labelled("Lurk around witchpoint")
            .configure(Setup::SetDestinationToWitchpoint)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(10.0),
    ]
}

/// Jumps toward the home system, refuelling from the sun when short.
pub fn witchspace_jump_inbound() -> Vec<AiNode> {
    jump_on_route("Jump inbound", Setup::SelectWitchspaceDestinationInbound)
}

/// Jumps toward the destination system, refuelling from the sun when short.
pub fn witchspace_jump_outbound() -> Vec<AiNode> {
    jump_on_route("Jump outbound", Setup::SelectWitchspaceDestinationOutbound)
}

fn jump_on_route(label: &str, select: Setup) -> Vec<AiNode> {
    vec![
        AiNode::new()
            .labelled(label)
            .preconfigure(select)
            .when(Cond::CanWitchspaceOnRoute)
            .behaviour(Behaviour::EnterWitchspace)
            .reconsider(20.0),
        AiNode::new()
            .when(Cond::ReadyToSunskim)
            .configure(Setup::SetDestinationToSunskimEnd)
            .behaviour(Behaviour::Sunskim)
            .reconsider(20.0),
        AiNode::new()
            .when(Cond::SunskimPossible)
            .configure(Setup::SetDestinationToSunskimStart)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(30.0),
    ]
}

/// Robs victims when the odds allow, otherwise lurks on a space lane.
pub fn lead_pirate_mission() -> Vec<AiNode> {
    vec![
        AiNode::new()
            .labelled("Pirate mission")
            .preconfigure(Setup::ForgetCargoDemand)
            .when(Cond::ScannerContainsPirateVictims)
            .configure(Setup::AcquireScannedTarget)
            .truebranch(vec![
                AiNode::new()
                    .labelled("Check odds")
                    .when(Cond::CombatOddsGood)
                    .behaviour(Behaviour::RobTarget)
                    .reconsider(5.0),
            ]),
        branch(Cond::InInterstellarSpace, witchspace_jump_anywhere()),
        AiNode::new()
            .labelled("Lurk")
            .configure(Setup::SetDestinationToPirateLurk)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(30.0),
    ]
}

/// Patrols waypoints and returns to a trade station once the patrol is over.
pub fn lead_hunting_mission() -> Vec<AiNode> {
    vec![
        branch(Cond::InInterstellarSpace, witchspace_jump_anywhere()),
        AiNode::new()
            .when(Cond::HasWaypoint)
            .configure(Setup::SetDestinationToWaypoint)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(30.0),
        branch(Cond::HasSelectedStation, approach_selected_station()),
        branch(
            Cond::MainPlanetNearby,
            vec![
                AiNode::new()
                    .when(Cond::PatrolIsOver)
                    .configure(Setup::SelectRandomTradeStation)
                    .behaviour(Behaviour::Reconsider),
            ],
        ),
        AiNode::new()
            .configure(Setup::SetWaypoint)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(30.0),
    ]
}

fn approach_selected_station() -> Vec<AiNode> {
    vec![
        AiNode::new()
            .when(Cond::SelectedStationNearby)
            .configure(Setup::SetSelectedStationForDocking)
            .behaviour(Behaviour::DockWithStation)
            .reconsider(30.0),
        branch(
            Cond::SelectedStationNearMainPlanet,
            vec![
                AiNode::new()
                    .unless(Cond::MainPlanetNearby)
                    .configure(Setup::SetDestinationToMainPlanet)
                    .behaviour(Behaviour::ApproachDestination)
                    .reconsider(30.0),
            ],
        ),
        // Either the station is not near the planet, or we are.
        AiNode::new()
            .configure(Setup::SetDestinationToSelectedStation)
            .behaviour(Behaviour::ApproachDestination)
            .reconsider(30.0),
    ]
}

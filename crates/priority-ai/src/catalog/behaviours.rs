//! Terminal actions.
//!
//! A behaviour runs once per reconsideration, after the tree has chosen it.
//! It requests its handler set, adjusts flight controls and issues at most
//! one [`ShipCommand`]. It must cope with being re-entered fresh on the next
//! pass, so anything it needs to remember lives in the parameter store.

use tracing::warn;

use super::conditions::{Cond, can_scoop_cargo, cascade_detected};
use super::{red_alert, reduce_alert, selected_planet};
use crate::cache::CacheKey;
use crate::comms::{CommsParams, CommsPriority};
use crate::context::{AiContext, Subject};
use crate::events::EventKind;
use crate::handlers::HandlerSet;
use crate::host::{
    Body, DockingMessage, EntityId, Equipment, Obstacle, ScanClass, ShipCommand, ShipEffect,
    ShipStatus, SystemId, Vector,
};
use crate::params::keys;
use crate::responses::Response;
use crate::rules::RuleId;
use crate::threat::AttackPhase;

/// Fallback detonation distance for missiles without a proximity setting.
const MISSILE_PROXIMITY: f64 = 25.0;
/// Seconds between announcing a jump and attempting it.
const WITCHSPACE_COUNTDOWN: f64 = 15.0;

/// A named terminal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behaviour {
    // Movement
    ApproachDestination,
    AvoidCascadeExplosion,
    FollowCurrentTarget,
    FollowGroupLeader,
    GuardTarget,
    LeaveVicinityOfDestination,
    LeaveVicinityOfTarget,

    // Combat
    CollectSalvage,
    DestroyCurrentTarget,
    FineCurrentTarget,
    FleeCombat,
    PayOffPirates,
    RepelCurrentTarget,
    RespondToDistressCall,
    RobTarget,

    // Docking, escorts, witchspace
    DockWithStation,
    EnterWitchspace,
    EscortMothership,
    LandOnPlanet,
    OfferToEscort,
    RejoinMothership,

    // Misc
    Idle,
    Reconsider,
    Sunskim,
    Tumble,

    // Missiles
    MissileInterceptCoordinates,
    MissileInterceptTarget,
    MissileSelfDestruct,

    // Mining and thargons
    BecomeInactiveThargon,
    JoinTargetGroup,
    MineTarget,

    // Stations
    StationLaunchDefenseShips,
    StationLaunchMiner,
    StationLaunchPatrol,
    StationLaunchSalvager,
    StationManageTraffic,
    StationRespondToDistressCall,

    Custom(RuleId),
}

impl Behaviour {
    pub fn run(self, ctx: &mut AiContext<'_>) {
        match self {
            Behaviour::ApproachDestination => approach_destination(ctx),
            Behaviour::AvoidCascadeExplosion => {
                let handlers = ctx.standard_handlers();
                ctx.install_handlers(handlers);
                evade_cascade(ctx, CommsPriority::NotAfterTraffic, true);
            }
            Behaviour::FollowCurrentTarget => follow_current_target(ctx),
            Behaviour::FollowGroupLeader => follow_group_leader(ctx),
            Behaviour::GuardTarget => {
                let destination = ctx
                    .target()
                    .and_then(|t| ctx.ship(t))
                    .map_or(ctx.position(), |t| t.position);
                let speed = ctx.cruise_speed();
                ctx.set_course(destination, 2_500.0, speed);
                approach_destination(ctx);
            }
            Behaviour::LeaveVicinityOfDestination => {
                let speed = ctx.max_speed();
                ctx.set_desired_range(60_000.0);
                ctx.set_desired_speed(speed);
                let target = ctx.target();
                ctx.communicate("leaveVicinity", target, CommsPriority::NotAfterTraffic);
                approach_destination(ctx);
            }
            Behaviour::LeaveVicinityOfTarget => leave_vicinity_of_target(ctx),

            Behaviour::CollectSalvage => {
                let handlers = ctx
                    .standard_handlers()
                    .with(EventKind::ShipScoopedOther, Response::ShipScoopedOther);
                ctx.install_handlers(handlers);
                ctx.command(ShipCommand::Collect);
            }
            Behaviour::DestroyCurrentTarget => destroy_current_target(ctx),
            Behaviour::FineCurrentTarget => fine_current_target(ctx),
            Behaviour::FleeCombat => flee_combat(ctx),
            Behaviour::PayOffPirates => pay_off_pirates(ctx),
            Behaviour::RepelCurrentTarget => repel_current_target(ctx),
            Behaviour::RespondToDistressCall => respond_to_distress_call(ctx),
            Behaviour::RobTarget => rob_target(ctx),

            Behaviour::DockWithStation => dock_with_station(ctx),
            Behaviour::EnterWitchspace => enter_witchspace(ctx),
            Behaviour::EscortMothership => escort_mothership(ctx, true),
            Behaviour::LandOnPlanet => {
                let speed = ctx.max_speed() / 4.0;
                ctx.set_desired_speed(speed);
                ctx.command(ShipCommand::LandOnPlanet);
                // Nothing should interrupt a landing.
                ctx.clear_wake();
                ctx.install_handlers(HandlerSet::new());
                ctx.communicate("landingOnPlanet", Subject::None, CommsPriority::Quiet);
            }
            Behaviour::OfferToEscort => offer_to_escort(ctx),
            Behaviour::RejoinMothership => escort_mothership(ctx, false),

            Behaviour::Idle => {
                let handlers = ctx.standard_handlers();
                ctx.install_handlers(handlers);
                ctx.command(ShipCommand::Idle);
            }
            Behaviour::Reconsider => {
                let handlers = ctx.standard_handlers();
                ctx.install_handlers(handlers);
                ctx.reconsider_now();
            }
            Behaviour::Sunskim => {
                let handlers = ctx.standard_handlers().with_scooping();
                ctx.install_handlers(handlers);
                ctx.fly_to_range();
            }
            Behaviour::Tumble => {
                ctx.install_handlers(HandlerSet::new());
                ctx.command(ShipCommand::Tumble);
            }

            Behaviour::MissileInterceptCoordinates => missile_intercept_coordinates(ctx),
            Behaviour::MissileInterceptTarget => {
                ctx.install_handlers(Response::missile());
                let proximity = missile_proximity(ctx);
                ctx.set_desired_range(proximity);
                ctx.command(ShipCommand::Intercept);
            }
            Behaviour::MissileSelfDestruct => ctx.effect(ShipEffect::Explode),

            Behaviour::BecomeInactiveThargon => become_inactive_thargon(ctx),
            Behaviour::JoinTargetGroup => join_target_group(ctx),
            Behaviour::MineTarget => {
                let handlers = ctx.standard_handlers();
                ctx.install_handlers(handlers);
                ctx.communicate("mining", Subject::None, CommsPriority::Quiet);
                ctx.command(ShipCommand::Mine);
            }

            Behaviour::StationLaunchDefenseShips => station_launch_defense_ships(ctx),
            Behaviour::StationLaunchMiner => station_launch_miner(ctx),
            Behaviour::StationLaunchPatrol => station_launch_patrol(ctx),
            Behaviour::StationLaunchSalvager => {
                if sun_going_nova(ctx) {
                    return;
                }
                reduce_alert(ctx);
                let target = ctx.target();
                ctx.communicate("launchSalvager", target, CommsPriority::NotAfterTraffic);
                ctx.effect(ShipEffect::LaunchScavenger);
                ctx.install_handlers(Response::station());
            }
            Behaviour::StationManageTraffic => ctx.install_handlers(Response::station()),
            Behaviour::StationRespondToDistressCall => station_respond_to_distress_call(ctx),

            Behaviour::Custom(id) => match ctx.session().rules().action(id) {
                Some(f) => f(ctx),
                None => {
                    warn!(target: "priority_ai::catalog", rule = %id, "custom behaviour not registered");
                }
            },
        }
    }
}

// ----------------------------------------------------------------------
// Movement
// ----------------------------------------------------------------------

/// Flies to the current destination, routing around planets, suns and
/// ships in the way through the `ai_waypoints` stack.
fn approach_destination(ctx: &mut AiContext<'_>) {
    let handlers = ctx
        .standard_handlers()
        .with(EventKind::ShipAchievedDesiredRange, Response::ShipAchievedDesiredRange);

    let mut waypoints = ctx.params().path(keys::WAYPOINTS).map(<[_]>::to_vec);
    if let Some(last) = waypoints.as_ref().and_then(|w| w.last().copied()) {
        ctx.set_destination(last);
        ctx.set_desired_range(100.0);
    }

    let me = ctx.ship_id();
    let detour = match ctx.host().course_blocker(me) {
        Some(Obstacle::Sun(body)) => body_detour(ctx, body),
        Some(Obstacle::Planet(body)) if selected_planet(ctx).map(|p| p.id) != Some(body.id) => {
            body_detour(ctx, body)
        }
        Some(Obstacle::Ship(other))
            if ctx.distance_to(other) < ctx.scanner_range() && !is_my_escort(ctx, other) =>
        {
            Some(ctx.host().safe_course(me))
        }
        _ => None,
    };
    if let Some(point) = detour {
        waypoints.get_or_insert_with(Vec::new).push(point);
        ctx.set_destination(point);
        ctx.set_desired_range(100.0);
    }

    match waypoints {
        Some(path) => ctx.params_mut().set(keys::WAYPOINTS, path),
        None => {
            ctx.params_mut().remove(keys::WAYPOINTS);
        }
    }
    ctx.install_handlers(handlers);
    ctx.fly_to_range();
}

/// Straight away from a body that is dangerously close, or around one that
/// is merely in the way.
fn body_detour(ctx: &AiContext<'_>, body: Body) -> Option<Vector> {
    let here = ctx.position();
    let distance = here.distance(body.position);
    if distance < body.radius * 1.3 {
        Some(here - (body.position - here))
    } else if distance < body.radius * 3.0 {
        Some(ctx.host().safe_course(ctx.ship_id()))
    } else {
        None
    }
}

fn is_my_escort(ctx: &AiContext<'_>, other: EntityId) -> bool {
    let me = ctx.ship_id();
    let led_by_me = ctx
        .ship(other)
        .and_then(|s| s.group)
        .and_then(|g| ctx.host().group(g))
        .is_some_and(|g| g.leader == Some(me));
    led_by_me || ctx.escort_group().is_some_and(|g| g.contains(other))
}

/// Runs from a visible mine, or from the point a cascade went off. Returns
/// false if there is no cascade to avoid.
fn evade_cascade(ctx: &mut AiContext<'_>, priority: CommsPriority, announce_mine: bool) -> bool {
    if !cascade_detected(ctx) {
        return false;
    }
    let Some(cascade) = ctx.params().vector(keys::CASCADE_DETECTED) else {
        return false;
    };
    let mine = ctx
        .me()
        .and_then(|s| s.defense_targets.first().copied())
        .filter(|&id| ctx.ship(id).is_some_and(|s| s.scan_class == ScanClass::Mine));
    if let Some(mine) = mine {
        if announce_mine {
            ctx.communicate("quiriumCascade", Subject::None, priority);
        }
        ctx.set_target(Some(mine));
        ctx.set_desired_range(30_000.0);
        ctx.command(ShipCommand::Flee);
        return true;
    }
    if ctx.me().is_some_and(|s| s.destination != cascade) {
        ctx.communicate("quiriumCascade", Subject::None, priority);
    }
    let speed = ctx.max_speed() * 10.0;
    ctx.set_course(cascade, 30_000.0, speed);
    ctx.fly_to_range();
    true
}

/// Chases the target, or the remembered one, following it through a
/// wormhole when flagged for pursuit.
fn follow_current_target(ctx: &mut AiContext<'_>) {
    let Some(followed) = ctx
        .target()
        .or_else(|| ctx.params().entity(keys::REMEMBERED_TARGET))
    else {
        return;
    };
    let Some((position, status)) = ctx.ship(followed).map(|s| (s.position, s.status)) else {
        ctx.params_mut().remove(keys::REMEMBERED_TARGET);
        return;
    };
    ctx.set_destination(position);

    if status == ShipStatus::EnteringWitchspace {
        if ctx.params().flag(keys::WITCHSPACE_PURSUIT) {
            let wormhole = ctx
                .host()
                .wormholes()
                .iter()
                .rev()
                .find(|w| w.position.distance(position) < 100.0)
                .map(|w| w.id);
            if let Some(wormhole) = wormhole {
                let params = ctx.params_mut();
                params.set(keys::WITCHSPACE_WORMHOLE, wormhole);
                params.remove(keys::REMEMBERED_TARGET);
            }
            ctx.set_desired_range(0.0);
        } else {
            let here = ctx.position();
            ctx.set_destination(here);
            ctx.set_target(None);
            ctx.params_mut().remove(keys::REMEMBERED_TARGET);
        }
    } else {
        ctx.params_mut().set(keys::REMEMBERED_TARGET, followed);
        let range = 500.0 + ctx.random() * 1_000.0;
        ctx.set_desired_range(range);
    }
    let speed = ctx.max_speed();
    ctx.set_desired_speed(speed);
    approach_destination(ctx);
}

/// Keeps station a little ahead of the group leader.
fn follow_group_leader(ctx: &mut AiContext<'_>) {
    let leader = ctx
        .leader()
        .filter(|&l| l != ctx.ship_id())
        .and_then(|l| ctx.ship(l))
        .map(|l| (l.position, l.forward, l.speed));
    let Some((position, forward, speed)) = leader else {
        let handlers = ctx.standard_handlers();
        ctx.install_handlers(handlers);
        ctx.command(ShipCommand::Idle);
        return;
    };
    let range = 500.0 + ctx.random() * 1_000.0;
    let my_speed = ctx.max_speed().min(speed * 1.5);
    ctx.set_course(position + forward * speed * 10.0, range, my_speed);
    approach_destination(ctx);
}

fn leave_vicinity_of_target(ctx: &mut AiContext<'_>) {
    let Some((target, position)) = ctx
        .target()
        .and_then(|t| ctx.ship(t).map(|s| (t, s.position)))
    else {
        ctx.reconsider_now();
        return;
    };
    let speed = ctx.max_speed();
    ctx.set_course(position, 27_500.0, speed);
    ctx.communicate("leaveVicinity", target, CommsPriority::NotAfterTraffic);
    approach_destination(ctx);
}

// ----------------------------------------------------------------------
// Combat
// ----------------------------------------------------------------------

/// If the target is busy with a Thargoid, joins in against the Thargoid
/// instead. Returns whether it did.
fn thargoid_distraction(ctx: &mut AiContext<'_>, target: EntityId) -> bool {
    if ctx.me().is_none_or(|s| s.scan_class == ScanClass::Thargoid) {
        return false;
    }
    let Some(their_target) = ctx
        .ship(target)
        .filter(|t| t.scan_class != ScanClass::Thargoid)
        .and_then(|t| t.target)
    else {
        return false;
    };
    if ctx
        .ship(their_target)
        .is_some_and(|s| s.scan_class == ScanClass::Thargoid)
        && ctx.respond_to_thargoids(their_target, true)
    {
        ctx.command(ShipCommand::Attack);
        return true;
    }
    false
}

/// Opening message and a call for help on a fresh attack, a quieter one on
/// a continuing attack.
fn announce_attack(ctx: &mut AiContext<'_>, target: EntityId) {
    if ctx.me().is_some_and(|s| s.has_hostile_target) {
        ctx.broadcast_attack_message(target, AttackPhase::Continuing, CommsPriority::Quiet);
    } else {
        ctx.broadcast_attack_message(target, AttackPhase::Beginning, CommsPriority::NotAfterTraffic);
        ctx.effect(ShipEffect::RequestHelpFromGroup);
    }
}

fn destroy_current_target(ctx: &mut AiContext<'_>) {
    ctx.params_mut().remove(keys::WITCHSPACE_ENTRY);
    let handlers = ctx.standard_handlers();
    ctx.install_handlers(handlers);

    if let Some(target) = ctx.target() {
        if thargoid_distraction(ctx, target) {
            return;
        }
        announce_attack(ctx, target);
    }
    ctx.command(ShipCommand::Attack);
}

fn fine_current_target(ctx: &mut AiContext<'_>) {
    let handlers = ctx.standard_handlers();
    ctx.install_handlers(handlers);
    let police = ctx.me().is_some_and(|s| s.scan_class == ScanClass::Police);
    if police && let Some(target) = ctx.target() {
        ctx.communicate("markForFines", target, CommsPriority::Always);
        ctx.effect(ShipEffect::MarkTargetForFines);
    }
    ctx.command(ShipCommand::Idle);
}

/// Runs from the fight, jumping out of the system when that is an option.
fn flee_combat(ctx: &mut AiContext<'_>) {
    let handlers = ctx.standard_handlers();
    ctx.install_handlers(handlers);
    if evade_cascade(ctx, CommsPriority::Quiet, false) {
        return;
    }

    let range = ctx.scanner_range();
    if ctx.target().is_none_or(|t| ctx.distance_to(t) > range) {
        let aggressor = ctx.me().and_then(|s| s.aggressor).filter(|&a| {
            ctx.ship(a).is_some_and(|s| s.is_in_space()) && ctx.distance_to(a) < range
        });
        let threat = aggressor.or_else(|| {
            ctx.defense_targets()
                .into_iter()
                .find(|&id| ctx.distance_to(id) < range && ctx.is_fighting(id))
        });
        if threat.is_some() {
            ctx.set_target(threat);
        }
    }

    let target = ctx.target();
    if ctx.params().contains(keys::LAST_FLEEING) {
        ctx.communicate("continueFleeing", target, CommsPriority::Quiet);
    } else if ctx.me().is_some_and(|s| s.energy < s.max_energy / 4.0) {
        ctx.communicate("startFleeing", target, CommsPriority::NotAfterTraffic);
    }
    if let Some(target) = target {
        ctx.params_mut().set(keys::LAST_FLEEING, target);
    }

    let consider_jump = ctx.long_term(CacheKey::ConsiderWitchspaceFlee, |ctx| {
        if ctx.params().flag(keys::NEVER_FLEE) {
            return false;
        }
        let Some((hyperdrive, fuel, home)) = ctx
            .me()
            .map(|s| (s.has_hyperspace_motor(), s.fuel, s.home_system))
        else {
            return false;
        };
        let system = ctx.host().system();
        hyperdrive
            && ((system.interstellar && fuel > 0.0)
                || (system.id != home && !ctx.host().systems_in_range(fuel).is_empty()))
    });
    if consider_jump {
        let now = ctx.now();
        let jump_at = ctx.long_term(CacheKey::WitchspaceFleeAt, |ctx| {
            ctx.communicate(
                "engageWitchspaceDriveFlee",
                Subject::None,
                CommsPriority::NotAfterSending,
            );
            now + WITCHSPACE_COUNTDOWN
        });
        let me = ctx.ship_id();
        if jump_at < now && ctx.host_mut().exit_system(me, None) {
            ctx.effect(ShipEffect::NotifyGroupOfWormhole);
            ctx.state.long_term.remove(CacheKey::WitchspaceFleeAt);
        }
    }

    ctx.set_desired_range(range);
    ctx.command(ShipCommand::Flee);
}

/// Dumps the demanded cargo and runs.
fn pay_off_pirates(ctx: &mut AiContext<'_>) {
    let demand = ctx.me().and_then(|s| s.pirate_demand);
    if let Some(tonnes) = demand {
        ctx.effect(ShipEffect::DumpCargo { tonnes });
        let mut params = CommsParams::new();
        params.insert(keys::DEMAND_SIZE.to_string(), tonnes.to_string());
        ctx.communicate("agreeingToDumpCargo", params, CommsPriority::Always);
        if let Some(me) = ctx.me_mut() {
            me.pirate_demand = None;
            me.paid_pirates = true;
        }
    }
    flee_combat(ctx);
}

/// Fights until the target stops being aggressive, then calls off the
/// escorts too.
fn repel_current_target(ctx: &mut AiContext<'_>) {
    ctx.params_mut().remove(keys::WITCHSPACE_ENTRY);
    let handlers = ctx.standard_handlers();
    ctx.install_handlers(handlers);

    let Some(target) = ctx.target() else {
        ctx.reconsider_now();
        return;
    };
    if thargoid_distraction(ctx, target) {
        return;
    }
    if ctx.is_aggressive(target) {
        announce_attack(ctx, target);
        ctx.command(ShipCommand::Attack);
        return;
    }
    for escort in ctx.escort_members() {
        if let Some(ship) = ctx.host_mut().ship_mut(escort) {
            ship.remove_defense_target(target);
            if ship.target == Some(target) {
                ship.target = None;
            }
        }
    }
    ctx.remove_defense_target(target);
    ctx.set_target(None);
}

/// The live aggressor and sender of the last distress call, in that order.
/// Whichever has the higher bounty is taken to be the real aggressor.
fn distress_parties(ctx: &AiContext<'_>) -> Option<(EntityId, EntityId)> {
    let live = |key: &str| ctx.params().entity(key).filter(|&id| ctx.ship(id).is_some());
    let (aggressor, sender) = (live(keys::DISTRESS_AGGRESSOR)?, live(keys::DISTRESS_SENDER)?);
    let bounty = |id| ctx.ship(id).map_or(0, |s| s.bounty);
    if bounty(sender) > bounty(aggressor) {
        Some((sender, aggressor))
    } else {
        Some((aggressor, sender))
    }
}

fn respond_to_distress_call(ctx: &mut AiContext<'_>) {
    if let Some((aggressor, sender)) = distress_parties(ctx) {
        if ctx.distance_to(aggressor) < ctx.scanner_range() {
            ctx.set_target(Some(aggressor));
            ctx.command(ShipCommand::Attack);
            ctx.reconsider_now();
            ctx.communicate(
                "distressResponseAggressor",
                aggressor,
                CommsPriority::NotAfterSending,
            );
        } else if let Some((position, radius)) =
            ctx.ship(sender).map(|s| (s.position, s.collision_radius))
        {
            let mine = ctx.me().map_or(0.0, |s| s.collision_radius);
            // Fast enough to engage injectors where fitted.
            let speed = ctx.max_speed() * 7.0;
            ctx.set_course(position, 1_000.0 + radius + mine, speed);
            ctx.fly_to_range();
            ctx.communicate("distressResponseSender", sender, CommsPriority::NotAfterSending);
        }
    }
    let handlers = ctx.standard_handlers();
    ctx.install_handlers(handlers);
}

/// Demands cargo from the target unless the crew already has, then attacks.
fn rob_target(ctx: &mut AiContext<'_>) {
    let Some(target) = ctx.target() else {
        ctx.reconsider_now();
        return;
    };
    let crew = ctx.me().and_then(|s| s.group);
    let already_demanded = match crew.and_then(|g| ctx.host().group(g)) {
        Some(group) => group.blackboard.cargo_demand.is_some(),
        None => ctx.params().entity(keys::LAST_PIRATE_VICTIM) == Some(target),
    };

    if !already_demanded {
        let demand = pirate_demand(ctx, target);
        if let Some(board) = crew
            .and_then(|g| ctx.host_mut().group_mut(g))
            .map(|g| &mut g.blackboard)
        {
            board.demand_cargo(demand);
        }
        if let Some(victim) = ctx.host_mut().ship_mut(target) {
            victim.pirate_demand = Some(demand);
        }
        let mut params = ctx.entity_comms_params(target);
        params.insert(keys::DEMAND_SIZE.to_string(), demand.to_string());
        ctx.command(ShipCommand::Attack);
        ctx.communicate("makePirateDemand", params, CommsPriority::Always);
        ctx.effect(ShipEffect::RequestHelpFromGroup);
        ctx.params_mut().set(keys::LAST_PIRATE_VICTIM, target);
    }

    let handlers = ctx.standard_handlers();
    ctx.install_handlers(handlers);
    ctx.command(ShipCommand::Attack);
    ctx.effect(ShipEffect::RequestHelpFromGroup);
}

/// Tonnes to demand: a share of the victim's hold scaled by how lawless the
/// system is, capped by what the crew can scoop and by about five tonnes
/// per scooping ship.
fn pirate_demand(ctx: &mut AiContext<'_>, target: EntityId) -> u32 {
    let capacity = f64::from(ctx.ship(target).map_or(0, |s| s.cargo_capacity));
    let government = f64::from(ctx.host().system().government);
    let mut demand = capacity / 20.0 * (1.0 + ctx.random() + (8.0 - government) / 8.0);
    if ctx.combat_odds_excellent() {
        demand *= 1.0 + ctx.random();
    }
    let mut demand = demand.ceil() as u32;

    let members = ctx.group_members();
    let (capacity_left, scoopers) = if members.is_empty() {
        let own = if can_scoop_cargo(ctx) {
            ctx.me().map_or(0, |s| s.cargo_available)
        } else {
            0
        };
        (own, 1)
    } else {
        members
            .iter()
            .filter_map(|&id| ctx.ship(id))
            .filter(|s| s.has(Equipment::FUEL_SCOOPS))
            .fold((0, 0), |(tonnes, n), s| (tonnes + s.cargo_available, n + 1))
    };
    demand = demand.min(capacity_left);
    while demand > scoopers * 5 && demand > 1 {
        demand = demand.div_ceil(2);
    }
    demand.max(2)
}

// ----------------------------------------------------------------------
// Docking, escorts, witchspace
// ----------------------------------------------------------------------

fn dock_with_station(ctx: &mut AiContext<'_>) {
    let station = live_docking_station(ctx);
    ctx.set_target(station);
    let handlers = ctx.standard_handlers().with_docking();

    let me = ctx.ship_id();
    if let Some(station) = station {
        ctx.host_mut().request_docking(me, station);
    }
    let instructions = station.and(ctx.me().and_then(|s| s.docking));
    let (Some(station), Some(instructions)) = (station, instructions) else {
        ctx.command(ShipCommand::Idle);
        ctx.reconsider_now();
        return;
    };
    let station_position = ctx.ship(station).map_or(Vector::ZERO, |s| s.position);

    match instructions.message {
        DockingMessage::TooBigToDock | DockingMessage::DockingRefused => {
            ctx.params_mut().remove(keys::DOCKING_STATION);
            ctx.set_target(None);
            ctx.reconsider_now();
        }
        DockingMessage::TryAgainLater if ctx.distance_to(station) < 10_000.0 => {
            let speed = ctx.cruise_speed();
            ctx.set_course(station_position, 12_500.0, speed);
            ctx.fly_to_range();
        }
        DockingMessage::TryAgainLater | DockingMessage::HoldPosition => {
            ctx.communicate("dockingWait", Subject::None, CommsPriority::Quiet);
            ctx.set_destination(station_position);
            ctx.command(ShipCommand::FaceDestination);
        }
        DockingMessage::ApproachCoordinates => {
            let escorts = ctx.escort_group().map_or(0, |g| g.count());
            if escorts > 1 && instructions.stage >= 2 {
                // Clearance granted; the escorts may follow in.
                ctx.communicate("dockEscorts", Subject::None, CommsPriority::NotAfterTraffic);
                ctx.effect(ShipEffect::DockEscorts);
            }
            ctx.fly_to_range();
        }
        DockingMessage::Approach | DockingMessage::BackOff => ctx.fly_to_range(),
    }
    ctx.install_handlers(handlers);
}

fn live_docking_station(ctx: &AiContext<'_>) -> Option<EntityId> {
    ctx.params()
        .entity(keys::DOCKING_STATION)
        .filter(|&s| ctx.ship(s).is_some_and(|s| s.is_in_space()))
}

/// Enters a known wormhole, or counts down and jumps toward the selected
/// destination once the escorts have launched.
fn enter_witchspace(ctx: &mut AiContext<'_>) {
    let mut handlers = ctx.standard_handlers();
    let now = ctx.now();

    if let Some(id) = ctx.params().entity(keys::WITCHSPACE_WORMHOLE) {
        let open = ctx
            .host()
            .wormholes()
            .iter()
            .find(|w| w.id == id && w.expiry >= now)
            .map(|w| w.position);
        match open {
            Some(position) => {
                handlers.insert(
                    EventKind::PlayerWillEnterWitchspace,
                    Response::TrackPlayerWillEnterWitchspace,
                );
                let speed = ctx.max_speed();
                ctx.set_course(position, 0.0, speed);
                ctx.fly_to_range();
                ctx.install_handlers(handlers);
                return;
            }
            None => {
                ctx.params_mut().remove(keys::WITCHSPACE_WORMHOLE);
                let left_behind = ctx
                    .leader()
                    .and_then(|l| ctx.ship(l))
                    .is_some_and(|l| l.status == ShipStatus::EnteringWitchspace);
                if left_behind {
                    ctx.leave_group();
                }
            }
        }
    }

    let destination = ctx
        .params()
        .integer(keys::WITCHSPACE_DESTINATION)
        .and_then(|d| SystemId::try_from(d).ok());
    let Some(destination) = destination else {
        handlers.insert(
            EventKind::PlayerWillEnterWitchspace,
            Response::TrackPlayerWillEnterWitchspace,
        );
        ctx.install_handlers(handlers);
        return;
    };
    handlers.insert(EventKind::ShipWitchspaceBlocked, Response::WitchspaceBlocked);
    ctx.install_handlers(handlers);

    let entry = ctx.params().number(keys::WITCHSPACE_ENTRY);
    if !Cond::AllEscortsInFlight.holds(ctx) {
        fly_clear_for_jump(ctx);
    } else if let Some(entry) = entry
        && entry < now
    {
        let me = ctx.ship_id();
        // A blocked jump comes back as an event.
        if ctx.host_mut().exit_system(me, Some(destination)) {
            ctx.effect(ShipEffect::NotifyGroupOfWormhole);
            ctx.params_mut().remove(keys::WITCHSPACE_ENTRY);
        }
    } else {
        if entry.is_none() {
            ctx.communicate("engageWitchspaceDrive", Subject::None, CommsPriority::Quiet);
            ctx.params_mut()
                .set(keys::WITCHSPACE_ENTRY, now + WITCHSPACE_COUNTDOWN);
        }
        fly_clear_for_jump(ctx);
    }
}

/// Heads straight on, away from anything blocking the course.
fn fly_clear_for_jump(ctx: &mut AiContext<'_>) {
    let Some((position, forward)) = ctx.me().map(|s| (s.position, s.forward)) else {
        return;
    };
    let speed = ctx.cruise_speed();
    ctx.set_course(position + forward * 30_000.0, 10_000.0, speed);
    let me = ctx.ship_id();
    if ctx.host().course_blocker(me).is_some() {
        let safe = ctx.host().safe_course(me);
        ctx.set_destination(safe);
    }
    ctx.fly_to_range();
}

fn escort_mothership(ctx: &mut AiContext<'_>, announce: bool) {
    if announce && let Some(leader) = ctx.leader() {
        ctx.communicate("escortFormation", leader, CommsPriority::Quiet);
    }
    let handlers = ctx.standard_handlers().with_escort();
    ctx.install_handlers(handlers);
    ctx.set_desired_range(0.0);
    ctx.command(ShipCommand::Escort);
}

fn offer_to_escort(ctx: &mut AiContext<'_>) {
    let handlers = ctx.standard_handlers();
    ctx.install_handlers(handlers);
    let me = ctx.ship_id();
    match ctx.params().entity(keys::SCAN_RESULT_SPECIFIC) {
        None => ctx.reconsider_now(),
        Some(mother) => {
            if ctx.host_mut().offer_to_escort(me, mother) {
                ctx.reconsider_now();
            }
        }
    }
}

// ----------------------------------------------------------------------
// Missiles
// ----------------------------------------------------------------------

fn missile_proximity(ctx: &AiContext<'_>) -> f64 {
    ctx.me()
        .and_then(|s| s.missile)
        .and_then(|m| m.proximity)
        .unwrap_or(MISSILE_PROXIMITY)
}

/// Flies at the last known position of a cloaked or lost target, picking
/// the target up again if it reappears.
fn missile_intercept_coordinates(ctx: &mut AiContext<'_>) {
    ctx.install_handlers(Response::missile());
    let proximity = missile_proximity(ctx);
    ctx.set_desired_range(proximity);
    let Some(point) = ctx.params().vector(keys::INTERCEPT_COORDINATES) else {
        return;
    };
    let speed = ctx.max_speed();
    ctx.set_destination(point);
    ctx.set_desired_speed(speed);
    ctx.fly_to_range();

    let old_target = ctx
        .params()
        .entity(keys::INTERCEPT_TARGET)
        .filter(|&t| ctx.ship(t).is_some_and(|s| !s.is_cloaked && s.is_in_space()));
    if old_target.is_some() {
        ctx.set_target(old_target);
    }
}

// ----------------------------------------------------------------------
// Mining and thargons
// ----------------------------------------------------------------------

/// A thargon whose mothership is gone drifts as inert cargo. Anything that
/// was fighting it loses interest.
fn become_inactive_thargon(ctx: &mut AiContext<'_>) {
    ctx.install_handlers(HandlerSet::new());
    let me = ctx.ship_id();
    ctx.leave_group();
    let escorts = ctx.me().and_then(|s| s.escort_group);
    if let Some(escorts) = escorts.and_then(|g| ctx.host_mut().group_mut(g)) {
        escorts.remove(me);
    }
    if let Some(ship) = ctx.me_mut() {
        ship.scan_class = ScanClass::Cargo;
        ship.target = None;
        ship.defense_targets.clear();
        ship.desired_speed = 0.0;
    }
    ctx.command(ShipCommand::Stop);

    let nearby = ctx.host().scan(me, true);
    for id in nearby {
        let Some(other) = ctx.host_mut().ship_mut(id) else {
            continue;
        };
        if other.target == Some(me) && !other.is_player && other.has_hostile_target {
            other.target = None;
        }
        other.remove_defense_target(me);
    }
}

fn join_target_group(ctx: &mut AiContext<'_>) {
    let me = ctx.ship_id();
    let group = ctx.target().and_then(|t| ctx.ship(t)).and_then(|t| t.group);
    if let Some(group) = group {
        if let Some(members) = ctx.host_mut().group_mut(group)
            && !members.contains(me)
        {
            members.ships.push(me);
        }
        if let Some(ship) = ctx.me_mut() {
            ship.group = Some(group);
        }
    }
    ctx.command(ShipCommand::Idle);
}

// ----------------------------------------------------------------------
// Stations
// ----------------------------------------------------------------------

/// Stations stop launching anything once the sun turns unstable.
fn sun_going_nova(ctx: &AiContext<'_>) -> bool {
    let system = ctx.host().system();
    system.sun.is_some() && system.sun_unstable
}

fn station_launch_defense_ships(ctx: &mut AiContext<'_>) {
    if sun_going_nova(ctx) {
        return;
    }
    match ctx.target() {
        Some(target) if ctx.is_aggressive(target) => {
            red_alert(ctx);
            ctx.effect(ShipEffect::LaunchDefenseShip);
            ctx.communicate("launchDefenseShips", target, CommsPriority::NotAfterTraffic);
            ctx.effect(ShipEffect::RequestHelpFromGroup);
        }
        _ => reduce_alert(ctx),
    }
    ctx.install_handlers(Response::station());
}

/// Whether a member of the station's group already flies `role`.
fn role_in_flight(ctx: &AiContext<'_>, role: &str) -> bool {
    ctx.group_members()
        .into_iter()
        .filter(|&id| id != ctx.ship_id())
        .filter_map(|id| ctx.ship(id))
        .any(|s| s.primary_role == role)
}

fn station_launch_miner(ctx: &mut AiContext<'_>) {
    if sun_going_nova(ctx) {
        return;
    }
    reduce_alert(ctx);
    ctx.install_handlers(Response::station());
    // One at a time.
    if role_in_flight(ctx, "miner") {
        return;
    }
    let target = ctx.target();
    ctx.communicate("launchMiner", target, CommsPriority::NotAfterTraffic);
    ctx.effect(ShipEffect::LaunchMiner);
}

fn station_launch_patrol(ctx: &mut AiContext<'_>) {
    if sun_going_nova(ctx) {
        return;
    }
    reduce_alert(ctx);
    ctx.install_handlers(Response::station());
    let role = ctx.params().text(keys::STATION_PATROL_ROLE).map(str::to_owned);
    if role.is_some_and(|role| role_in_flight(ctx, &role)) {
        return;
    }
    let target = ctx.target();
    ctx.communicate("launchPatrol", target, CommsPriority::NotAfterTraffic);
    ctx.effect(ShipEffect::LaunchPatrol);
}

fn station_respond_to_distress_call(ctx: &mut AiContext<'_>) {
    if sun_going_nova(ctx) {
        return;
    }
    if let Some((aggressor, sender)) = distress_parties(ctx) {
        if ctx.distance_to(aggressor) < ctx.scanner_range() {
            ctx.set_target(Some(aggressor));
            red_alert(ctx);
            ctx.effect(ShipEffect::LaunchDefenseShip);
            ctx.communicate(
                "distressResponseAggressor",
                aggressor,
                CommsPriority::NotAfterSending,
            );
            ctx.effect(ShipEffect::RequestHelpFromGroup);
        } else {
            ctx.communicate("distressResponseSender", sender, CommsPriority::NotAfterTraffic);
        }
    }
    ctx.install_handlers(Response::station());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::CommsRegistry;
    use crate::config::AiConfig;
    use crate::context::{ControllerState, EngineMode};
    use crate::host::{
        AlertCondition, Allegiance, DockingInstructions, GroupId, GroupState, InMemoryHost,
        MissileProfile, ShipState, Wormhole,
    };
    use crate::session::AiSession;

    const ME: EntityId = EntityId(1);
    const OTHER: EntityId = EntityId(2);
    const STATION: EntityId = EntityId(9);

    fn setup() -> (InMemoryHost, AiSession, ControllerState) {
        let mut host = InMemoryHost::new();
        host.add_ship(ShipState::new(ME, "trader"));
        let session = AiSession::with_registry(AiConfig::default(), CommsRegistry::new());
        (host, session, ControllerState::new(ME, EngineMode::Priority))
    }

    /// Runs `behaviour` and returns the handler set it asked for.
    fn run(
        host: &mut InMemoryHost,
        session: &AiSession,
        state: &mut ControllerState,
        behaviour: Behaviour,
    ) -> Option<HandlerSet> {
        let mut ctx = AiContext::new(host, session, ME, state);
        behaviour.run(&mut ctx);
        ctx.handler_request.take()
    }

    #[test]
    fn approach_flees_a_planet_that_is_too_close() {
        let (mut host, session, mut state) = setup();
        let planet = Body {
            id: 3,
            position: Vector::new(0.0, 0.0, 1_000.0),
            radius: 5_000.0,
        };
        host.blockers.insert(ME, Obstacle::Planet(planet));
        let handlers = run(&mut host, &session, &mut state, Behaviour::ApproachDestination).unwrap();

        let escape = Vector::new(0.0, 0.0, -1_000.0);
        assert_eq!(state.params.path(keys::WAYPOINTS), Some(&[escape][..]));
        assert_eq!(host.ships[&ME].destination, escape);
        assert_eq!(host.ships[&ME].desired_range, 100.0);
        assert_eq!(host.last_command(ME), Some(ShipCommand::FlyToRangeFromDestination));
        assert_eq!(
            handlers.get(EventKind::ShipAchievedDesiredRange),
            Some(Response::ShipAchievedDesiredRange)
        );
    }

    #[test]
    fn selected_planet_never_blocks() {
        let (mut host, session, mut state) = setup();
        let planet = Body {
            id: 3,
            position: Vector::new(0.0, 0.0, 1_000.0),
            radius: 5_000.0,
        };
        host.system.planets.push(planet);
        host.blockers.insert(ME, Obstacle::Planet(planet));
        state.params.set(keys::SELECTED_PLANET, 3_i64);
        run(&mut host, &session, &mut state, Behaviour::ApproachDestination);
        assert!(!state.params.contains(keys::WAYPOINTS));
    }

    #[test]
    fn own_escorts_do_not_block() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::new(OTHER, "escort").at(Vector::new(0.0, 0.0, 500.0)));
        host.add_escort_group(ME, GroupState::new(GroupId(4), vec![OTHER]));
        host.blockers.insert(ME, Obstacle::Ship(OTHER));
        run(&mut host, &session, &mut state, Behaviour::ApproachDestination);
        assert!(!state.params.contains(keys::WAYPOINTS));
    }

    #[test]
    fn refused_docking_forgets_the_station() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::station(STATION, Allegiance::Galcop));
        host.docking_replies.insert(
            STATION,
            DockingInstructions {
                message: DockingMessage::DockingRefused,
                stage: 0,
            },
        );
        state.params.set(keys::DOCKING_STATION, STATION);
        run(&mut host, &session, &mut state, Behaviour::DockWithStation);
        assert!(!state.params.contains(keys::DOCKING_STATION));
        assert_eq!(host.ships[&ME].target, None);
        assert!(state.wake.is_scheduled());
    }

    #[test]
    fn holding_docking_faces_the_station() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::station(STATION, Allegiance::Galcop).at(Vector::new(0.0, 0.0, 40_000.0)));
        host.docking_replies.insert(
            STATION,
            DockingInstructions {
                message: DockingMessage::TryAgainLater,
                stage: 0,
            },
        );
        state.params.set(keys::DOCKING_STATION, STATION);
        let handlers = run(&mut host, &session, &mut state, Behaviour::DockWithStation).unwrap();
        assert_eq!(host.last_command(ME), Some(ShipCommand::FaceDestination));
        assert_eq!(host.ships[&ME].destination, Vector::new(0.0, 0.0, 40_000.0));
        assert_eq!(
            handlers.get(EventKind::ShipAchievedDesiredRange),
            Some(Response::DockingAchievedRange)
        );
    }

    #[test]
    fn docking_releases_escorts_once_cleared() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::station(STATION, Allegiance::Galcop));
        host.add_ship(ShipState::new(OTHER, "escort"));
        host.add_ship(ShipState::new(EntityId(3), "escort"));
        host.add_escort_group(ME, GroupState::new(GroupId(4), vec![OTHER, EntityId(3)]));
        host.docking_replies.insert(
            STATION,
            DockingInstructions {
                message: DockingMessage::ApproachCoordinates,
                stage: 2,
            },
        );
        state.params.set(keys::DOCKING_STATION, STATION);
        run(&mut host, &session, &mut state, Behaviour::DockWithStation);
        assert!(host.effects_of(ME).contains(&ShipEffect::DockEscorts));
        assert_eq!(host.last_command(ME), Some(ShipCommand::FlyToRangeFromDestination));
    }

    #[test]
    fn witchspace_jump_counts_down_then_exits() {
        let (mut host, session, mut state) = setup();
        state.params.set(keys::WITCHSPACE_DESTINATION, 7_i64);
        let handlers = run(&mut host, &session, &mut state, Behaviour::EnterWitchspace).unwrap();
        assert_eq!(
            handlers.get(EventKind::ShipWitchspaceBlocked),
            Some(Response::WitchspaceBlocked)
        );
        assert_eq!(state.params.number(keys::WITCHSPACE_ENTRY), Some(1_015.0));
        assert!(host.exits.is_empty());

        host.advance(16.0);
        run(&mut host, &session, &mut state, Behaviour::EnterWitchspace);
        assert_eq!(host.exits, vec![(ME, Some(7))]);
        assert!(host.effects_of(ME).contains(&ShipEffect::NotifyGroupOfWormhole));
        assert!(!state.params.contains(keys::WITCHSPACE_ENTRY));
    }

    #[test]
    fn witchspace_waits_for_launching_escorts() {
        let (mut host, session, mut state) = setup();
        let mut escort = ShipState::new(OTHER, "escort");
        escort.status = ShipStatus::Launching;
        host.add_ship(escort);
        host.add_escort_group(ME, GroupState::new(GroupId(4), vec![OTHER]));
        state.params.set(keys::WITCHSPACE_DESTINATION, 7_i64);
        state.params.set(keys::WITCHSPACE_ENTRY, 0.0);
        run(&mut host, &session, &mut state, Behaviour::EnterWitchspace);
        assert!(host.exits.is_empty());
        assert_eq!(host.ships[&ME].destination, Vector::new(0.0, 0.0, 30_000.0));
    }

    #[test]
    fn open_wormhole_is_entered_directly() {
        let (mut host, session, mut state) = setup();
        host.wormholes.push(Wormhole {
            id: EntityId(50),
            position: Vector::new(0.0, 0.0, 2_000.0),
            expiry: host.clock + 30.0,
        });
        state.params.set(keys::WITCHSPACE_WORMHOLE, EntityId(50));
        let handlers = run(&mut host, &session, &mut state, Behaviour::EnterWitchspace).unwrap();
        assert_eq!(host.ships[&ME].destination, Vector::new(0.0, 0.0, 2_000.0));
        assert_eq!(host.ships[&ME].desired_range, 0.0);
        assert_eq!(
            handlers.get(EventKind::PlayerWillEnterWitchspace),
            Some(Response::TrackPlayerWillEnterWitchspace)
        );
    }

    #[test]
    fn fleeing_remembers_the_threat_and_plans_a_jump() {
        let (mut host, session, mut state) = setup();
        host.neighbours = vec![(5, 3.0)];
        host.system.id = 2;
        let mut pirate = ShipState::new(OTHER, "pirate").at(Vector::new(0.0, 0.0, 3_000.0));
        pirate.target = Some(ME);
        pirate.has_hostile_target = true;
        host.add_ship(pirate);
        host.ships.get_mut(&ME).unwrap().aggressor = Some(OTHER);

        run(&mut host, &session, &mut state, Behaviour::FleeCombat);
        assert_eq!(host.ships[&ME].target, Some(OTHER));
        assert_eq!(state.params.entity(keys::LAST_FLEEING), Some(OTHER));
        assert_eq!(host.last_command(ME), Some(ShipCommand::Flee));
        assert_eq!(
            state.long_term.get(CacheKey::WitchspaceFleeAt),
            Some(crate::cache::CacheValue::Number(1_015.0))
        );

        host.advance(20.0);
        run(&mut host, &session, &mut state, Behaviour::FleeCombat);
        assert_eq!(host.exits, vec![(ME, None)]);
    }

    #[test]
    fn never_flee_flag_keeps_ship_in_system() {
        let (mut host, session, mut state) = setup();
        host.neighbours = vec![(5, 3.0)];
        host.system.id = 2;
        state.params.set(keys::NEVER_FLEE, true);
        run(&mut host, &session, &mut state, Behaviour::FleeCombat);
        assert_eq!(state.long_term.get(CacheKey::WitchspaceFleeAt), None);
    }

    #[test]
    fn cascade_overrides_fleeing() {
        let (mut host, session, mut state) = setup();
        state.params.set(keys::CASCADE_DETECTED, Vector::new(0.0, 0.0, 5_000.0));
        run(&mut host, &session, &mut state, Behaviour::FleeCombat);
        let me = &host.ships[&ME];
        assert_eq!(me.destination, Vector::new(0.0, 0.0, 5_000.0));
        assert_eq!(me.desired_range, 30_000.0);
        assert_eq!(me.desired_speed, me.max_speed * 10.0);
    }

    #[test]
    fn paying_off_dumps_the_demand() {
        let (mut host, session, mut state) = setup();
        host.ships.get_mut(&ME).unwrap().pirate_demand = Some(4);
        run(&mut host, &session, &mut state, Behaviour::PayOffPirates);
        assert!(host.effects_of(ME).contains(&ShipEffect::DumpCargo { tonnes: 4 }));
        let me = &host.ships[&ME];
        assert!(me.paid_pirates);
        assert_eq!(me.pirate_demand, None);
        assert_eq!(host.last_command(ME), Some(ShipCommand::Flee));
    }

    #[test]
    fn robbery_records_a_bounded_demand_once() {
        let (mut host, session, mut state) = setup();
        {
            let me = host.ships.get_mut(&ME).unwrap();
            me.primary_role = "pirate".into();
            me.equipment |= Equipment::FUEL_SCOOPS;
            me.target = Some(OTHER);
        }
        let mut victim = ShipState::new(OTHER, "trader").at(Vector::new(0.0, 0.0, 2_000.0));
        victim.cargo_capacity = 200;
        host.add_ship(victim);
        host.add_group(GroupState::new(GroupId(1), vec![ME]).led_by(ME));

        run(&mut host, &session, &mut state, Behaviour::RobTarget);
        let demand = host.groups[&GroupId(1)].blackboard.cargo_demand.unwrap();
        assert!((2..=5).contains(&demand));
        assert_eq!(host.ships[&OTHER].pirate_demand, Some(demand));
        assert_eq!(state.params.entity(keys::LAST_PIRATE_VICTIM), Some(OTHER));

        host.ships.get_mut(&OTHER).unwrap().pirate_demand = None;
        run(&mut host, &session, &mut state, Behaviour::RobTarget);
        assert_eq!(host.ships[&OTHER].pirate_demand, None);
        assert_eq!(host.last_command(ME), Some(ShipCommand::Attack));
    }

    #[test]
    fn repelled_target_is_dropped_by_escorts_too() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::new(OTHER, "pirate").at(Vector::new(0.0, 0.0, 4_000.0)));
        let mut escort = ShipState::new(EntityId(3), "escort");
        escort.target = Some(OTHER);
        escort.defense_targets = vec![OTHER];
        host.add_ship(escort);
        host.add_escort_group(ME, GroupState::new(GroupId(4), vec![EntityId(3)]));
        {
            let me = host.ships.get_mut(&ME).unwrap();
            me.target = Some(OTHER);
            me.defense_targets = vec![OTHER];
        }
        run(&mut host, &session, &mut state, Behaviour::RepelCurrentTarget);
        assert_eq!(host.ships[&ME].target, None);
        assert!(host.ships[&ME].defense_targets.is_empty());
        assert_eq!(host.ships[&EntityId(3)].target, None);
        assert!(host.ships[&EntityId(3)].defense_targets.is_empty());
    }

    #[test]
    fn aggressive_target_is_attacked() {
        let (mut host, session, mut state) = setup();
        let mut pirate = ShipState::new(OTHER, "pirate").at(Vector::new(0.0, 0.0, 4_000.0));
        pirate.has_hostile_target = true;
        pirate.target = Some(ME);
        host.add_ship(pirate);
        host.ships.get_mut(&ME).unwrap().target = Some(OTHER);
        run(&mut host, &session, &mut state, Behaviour::RepelCurrentTarget);
        assert_eq!(host.last_command(ME), Some(ShipCommand::Attack));
        assert!(host.effects_of(ME).contains(&ShipEffect::RequestHelpFromGroup));
    }

    #[test]
    fn distress_responder_closes_on_a_distant_sender() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::new(OTHER, "pirate").at(Vector::new(0.0, 0.0, 80_000.0)));
        host.add_ship(ShipState::new(EntityId(3), "trader").at(Vector::new(0.0, 0.0, 79_000.0)));
        host.ships.get_mut(&OTHER).unwrap().bounty = 60;
        // Sender and aggressor swapped; the bounty decides.
        state.params.set(keys::DISTRESS_AGGRESSOR, EntityId(3));
        state.params.set(keys::DISTRESS_SENDER, OTHER);
        run(&mut host, &session, &mut state, Behaviour::RespondToDistressCall);
        let me = &host.ships[&ME];
        assert_eq!(me.destination, Vector::new(0.0, 0.0, 79_000.0));
        assert_eq!(me.desired_range, 1_100.0);
    }

    #[test]
    fn landing_cancels_reconsideration_and_handlers() {
        let (mut host, session, mut state) = setup();
        state.wake.tighten(host.clock, 5.0);
        let handlers = run(&mut host, &session, &mut state, Behaviour::LandOnPlanet).unwrap();
        assert!(handlers.is_empty());
        assert!(!state.wake.is_scheduled());
        assert_eq!(host.last_command(ME), Some(ShipCommand::LandOnPlanet));
    }

    #[test]
    fn missile_uses_its_proximity() {
        let (mut host, session, mut state) = setup();
        host.ships.get_mut(&ME).unwrap().missile = Some(MissileProfile {
            range: None,
            proximity: Some(60.0),
        });
        let handlers = run(&mut host, &session, &mut state, Behaviour::MissileInterceptTarget).unwrap();
        assert_eq!(host.ships[&ME].desired_range, 60.0);
        assert_eq!(host.last_command(ME), Some(ShipCommand::Intercept));
        assert_eq!(
            handlers.get(EventKind::ShipAchievedDesiredRange),
            Some(Response::MissileAchievedRange)
        );
    }

    #[test]
    fn missile_reacquires_uncloaked_target() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::new(OTHER, "pirate"));
        state.params.set(keys::INTERCEPT_COORDINATES, Vector::new(10.0, 0.0, 0.0));
        state.params.set(keys::INTERCEPT_TARGET, OTHER);
        run(&mut host, &session, &mut state, Behaviour::MissileInterceptCoordinates);
        assert_eq!(host.ships[&ME].destination, Vector::new(10.0, 0.0, 0.0));
        assert_eq!(host.ships[&ME].desired_range, MISSILE_PROXIMITY);
        assert_eq!(host.ships[&ME].target, Some(OTHER));
    }

    #[test]
    fn follow_stops_at_a_wormhole_without_pursuit() {
        let (mut host, session, mut state) = setup();
        let mut quarry = ShipState::new(OTHER, "trader").at(Vector::new(0.0, 0.0, 8_000.0));
        quarry.status = ShipStatus::EnteringWitchspace;
        host.add_ship(quarry);
        host.ships.get_mut(&ME).unwrap().target = Some(OTHER);
        run(&mut host, &session, &mut state, Behaviour::FollowCurrentTarget);
        assert_eq!(host.ships[&ME].target, None);
        assert_eq!(host.ships[&ME].destination, Vector::ZERO);
    }

    #[test]
    fn pursuit_follows_into_the_wormhole() {
        let (mut host, session, mut state) = setup();
        let mut quarry = ShipState::new(OTHER, "trader").at(Vector::new(0.0, 0.0, 8_000.0));
        quarry.status = ShipStatus::EnteringWitchspace;
        host.add_ship(quarry);
        host.wormholes.push(Wormhole {
            id: EntityId(50),
            position: Vector::new(0.0, 0.0, 8_050.0),
            expiry: host.clock + 30.0,
        });
        host.ships.get_mut(&ME).unwrap().target = Some(OTHER);
        state.params.set(keys::WITCHSPACE_PURSUIT, true);
        state.params.set(keys::REMEMBERED_TARGET, OTHER);
        run(&mut host, &session, &mut state, Behaviour::FollowCurrentTarget);
        assert_eq!(state.params.entity(keys::WITCHSPACE_WORMHOLE), Some(EntityId(50)));
        assert!(!state.params.contains(keys::REMEMBERED_TARGET));
        assert_eq!(host.ships[&ME].desired_range, 0.0);
    }

    #[test]
    fn police_fine_their_target() {
        let (mut host, session, mut state) = setup();
        host.ships.get_mut(&ME).unwrap().scan_class = ScanClass::Police;
        host.add_ship(ShipState::new(OTHER, "trader"));
        host.ships.get_mut(&ME).unwrap().target = Some(OTHER);
        run(&mut host, &session, &mut state, Behaviour::FineCurrentTarget);
        assert!(host.effects_of(ME).contains(&ShipEffect::MarkTargetForFines));
        assert_eq!(host.last_command(ME), Some(ShipCommand::Idle));
    }

    #[test]
    fn unregistered_custom_behaviour_does_nothing() {
        let (mut host, mut session, mut state) = setup();
        let id = session.rules_mut().register_condition("notAnAction", |_| true);
        run(&mut host, &session, &mut state, Behaviour::Custom(id));
        assert!(host.commands.is_empty());
    }

    /// Turns `ME` into a station inside its own group with `members`.
    fn station_setup(members: &[ShipState]) -> (InMemoryHost, AiSession, ControllerState) {
        let (mut host, session, state) = setup();
        host.add_ship(ShipState::station(ME, Allegiance::Galcop));
        let mut ids = vec![ME];
        for member in members {
            ids.push(host.add_ship(member.clone()));
        }
        host.add_group(GroupState::new(GroupId(1), ids).led_by(ME));
        (host, session, state)
    }

    fn aggressive_pirate() -> ShipState {
        let mut pirate = ShipState::new(OTHER, "pirate").at(Vector::new(0.0, 0.0, 6_000.0));
        pirate.target = Some(ME);
        pirate.has_hostile_target = true;
        pirate
    }

    #[test]
    fn station_launches_defenders_at_an_aggressor() {
        let (mut host, session, mut state) = station_setup(&[]);
        host.add_ship(aggressive_pirate());
        host.ships.get_mut(&ME).unwrap().target = Some(OTHER);
        let handlers =
            run(&mut host, &session, &mut state, Behaviour::StationLaunchDefenseShips).unwrap();
        assert_eq!(host.ships[&ME].alert, AlertCondition::Red);
        assert_eq!(
            host.effects_of(ME),
            vec![ShipEffect::LaunchDefenseShip, ShipEffect::RequestHelpFromGroup]
        );
        assert_eq!(handlers, Response::station());
    }

    #[test]
    fn quiet_station_stands_down_instead_of_launching() {
        let (mut host, session, mut state) = station_setup(&[]);
        host.ships.get_mut(&ME).unwrap().alert = AlertCondition::Red;
        run(&mut host, &session, &mut state, Behaviour::StationLaunchDefenseShips);
        assert_eq!(host.ships[&ME].alert, AlertCondition::Yellow);
        assert!(host.effects_of(ME).is_empty());
    }

    #[test]
    fn only_one_miner_flies_at_a_time() {
        let miner = ShipState::new(EntityId(3), "miner");
        let (mut host, session, mut state) = station_setup(&[miner]);
        let handlers = run(&mut host, &session, &mut state, Behaviour::StationLaunchMiner);
        assert!(host.effects_of(ME).is_empty());
        assert_eq!(handlers, Some(Response::station()));

        host.destroy(EntityId(3));
        run(&mut host, &session, &mut state, Behaviour::StationLaunchMiner);
        assert_eq!(host.effects_of(ME), vec![ShipEffect::LaunchMiner]);
    }

    #[test]
    fn patrol_role_comes_from_the_parameters() {
        let police = ShipState::new(EntityId(3), "police");
        let (mut host, session, mut state) = station_setup(&[police]);
        state.params.set(keys::STATION_PATROL_ROLE, "police");
        run(&mut host, &session, &mut state, Behaviour::StationLaunchPatrol);
        assert!(host.effects_of(ME).is_empty());

        state.params.set(keys::STATION_PATROL_ROLE, "interceptor");
        run(&mut host, &session, &mut state, Behaviour::StationLaunchPatrol);
        assert_eq!(host.effects_of(ME), vec![ShipEffect::LaunchPatrol]);
    }

    #[test]
    fn salvager_launch_also_calms_the_station() {
        let (mut host, session, mut state) = station_setup(&[]);
        host.ships.get_mut(&ME).unwrap().alert = AlertCondition::Yellow;
        run(&mut host, &session, &mut state, Behaviour::StationLaunchSalvager);
        assert_eq!(host.ships[&ME].alert, AlertCondition::Green);
        assert_eq!(host.effects_of(ME), vec![ShipEffect::LaunchScavenger]);
    }

    #[test]
    fn unstable_sun_grounds_every_launch() {
        let (mut host, session, mut state) = station_setup(&[]);
        host.system.sun = Some(Body {
            id: 0,
            position: Vector::new(0.0, 0.0, 900_000.0),
            radius: 100_000.0,
        });
        host.system.sun_unstable = true;
        host.add_ship(aggressive_pirate());
        host.ships.get_mut(&ME).unwrap().target = Some(OTHER);
        for behaviour in [
            Behaviour::StationLaunchDefenseShips,
            Behaviour::StationLaunchMiner,
            Behaviour::StationLaunchPatrol,
            Behaviour::StationLaunchSalvager,
        ] {
            assert!(run(&mut host, &session, &mut state, behaviour).is_none());
        }
        assert!(host.effects_of(ME).is_empty());
    }

    #[test]
    fn station_engages_a_nearby_distress_aggressor() {
        let (mut host, session, mut state) = station_setup(&[]);
        host.add_ship(aggressive_pirate());
        host.add_ship(ShipState::new(EntityId(3), "trader").at(Vector::new(0.0, 0.0, 5_000.0)));
        state.params.set(keys::DISTRESS_AGGRESSOR, OTHER);
        state.params.set(keys::DISTRESS_SENDER, EntityId(3));
        run(&mut host, &session, &mut state, Behaviour::StationRespondToDistressCall);
        assert_eq!(host.ships[&ME].target, Some(OTHER));
        assert_eq!(host.ships[&ME].alert, AlertCondition::Red);
        assert!(host.effects_of(ME).contains(&ShipEffect::LaunchDefenseShip));
    }

    #[test]
    fn station_only_reassures_a_distant_sender() {
        let (mut host, _, mut state) = station_setup(&[]);
        let mut registry = CommsRegistry::new();
        registry.set_communication(
            "generic",
            "generic",
            "distressResponseSender",
            "Help is coming.",
        );
        let session = AiSession::with_registry(AiConfig::default(), registry);
        host.add_ship(aggressive_pirate().at(Vector::new(0.0, 0.0, 60_000.0)));
        host.add_ship(ShipState::new(EntityId(3), "trader").at(Vector::new(0.0, 0.0, 59_000.0)));
        state.params.set(keys::DISTRESS_AGGRESSOR, OTHER);
        state.params.set(keys::DISTRESS_SENDER, EntityId(3));
        run(&mut host, &session, &mut state, Behaviour::StationRespondToDistressCall);
        assert_eq!(host.ships[&ME].target, None);
        assert!(host.effects_of(ME).is_empty());
        assert_eq!(host.messages_from(ME), vec!["Help is coming."]);
    }

    #[test]
    fn inactive_thargon_drops_out_of_the_fight() {
        let (mut host, session, mut state) = setup();
        {
            let me = host.ships.get_mut(&ME).unwrap();
            me.primary_role = super::super::conditions::THARGON_ROLE.into();
            me.scan_class = ScanClass::Thargoid;
            me.target = Some(OTHER);
        }
        let mut hunter = ShipState::new(OTHER, "hunter").at(Vector::new(0.0, 0.0, 3_000.0));
        hunter.target = Some(ME);
        hunter.has_hostile_target = true;
        hunter.defense_targets = vec![ME];
        host.add_ship(hunter);
        host.add_ship(ShipState::new(EntityId(5), "thargoid-mothership"));
        host.add_group(GroupState::new(GroupId(2), vec![EntityId(5), ME]).led_by(EntityId(5)));

        let handlers =
            run(&mut host, &session, &mut state, Behaviour::BecomeInactiveThargon).unwrap();
        assert!(handlers.is_empty());
        let me = &host.ships[&ME];
        assert_eq!(me.scan_class, ScanClass::Cargo);
        assert_eq!((me.target, me.group), (None, None));
        assert!(!host.groups[&GroupId(2)].contains(ME));
        assert_eq!(host.ships[&OTHER].target, None);
        assert!(host.ships[&OTHER].defense_targets.is_empty());
        assert_eq!(host.last_command(ME), Some(ShipCommand::Stop));
    }

    #[test]
    fn joining_the_target_group() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::new(OTHER, "thargoid-mothership"));
        host.add_group(GroupState::new(GroupId(3), vec![OTHER]).led_by(OTHER));
        host.ships.get_mut(&ME).unwrap().target = Some(OTHER);
        run(&mut host, &session, &mut state, Behaviour::JoinTargetGroup);
        assert_eq!(host.ships[&ME].group, Some(GroupId(3)));
        assert_eq!(host.groups[&GroupId(3)].ships, vec![OTHER, ME]);
        assert_eq!(host.last_command(ME), Some(ShipCommand::Idle));
    }

    #[test]
    fn mining_keeps_the_standard_handlers() {
        let (mut host, session, mut state) = setup();
        let handlers = run(&mut host, &session, &mut state, Behaviour::MineTarget).unwrap();
        assert_eq!(host.last_command(ME), Some(ShipCommand::Mine));
        assert_eq!(handlers.get(EventKind::ShipTargetLost), Some(Response::ShipTargetLost));
    }
}

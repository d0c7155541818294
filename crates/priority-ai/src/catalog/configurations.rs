//! Configuration steps: target acquisition, destination selection and
//! flight-control setup.
//!
//! A configuration prepares state for a behaviour or for a later condition.
//! It writes parameters and flight controls but never issues a command.

use priority_tree::Configuration;
use tracing::{debug, warn};

use super::{
    WITCHPOINT, distance_to_body, live_entity, planets, reduce_alert, selected_planet,
};
use crate::comms::{CommsParams, CommsPriority};
use crate::context::AiContext;
use crate::host::{Body, EntityId, ScanClass, SystemId, Vector};
use crate::params::keys;
use crate::rules::RuleId;

/// Range kept from stations when approaching them.
const STATION_APPROACH_RANGE: f64 = 15_000.0;

/// A named configuration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setup {
    // Targets
    AcquireCombatTarget,
    AcquireDefensiveEscortTarget,
    AcquireHostileCombatTarget,
    AcquireOffensiveEscortTarget,
    AcquirePlayerAsTarget,
    AcquireScannedTarget,
    CheckScanner,

    // Selection
    SelectPlanet,
    SelectRandomTradeStation,
    SelectShuttleDestination,
    SelectWitchspaceDestination,
    SelectWitchspaceDestinationInbound,
    SelectWitchspaceDestinationOutbound,

    // Destinations
    MissileAdjustSpread,
    SetDestinationToGroupLeader,
    SetDestinationToHomeStation,
    SetDestinationToMainPlanet,
    SetDestinationToMainStation,
    SetDestinationToNearestFriendlyStation,
    SetDestinationToNearestHostileStation,
    SetDestinationToNearestStation,
    SetDestinationToNearestWormhole,
    SetDestinationToPirateLurk,
    SetDestinationToScannedTarget,
    SetDestinationToSelectedPlanet,
    SetDestinationToSelectedStation,
    SetDestinationToSunskimEnd,
    SetDestinationToSunskimStart,
    SetDestinationToWaypoint,
    SetDestinationToWitchpoint,
    SetWaypoint,

    // Docking
    SetHomeStationForDocking,
    SetNearbyFriendlyStationForDocking,
    SetSelectedStationForDocking,

    // Groups and ship state
    AppointGroupLeader,
    EscortGroupLeader,
    ForgetCargoDemand,
    LeaveEscortGroup,
    LightsOff,
    LightsOn,
    SetRemoteControl,

    // Stations
    StationReduceAlertLevel,
    /// Drops a target that has left scanner range.
    StationValidateTarget,

    Custom(RuleId),
}

impl<'a> Configuration<AiContext<'a>> for Setup {
    fn configure(&self, ctx: &mut AiContext<'a>) {
        self.apply(ctx);
    }
}

impl Setup {
    pub fn apply(self, ctx: &mut AiContext<'_>) {
        match self {
            Setup::AcquireCombatTarget => acquire_combat_target(ctx, false),
            Setup::AcquireDefensiveEscortTarget => acquire_defensive_escort_target(ctx),
            Setup::AcquireHostileCombatTarget => acquire_combat_target(ctx, true),
            Setup::AcquireOffensiveEscortTarget => acquire_offensive_escort_target(ctx),
            Setup::AcquirePlayerAsTarget => {
                let player = ctx.host().player();
                ctx.set_target(player);
            }
            Setup::AcquireScannedTarget => {
                let scanned = ctx.params().entity(keys::SCAN_RESULT_SPECIFIC);
                ctx.set_target(scanned);
            }
            Setup::CheckScanner => check_scanner(ctx),

            Setup::SelectPlanet => {
                let all = planets(ctx);
                if !all.is_empty() {
                    let pick = (ctx.random() * all.len() as f64) as usize;
                    let id = all[pick.min(all.len() - 1)].id;
                    ctx.params_mut().set(keys::SELECTED_PLANET, i64::from(id));
                }
            }
            Setup::SelectRandomTradeStation => select_random_trade_station(ctx),
            Setup::SelectShuttleDestination => select_shuttle_destination(ctx),
            Setup::SelectWitchspaceDestination => select_witchspace_destination(ctx),
            Setup::SelectWitchspaceDestinationInbound => select_route_destination(ctx, true),
            Setup::SelectWitchspaceDestinationOutbound => select_route_destination(ctx, false),

            Setup::MissileAdjustSpread => missile_adjust_spread(ctx),
            Setup::SetDestinationToGroupLeader => {
                let destination = ctx
                    .leader()
                    .and_then(|l| ctx.ship(l))
                    .map_or(ctx.position(), |l| l.position);
                let speed = ctx.max_speed();
                ctx.set_course(destination, 2_000.0, speed);
            }
            Setup::SetDestinationToHomeStation => {
                let home = ctx.home_station();
                station_destination(ctx, home);
            }
            Setup::SetDestinationToMainPlanet => {
                if let Some(planet) = ctx.host().system().main_planet {
                    let speed = ctx.cruise_speed();
                    ctx.set_course(planet.position, planet.radius * 3.0, speed);
                }
            }
            Setup::SetDestinationToMainStation => {
                let main = ctx.host().system().main_station;
                station_destination(ctx, main);
            }
            Setup::SetDestinationToNearestFriendlyStation => {
                let station = ctx
                    .nearest_station()
                    .filter(|&s| ctx.friendly_station(s));
                station_destination(ctx, station);
            }
            Setup::SetDestinationToNearestHostileStation => {
                let station = ctx
                    .nearest_station()
                    .filter(|&s| ctx.hostile_station(s));
                station_destination(ctx, station);
            }
            Setup::SetDestinationToNearestStation => {
                let station = ctx.nearest_station();
                station_destination(ctx, station);
            }
            Setup::SetDestinationToNearestWormhole => nearest_wormhole(ctx),
            Setup::SetDestinationToPirateLurk => pirate_lurk(ctx),
            Setup::SetDestinationToScannedTarget => {
                let scanned = ctx
                    .params()
                    .entity(keys::SCAN_RESULT_SPECIFIC)
                    .and_then(|id| ctx.ship(id))
                    .map(|s| s.position);
                if let Some(position) = scanned {
                    let speed = ctx.cruise_speed();
                    ctx.set_course(position, 4_000.0, speed);
                }
            }
            Setup::SetDestinationToSelectedPlanet => {
                if let Some(planet) = selected_planet(ctx) {
                    let speed = ctx.cruise_speed();
                    ctx.set_course(planet.position, planet.radius + 100.0, speed);
                }
            }
            Setup::SetDestinationToSelectedStation => {
                let station = live_entity(ctx, keys::SELECTED_STATION);
                station_destination(ctx, station);
            }
            Setup::SetDestinationToSunskimEnd => sunskim_end(ctx),
            Setup::SetDestinationToSunskimStart => {
                if let Some(sun) = ctx.host().system().sun {
                    let speed = ctx.cruise_speed();
                    // Highest point that still yields fuel.
                    ctx.set_course(sun.position, sun.radius * 1.125, speed);
                }
            }
            Setup::SetDestinationToWaypoint => waypoint_destination(ctx),
            Setup::SetDestinationToWitchpoint => {
                let speed = ctx.cruise_speed();
                ctx.set_course(WITCHPOINT, 10_000.0, speed);
            }
            Setup::SetWaypoint => {
                if let Some(generator) = ctx.params().generator(keys::WAYPOINT_GENERATOR) {
                    generator.generate(ctx);
                }
                waypoint_destination(ctx);
            }

            Setup::SetHomeStationForDocking => {
                match ctx.home_station() {
                    Some(home) => ctx.params_mut().set(keys::DOCKING_STATION, home),
                    None => {
                        ctx.params_mut().remove(keys::DOCKING_STATION);
                    }
                }
            }
            Setup::SetNearbyFriendlyStationForDocking => {
                let range = ctx.scanner_range();
                let station = ctx
                    .nearest_station()
                    .filter(|&s| ctx.distance_to(s) < range && ctx.friendly_station(s));
                match station {
                    Some(station) => ctx.params_mut().set(keys::DOCKING_STATION, station),
                    None => {
                        ctx.params_mut().remove(keys::DOCKING_STATION);
                    }
                }
            }
            Setup::SetSelectedStationForDocking => {
                match live_entity(ctx, keys::SELECTED_STATION) {
                    Some(station) => ctx.params_mut().set(keys::DOCKING_STATION, station),
                    None => {
                        ctx.params_mut().remove(keys::DOCKING_STATION);
                    }
                }
            }

            Setup::AppointGroupLeader => appoint_group_leader(ctx),
            Setup::EscortGroupLeader => escort_group_leader(ctx),
            Setup::ForgetCargoDemand => forget_cargo_demand(ctx),
            Setup::LeaveEscortGroup => {
                let in_escort = ctx
                    .leader()
                    .and_then(|l| ctx.ship(l))
                    .and_then(|l| l.escort_group)
                    .and_then(|g| ctx.host().group(g))
                    .is_some_and(|g| g.contains(ctx.ship_id()));
                if in_escort {
                    ctx.leave_group();
                }
            }
            Setup::LightsOff => set_lights(ctx, false),
            Setup::LightsOn => set_lights(ctx, true),
            Setup::SetRemoteControl => {
                let accuracy = ctx.leader().and_then(|l| ctx.ship(l)).map(|l| l.accuracy);
                if let (Some(accuracy), Some(me)) = (accuracy, ctx.me_mut()) {
                    me.accuracy = accuracy;
                }
            }

            Setup::StationReduceAlertLevel => reduce_alert(ctx),
            Setup::StationValidateTarget => {
                // Raw target, so a vanished one is infinitely far and dropped.
                let target = ctx.me().and_then(|s| s.target);
                if target.is_some_and(|t| ctx.distance_to(t) > ctx.scanner_range()) {
                    ctx.set_target(None);
                }
            }

            Setup::Custom(id) => match ctx.session().rules().action(id) {
                Some(f) => f(ctx),
                None => {
                    warn!(target: "priority_ai::catalog", rule = %id, "custom configuration not registered");
                }
            },
        }
    }
}

// ----------------------------------------------------------------------
// Targets
// ----------------------------------------------------------------------

/// Whether `id` is something worth shooting back at from here.
fn in_range_and_visible(ctx: &AiContext<'_>, id: EntityId) -> bool {
    ctx.ship(id).is_some_and(|s| !s.is_cloaked) && ctx.distance_to(id) < ctx.scanner_range()
}

/// Keeps a current target that is still in space, otherwise picks a defense
/// target, then something a group mate or escort is fighting.
///
/// `hostile_only` additionally requires every candidate to be aggressive.
fn acquire_combat_target(ctx: &mut AiContext<'_>, hostile_only: bool) {
    let me = ctx.ship_id();
    if let Some(target) = ctx.target() {
        let drop = ctx.allied(me, target)
            || ctx
                .ship(target)
                .is_some_and(|t| matches!(t.scan_class, ScanClass::Cargo | ScanClass::Buoy));
        if drop {
            ctx.set_target(None);
        } else if ctx.ship(target).is_some_and(|t| t.is_in_space())
            && (!hostile_only || ctx.is_aggressive(target))
        {
            return;
        }
    }

    for id in ctx.defense_targets() {
        if hostile_only && !ctx.is_aggressive(id) {
            continue;
        }
        if ctx.distance_to(id) >= ctx.scanner_range() {
            ctx.remove_defense_target(id);
            continue;
        }
        if ctx.ship(id).is_some_and(|s| !s.is_cloaked) {
            ctx.set_target(Some(id));
            return;
        }
    }

    let mut mates = ctx.group_members();
    mates.extend(ctx.escort_members());
    for mate in mates.into_iter().filter(|&m| m != me) {
        if !ctx.is_fighting(mate) {
            continue;
        }
        let Some(their_target) = ctx.ship(mate).and_then(|s| s.target) else {
            continue;
        };
        if ctx.allied(me, their_target) || (hostile_only && !ctx.is_aggressive(their_target)) {
            continue;
        }
        if in_range_and_visible(ctx, their_target) {
            ctx.set_target(Some(their_target));
            return;
        }
    }
}

/// Defends the mothership against whatever is shooting at it.
fn acquire_defensive_escort_target(ctx: &mut AiContext<'_>) {
    let me = ctx.ship_id();
    if let Some(target) = ctx.target() {
        if ctx.allied(me, target) {
            ctx.set_target(None);
        } else if ctx.ship(target).is_some_and(|t| t.is_in_space()) && ctx.is_aggressive(target) {
            return;
        }
    }
    let Some(leader) = ctx.leader().filter(|&l| l != me) else {
        return;
    };
    let targets_leader = |ctx: &AiContext<'_>, id: EntityId| {
        ctx.ship(id).is_some_and(|s| s.target == Some(leader))
    };

    let leader_target = ctx.ship(leader).and_then(|l| l.target);
    if ctx.is_fighting(leader)
        && let Some(target) = leader_target
        && targets_leader(&*ctx, target)
        && in_range_and_visible(ctx, target)
    {
        ctx.set_target(Some(target));
        return;
    }
    let defenders: Vec<EntityId> = ctx
        .ship(leader)
        .map(|l| l.defense_targets.clone())
        .unwrap_or_default();
    for id in defenders {
        if targets_leader(&*ctx, id) && ctx.is_aggressive(id) && in_range_and_visible(ctx, id) {
            ctx.set_target(Some(id));
            return;
        }
    }
}

/// Joins in on the mothership's attack.
fn acquire_offensive_escort_target(ctx: &mut AiContext<'_>) {
    let Some(leader) = ctx.leader().filter(|&l| l != ctx.ship_id()) else {
        return;
    };
    let Some(target) = ctx
        .ship(leader)
        .filter(|l| l.has_hostile_target)
        .and_then(|l| l.target)
    else {
        return;
    };
    if in_range_and_visible(ctx, target) {
        ctx.set_target(Some(target));
        ctx.add_defense_target(target);
    }
}

fn check_scanner(ctx: &mut AiContext<'_>) {
    let ignore_unpowered = ctx.params().flag(keys::SCAN_IGNORES_UNPOWERED);
    let me = ctx.ship_id();
    let seen = ctx.host().scan(me, ignore_unpowered);
    let params = ctx.params_mut();
    params.set(keys::SCAN_RESULTS, seen);
    params.remove(keys::SCAN_RESULT_SPECIFIC);
}

// ----------------------------------------------------------------------
// Selection
// ----------------------------------------------------------------------

/// The main station for honest traders, otherwise any friendly station with
/// equal odds.
fn select_random_trade_station(ctx: &mut AiContext<'_>) {
    let bounty = f64::from(ctx.me().map_or(0, |s| s.bounty));
    let main = ctx.host().system().main_station;
    let mut choice = None;
    if let Some(main) = main
        && ctx.friendly_station(main)
    {
        let preference = if bounty == 0.0 {
            0.9
        } else if bounty <= ctx.fine_threshold() {
            0.5
        } else {
            0.0
        };
        if ctx.chance(preference) {
            choice = Some(main);
        }
    }
    if choice.is_none() {
        let mut seen = 0u32;
        let stations = ctx.host().stations();
        for station in stations {
            if !ctx.friendly_station(station) {
                continue;
            }
            seen += 1;
            if ctx.chance(1.0 / f64::from(seen)) {
                choice = Some(station);
            }
        }
    }
    match choice {
        Some(station) => {
            ctx.params_mut().set(keys::SELECTED_STATION, station);
            ctx.communicate("selectedStation", station, CommsPriority::Quiet);
        }
        None => {
            ctx.params_mut().remove(keys::SELECTED_STATION);
        }
    }
}

#[derive(Clone, Copy)]
enum ShuttleStop {
    Planet(Body),
    Station(EntityId),
}

/// A nearby planet or slow friendly station, preferring ones close to the
/// main planet.
fn select_shuttle_destination(ctx: &mut AiContext<'_>) {
    let my_max = ctx.max_speed();
    let near_limit = ctx
        .host()
        .system()
        .main_planet
        .map_or(f64::INFINITY, |p| p.radius * 5.0);

    let mut candidates: Vec<(f64, ShuttleStop)> = planets(ctx)
        .into_iter()
        .map(|p| (distance_to_body(ctx, &p), p.radius, ShuttleStop::Planet(p)))
        .filter(|(d, radius, _)| *d > radius + 10_000.0)
        .map(|(d, _, stop)| (d, stop))
        .collect();
    let stations = ctx.host().stations();
    for station in stations {
        let Some((radius, speed)) = ctx.ship(station).map(|s| (s.collision_radius, s.max_speed))
        else {
            continue;
        };
        let d = ctx.distance_to(station);
        if d > radius + 10_000.0 && speed < my_max / 5.0 && ctx.friendly_station(station) {
            candidates.push((d, ShuttleStop::Station(station)));
        }
    }
    let main_position = ctx.host().system().main_planet.map(|p| p.position);
    let stop_position = |ctx: &AiContext<'_>, stop: &ShuttleStop| match stop {
        ShuttleStop::Planet(p) => Some(p.position),
        ShuttleStop::Station(s) => ctx.ship(*s).map(|s| s.position),
    };
    let (near, far): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|(_, stop)| {
        match (main_position, stop_position(ctx, stop)) {
            (Some(main), Some(p)) => main.distance(p) <= near_limit,
            _ => true,
        }
    });
    let pool = if near.is_empty() { far } else { near };
    if pool.is_empty() {
        return;
    }
    let pick = ((ctx.random() * pool.len() as f64) as usize).min(pool.len() - 1);
    match pool[pick].1 {
        ShuttleStop::Planet(p) => {
            let params = ctx.params_mut();
            params.set(keys::SELECTED_PLANET, i64::from(p.id));
            params.remove(keys::SELECTED_STATION);
        }
        ShuttleStop::Station(s) => {
            let params = ctx.params_mut();
            params.set(keys::SELECTED_STATION, s);
            params.remove(keys::SELECTED_PLANET);
        }
    }
}

/// Keeps a still-reachable destination, otherwise picks any system within
/// fuel range.
fn select_witchspace_destination(ctx: &mut AiContext<'_>) {
    let Some((hyperdrive, fuel)) = ctx.me().map(|s| (s.has_hyperspace_motor(), s.fuel)) else {
        return;
    };
    if !hyperdrive {
        ctx.params_mut().remove(keys::WITCHSPACE_DESTINATION);
        return;
    }
    let here = ctx.host().system().id;
    if let Some(current) = ctx.params().integer(keys::WITCHSPACE_DESTINATION)
        && let Ok(current) = SystemId::try_from(current)
        && current != here
        && ctx.host().distance_to_system(current) <= fuel
    {
        return;
    }
    let reachable = ctx.host().systems_in_range(fuel);
    if reachable.is_empty() {
        ctx.params_mut().remove(keys::WITCHSPACE_DESTINATION);
        return;
    }
    let pick = ((ctx.random() * reachable.len() as f64) as usize).min(reachable.len() - 1);
    let destination = reachable[pick];
    ctx.params_mut()
        .set(keys::WITCHSPACE_DESTINATION, i64::from(destination));
    let mut params = CommsParams::new();
    params.insert(keys::WITCHSPACE_DESTINATION.to_string(), destination.to_string());
    ctx.communicate("selectedWitchspaceDestination", params, CommsPriority::Quiet);
}

/// Heads home (`inbound`) or to the ship's destination system. Ships whose
/// home is their destination wander instead.
fn select_route_destination(ctx: &mut AiContext<'_>, inbound: bool) {
    let Some((home, destination)) = ctx.me().map(|s| (s.home_system, s.destination_system)) else {
        return;
    };
    if home == destination {
        select_witchspace_destination(ctx);
    } else {
        set_witchspace_route_to(ctx, if inbound { home } else { destination });
    }
}

/// Stores the next jump toward `target`: the system itself if it is in
/// range, otherwise the first hop of the route. `-1` marks arrival or an
/// unreachable target.
pub(crate) fn set_witchspace_route_to(ctx: &mut AiContext<'_>, target: SystemId) {
    let fuel = ctx.me().map_or(0.0, |s| s.fuel);
    let host = ctx.host();
    let next: Option<i64> = if target == host.system().id {
        Some(-1)
    } else if host.distance_to_system(target) < fuel {
        Some(i64::from(target))
    } else {
        match host.route_next_hop(target) {
            None => Some(-1),
            Some(hop) if host.distance_to_system(hop) <= fuel => Some(i64::from(hop)),
            Some(_) => None,
        }
    };
    match next {
        Some(system) => ctx.params_mut().set(keys::WITCHSPACE_DESTINATION, system),
        None => {
            ctx.params_mut().remove(keys::WITCHSPACE_DESTINATION);
        }
    }
}

// ----------------------------------------------------------------------
// Destinations
// ----------------------------------------------------------------------

/// Flies toward `station` at cruise speed, or holds position if there is
/// none.
fn station_destination(ctx: &mut AiContext<'_>, station: Option<EntityId>) {
    let position = station.and_then(|s| ctx.ship(s)).map(|s| s.position);
    match position {
        Some(position) => {
            let speed = ctx.cruise_speed();
            ctx.set_course(position, STATION_APPROACH_RANGE, speed);
        }
        None => {
            let here = ctx.position();
            ctx.set_destination(here);
            ctx.set_desired_range(0.0);
        }
    }
}

/// Spreads a salvo: the lead missile goes straight for the target, the rest
/// aim near a point beside it.
fn missile_adjust_spread(ctx: &mut AiContext<'_>) {
    let Some(target_position) = ctx.target().and_then(|t| ctx.ship(t)).map(|t| t.position) else {
        return;
    };
    let speed = ctx.max_speed();
    let near = ctx
        .params()
        .entity(keys::SCAN_RESULT_SPECIFIC)
        .and_then(|id| ctx.ship(id))
        .map(|s| s.position);
    match near {
        None => ctx.set_course(target_position, 100.0, speed),
        Some(near) => {
            let jitter = Vector::new(ctx.random() - 0.5, ctx.random() - 0.5, ctx.random() - 0.5)
                .normalize_or_zero()
                * 20.0;
            ctx.set_course(near + jitter, 1_000.0, speed);
        }
    }
}

fn nearest_wormhole(ctx: &mut AiContext<'_>) {
    let now = ctx.now();
    let here = ctx.position();
    let nearest = ctx
        .host()
        .wormholes()
        .iter()
        .filter(|w| w.expiry > now)
        .min_by(|a, b| {
            a.position
                .distance(here)
                .total_cmp(&b.position.distance(here))
        })
        .map(|w| w.position);
    let speed = ctx.max_speed();
    match nearest {
        Some(position) => ctx.set_course(position, 0.0, speed),
        None => ctx.set_course(here, 1_000.0, speed),
    }
}

/// Somewhere on a space lane to wait for victims. Remembered once chosen.
fn pirate_lurk(ctx: &mut AiContext<'_>) {
    let lurk = match ctx.params().vector(keys::PIRATE_LURK) {
        Some(lurk) => lurk,
        None => {
            let lurk = current_lane_position(ctx).unwrap_or_else(|| random_lane_point(ctx));
            ctx.params_mut().set(keys::PIRATE_LURK, lurk);
            lurk
        }
    };
    let speed = ctx.cruise_speed();
    ctx.set_course(lurk, 1_000.0, speed);
}

/// The current position, if it already lies on a lane clear of the sun and
/// main planet.
fn current_lane_position(ctx: &AiContext<'_>) -> Option<Vector> {
    let system = ctx.host().system();
    let (sun, planet) = (system.sun?, system.main_planet?);
    let p = ctx.position();
    if distance_to_body(ctx, &sun) <= sun.radius * 3.0
        || distance_to_body(ctx, &planet) <= planet.radius * 3.0
    {
        return None;
    }
    let range = ctx.scanner_range();
    let on_witchpoint_lane =
        p.z < planet.position.z - planet.radius * 2.0 && p.x * p.x + p.y * p.y < range * range * 4.0;
    let between_planet_and_sun = (p - planet.position)
        .normalize_or_zero()
        .dot((p - sun.position).normalize_or_zero())
        < -0.9;
    let on_sun_lane = p.normalize_or_zero().dot(sun.position.normalize_or_zero()) > 0.9;
    (on_witchpoint_lane || between_planet_and_sun || on_sun_lane).then_some(p)
}

/// A point part way along one of the three lanes, or the witchpoint itself.
fn random_lane_point(ctx: &mut AiContext<'_>) -> Vector {
    let system = ctx.host().system();
    let planet = system.main_planet.map_or(WITCHPOINT, |p| p.position);
    let sun = system.sun.map_or(WITCHPOINT, |s| s.position);
    let choice = ctx.random();
    let (from, to) = if choice < 0.7 {
        (WITCHPOINT, planet)
    } else if choice < 0.8 {
        (planet, sun)
    } else if choice < 0.9 {
        (WITCHPOINT, sun)
    } else {
        return WITCHPOINT;
    };
    let along = 0.2 + ctx.random() * 0.6;
    from.lerp(to, along)
}

/// Skims parallel to the sun's surface, further the emptier the tank.
fn sunskim_end(ctx: &mut AiContext<'_>) {
    let Some(sun) = ctx.host().system().sun else {
        return;
    };
    let Some(fuel) = ctx.me().map(|s| s.fuel) else {
        return;
    };
    let here = ctx.position();
    let random = Vector::new(ctx.random() - 0.5, ctx.random() - 0.5, ctx.random() - 0.5);
    let outward = here - sun.position;
    let mut direction = random.cross(outward).normalize_or_zero();
    if direction == Vector::ZERO {
        direction = outward.any_orthonormal_vector();
    }
    let speed = ctx.max_speed();
    ctx.set_course(here + direction * 2_000.0 * (7.0 - fuel), 0.0, speed);
}

fn waypoint_destination(ctx: &mut AiContext<'_>) {
    let Some(waypoint) = ctx.params().vector(keys::WAYPOINT) else {
        return;
    };
    let range = ctx.params().number(keys::WAYPOINT_RANGE).unwrap_or(1_000.0);
    let speed = ctx.cruise_speed();
    ctx.set_course(waypoint, range, speed);
}

// ----------------------------------------------------------------------
// Groups and ship state
// ----------------------------------------------------------------------

fn appoint_group_leader(ctx: &mut AiContext<'_>) {
    let Some(group) = ctx.me().and_then(|s| s.group) else {
        return;
    };
    let role = ctx.params().text(keys::LEADER_ROLE).map(str::to_owned);
    crate::group::appoint_leader(ctx.host_mut(), group, role.as_deref());
}

/// Offers to escort the group leader under the escort role, reverting the
/// role if the offer is refused.
fn escort_group_leader(ctx: &mut AiContext<'_>) {
    let me = ctx.ship_id();
    let Some(leader) = ctx.leader().filter(|&l| l != me) else {
        return;
    };
    let already = ctx
        .ship(leader)
        .and_then(|l| l.escort_group)
        .and_then(|g| ctx.host().group(g))
        .is_some_and(|g| g.contains(me));
    if already {
        return;
    }
    let Some(escort_role) = ctx.params().text(keys::ESCORT_ROLE).map(str::to_owned) else {
        return;
    };
    let Some(old_role) = ctx
        .me_mut()
        .map(|s| std::mem::replace(&mut s.primary_role, escort_role))
    else {
        return;
    };
    if ctx.host_mut().offer_to_escort(me, leader) {
        debug!(target: "priority_ai::catalog", ship = %me, %leader, "escorting group leader");
        ctx.params_mut().set(keys::OLD_ROLE, old_role);
    } else if let Some(s) = ctx.me_mut() {
        s.primary_role = old_role;
    }
}

/// Clears a pirate crew's met demand so a new one can be made.
fn forget_cargo_demand(ctx: &mut AiContext<'_>) {
    let group = ctx
        .leader()
        .and_then(|l| ctx.ship(l))
        .and_then(|l| l.group)
        .or_else(|| ctx.me().and_then(|s| s.group));
    if let Some(board) = group
        .and_then(|g| ctx.host_mut().group_mut(g))
        .map(|g| &mut g.blackboard)
        && board.cargo_demand_met
    {
        board.forget_cargo_demand();
    }
    ctx.params_mut().remove(keys::CARGO_DROPPED);
}

fn set_lights(ctx: &mut AiContext<'_>, on: bool) {
    if let Some(me) = ctx.me_mut() {
        me.lights = on;
    }
}

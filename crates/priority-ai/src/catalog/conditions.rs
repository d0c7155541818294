//! Predicates over the acting ship and what it can see.
//!
//! Conditions may write engine parameters (scanner searches store their
//! match, stale distress calls are forgotten) but never issue commands.

use priority_tree::Condition;
use tracing::warn;

use super::{distance_to_body, live_entity, selected_planet};
use crate::cache::CacheKey;
use crate::comms::CommsPriority;
use crate::context::{AiContext, Subject};
use crate::host::{EntityId, Equipment, GroupId, ScanClass, ShipStatus};
use crate::params::keys;
use crate::rules::RuleId;
use crate::threat::categories;

/// Radius inside which a hostile station discourages a fight.
const HOSTILE_STATION_RANGE: f64 = 51_200.0;
/// Missiles closer than this to a sibling count as one salvo.
const SALVO_RANGE: f64 = 500.0;
/// A mothership with more thargons than this has no room for another.
const MOTHERSHIP_MAX_THARGONS: usize = 16;

pub(crate) const THARGON_ROLE: &str = "EQ_THARGON";
const THARGOID_MOTHERSHIP_ROLE: &str = "thargoid-mothership";

/// A named predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    // Combat
    CascadeDetected,
    CombatOddsTerrible,
    CombatOddsBad,
    CombatOddsGood,
    CombatOddsExcellent,
    GroupAttritionReached,
    GroupSuppliesLow,
    InCombat,
    InCombatWithHostiles,
    LosingCombat,
    MothershipInCombat,
    MothershipIsAttacking,
    MothershipIsAttackingHostileTarget,
    MothershipUnderAttack,
    SuppliesLow,

    // Navigation
    CanWitchspaceOnRoute,
    CanWitchspaceOut,
    FriendlyStationExists,
    FriendlyStationNearby,
    GroupIsSeparated,
    HasSelectedPlanet,
    HasSelectedStation,
    HomeStationExists,
    HomeStationNearby,
    HostileStationNearby,
    InInterstellarSpace,
    MainPlanetNearby,
    NearDestination,
    PlanetExists,
    PlayerNearby,
    ReadyToSunskim,
    SelectedStationNearby,
    SelectedStationNearMainPlanet,
    StationNearby,
    SunskimPossible,
    WormholeNearby,

    // Pirates and their victims
    CargoDemandsMet,
    GroupHasEnoughLoot,
    PiratesCanBePaidOff,

    // Scanner searches. A match is stored under `ai_scan_result_specific`.
    ScannerContainsAssassinationTarget,
    ScannerContainsCleanShip,
    ScannerContainsCourier,
    ScannerContainsEscapePods,
    ScannerContainsFineableOffender,
    ScannerContainsFugitive,
    ScannerContainsHuntableOffender,
    ScannerContainsHunters,
    ScannerContainsLoneVictim,
    ScannerContainsMiningOpportunity,
    ScannerContainsNonThargoid,
    ScannerContainsPirateLeader,
    ScannerContainsPirateVictims,
    ScannerContainsReadyThargoidMothership,
    ScannerContainsRocks,
    ScannerContainsSalvage,
    ScannerContainsSalvageForGroup,
    ScannerContainsSalvageForMe,
    ScannerContainsSeriousOffender,
    ScannerContainsShipAttackingPirate,
    ScannerContainsShipNeedingEscort,
    ScannerContainsSuspiciousShip,
    ScannerContainsThargoidMothership,
    ScannerContainsUnspreadMissile,

    // State
    AllEscortsInFlight,
    CanScoopCargo,
    CargoIsProfitableHere,
    CoinFlip,
    GroupLeaderIsStation,
    HasInterceptCoordinates,
    HasMothership,
    HasNonThargoidTarget,
    HasReceivedDistressCall,
    HasRememberedTarget,
    HasTarget,
    HasWaypoint,
    IsActiveThargon,
    IsEscorting,
    IsGroupLeader,
    MissileOutOfFuel,
    PatrolIsOver,
    WitchspaceEntryRequested,

    Custom(RuleId),
}

impl<'a> Condition<AiContext<'a>> for Cond {
    fn check(&self, ctx: &mut AiContext<'a>) -> bool {
        self.holds(ctx)
    }
}

impl Cond {
    pub fn holds(self, ctx: &mut AiContext<'_>) -> bool {
        match self {
            Cond::CascadeDetected => cascade_detected(ctx),
            Cond::CombatOddsTerrible => ctx.combat_odds_terrible(),
            Cond::CombatOddsBad => ctx.combat_odds_bad(),
            Cond::CombatOddsGood => ctx.combat_odds_good(),
            Cond::CombatOddsExcellent => ctx.combat_odds_excellent(),
            Cond::GroupAttritionReached => group_attrition_reached(ctx),
            Cond::GroupSuppliesLow => group_supplies_low(ctx),
            Cond::InCombat => ctx.in_combat(),
            Cond::InCombatWithHostiles => in_combat_with_hostiles(ctx),
            Cond::LosingCombat => losing_combat(ctx),
            Cond::MothershipInCombat => mothership_in_combat(ctx),
            Cond::MothershipIsAttacking => mothership_is_attacking(ctx, false),
            Cond::MothershipIsAttackingHostileTarget => mothership_is_attacking(ctx, true),
            Cond::MothershipUnderAttack => mothership_under_attack(ctx),
            Cond::SuppliesLow => supplies_low(ctx),

            Cond::CanWitchspaceOnRoute => can_witchspace_on_route(ctx),
            Cond::CanWitchspaceOut => ctx.me().is_some_and(|s| {
                s.has_hyperspace_motor() && !ctx.host().systems_in_range(s.fuel).is_empty()
            }),
            Cond::FriendlyStationExists => friendly_station_exists(ctx),
            Cond::FriendlyStationNearby => match ctx.nearest_station() {
                Some(station) => {
                    ctx.friendly_station(station) && ctx.distance_to(station) < ctx.scanner_range()
                }
                None => false,
            },
            Cond::GroupIsSeparated => match ctx.leader() {
                Some(leader) => {
                    let factor = if ctx.ship(leader).is_some_and(|l| l.is_station) {
                        2.0
                    } else {
                        1.0
                    };
                    ctx.distance_to(leader) > ctx.scanner_range() * factor
                }
                None => false,
            },
            Cond::HasSelectedPlanet => {
                let found = selected_planet(ctx).is_some();
                if !found {
                    ctx.params_mut().remove(keys::SELECTED_PLANET);
                }
                found
            }
            Cond::HasSelectedStation => has_selected_station(ctx),
            Cond::HomeStationExists => ctx.home_station().is_some(),
            Cond::HomeStationNearby => match ctx.home_station() {
                Some(home) => ctx.distance_to(home) < ctx.scanner_range(),
                None => false,
            },
            Cond::HostileStationNearby => hostile_station_nearby(ctx),
            Cond::InInterstellarSpace => ctx.host().system().interstellar,
            Cond::MainPlanetNearby => ctx
                .host()
                .system()
                .main_planet
                .is_some_and(|p| distance_to_body(ctx, &p) < p.radius * 4.0),
            Cond::NearDestination => ctx
                .me()
                .is_some_and(|s| s.position.distance(s.destination) < s.desired_range),
            Cond::PlanetExists => ctx.host().system().main_planet.is_some(),
            Cond::PlayerNearby => ctx
                .host()
                .player()
                .is_some_and(|p| ctx.distance_to(p) < ctx.scanner_range()),
            Cond::ReadyToSunskim => ctx
                .host()
                .system()
                .sun
                .is_some_and(|sun| distance_to_body(ctx, &sun) < sun.radius * 1.15),
            Cond::SelectedStationNearby => live_entity(ctx, keys::SELECTED_STATION)
                .is_some_and(|s| ctx.distance_to(s) < ctx.scanner_range()),
            Cond::SelectedStationNearMainPlanet => {
                let Some(planet) = ctx.host().system().main_planet else {
                    return false;
                };
                live_entity(ctx, keys::SELECTED_STATION)
                    .and_then(|s| ctx.ship(s))
                    .is_some_and(|s| s.position.distance(planet.position) < planet.radius * 4.0)
            }
            Cond::StationNearby => match ctx.nearest_station() {
                Some(station) => ctx.distance_to(station) < ctx.scanner_range() * 2.0,
                None => false,
            },
            Cond::SunskimPossible => sunskim_possible(ctx),
            Cond::WormholeNearby => {
                let now = ctx.now();
                let range = ctx.scanner_range();
                ctx.host()
                    .wormholes()
                    .iter()
                    .any(|w| w.expiry > now && ctx.distance_to_point(w.position) < range)
            }

            Cond::CargoDemandsMet => cargo_demands_met(ctx),
            Cond::GroupHasEnoughLoot => group_has_enough_loot(ctx),
            Cond::PiratesCanBePaidOff => ctx.me().is_some_and(|s| {
                !s.paid_pirates && s.pirate_demand.is_some_and(|d| s.cargo_used() >= d)
            }),

            Cond::ScannerContainsAssassinationTarget => ctx.check_scanner_with(|ctx, id| {
                ctx.ship(id).is_some_and(|s| s.primary_role == "escape-capsule")
            }),
            Cond::ScannerContainsCleanShip => ctx.check_scanner_with(|ctx, id| {
                ctx.ship(id).is_some_and(|s| {
                    matches!(s.scan_class, ScanClass::Neutral | ScanClass::Police) && s.bounty == 0
                })
            }),
            Cond::ScannerContainsCourier => ctx.check_scanner_with(|ctx, id| {
                ctx.host().in_role_category(id, categories::COURIER)
            }),
            Cond::ScannerContainsEscapePods => {
                if !can_scoop_cargo(ctx) {
                    return false;
                }
                let max = ctx.max_speed();
                ctx.check_scanner_with(|ctx, id| {
                    ctx.ship(id).is_some_and(|s| {
                        s.primary_role == "escape-capsule"
                            && s.is_in_space()
                            && s.scan_class == ScanClass::Cargo
                            && s.velocity.length() < max
                    })
                })
            }
            Cond::ScannerContainsFineableOffender => {
                let threshold = ctx.fine_threshold();
                ctx.check_scanner_with(|ctx, id| {
                    ctx.ship(id).is_some_and(|s| {
                        s.is_in_space()
                            && s.bounty > 0
                            && f64::from(s.bounty) <= threshold
                            && !s.marked_for_fines
                            && (s.scan_class == ScanClass::Neutral || s.is_player)
                            && !s.is_derelict
                    })
                })
            }
            Cond::ScannerContainsFugitive => scan_for_bounty(ctx, 50.0),
            Cond::ScannerContainsHuntableOffender => {
                let threshold = ctx.fine_threshold() / 2.0;
                scan_for_bounty(ctx, threshold)
            }
            Cond::ScannerContainsSeriousOffender => {
                let threshold = ctx.fine_threshold();
                scan_for_bounty(ctx, threshold)
            }
            Cond::ScannerContainsHunters => ctx.check_scanner_with(|ctx, id| {
                ctx.host().in_role_category(id, categories::BOUNTY_HUNTER)
                    || ctx.ship(id).is_some_and(|s| {
                        s.scan_class == ScanClass::Police || (s.is_station && s.is_main_station)
                    })
            }),
            Cond::ScannerContainsLoneVictim => lone_victim(ctx),
            Cond::ScannerContainsMiningOpportunity => {
                can_scoop_cargo(ctx)
                    && ctx.me().is_some_and(|s| s.has(Equipment::MINING_LASER))
                    && scan_for_rocks(ctx)
            }
            Cond::ScannerContainsNonThargoid => {
                let priority = ctx.check_scanner_with(|ctx, id| {
                    ctx.ship(id).is_some_and(|s| {
                        !matches!(
                            s.scan_class,
                            ScanClass::Thargoid | ScanClass::Rock | ScanClass::Cargo
                        )
                    })
                });
                priority
                    || ctx.check_scanner_with(|ctx, id| {
                        ctx.ship(id).is_some_and(|s| s.scan_class != ScanClass::Thargoid)
                    })
            }
            Cond::ScannerContainsPirateLeader => ctx.check_scanner_with(|ctx, id| {
                let leads = ctx
                    .ship(id)
                    .and_then(|s| s.group)
                    .and_then(|g| ctx.host().group(g))
                    .is_some_and(|g| g.leader == Some(id));
                leads && ctx.host().in_role_category(id, categories::PIRATE_LEADER)
            }),
            Cond::ScannerContainsPirateVictims => {
                let last = ctx.params().entity(keys::LAST_PIRATE_VICTIM);
                ctx.check_scanner_with(|ctx, id| {
                    Some(id) != last
                        && ctx.host().in_role_category(id, categories::PIRATE_VICTIM)
                        && ctx
                            .ship(id)
                            .is_some_and(|s| s.cargo_capacity > 0 && !s.paid_pirates)
                })
            }
            Cond::ScannerContainsReadyThargoidMothership => ctx.check_scanner_with(|ctx, id| {
                let Some(ship) = ctx.ship(id) else {
                    return false;
                };
                let escorts = ship
                    .escort_group
                    .and_then(|g| ctx.host().group(g))
                    .map_or(0, |g| g.count());
                ship.primary_role == THARGOID_MOTHERSHIP_ROLE && escorts <= MOTHERSHIP_MAX_THARGONS
            }),
            Cond::ScannerContainsRocks => scan_for_rocks(ctx),
            Cond::ScannerContainsSalvage => scan_for_salvage(ctx, f64::INFINITY),
            Cond::ScannerContainsSalvageForGroup => {
                let speed = group_scooping_speed(ctx);
                scan_for_salvage(ctx, speed)
            }
            Cond::ScannerContainsSalvageForMe => {
                if !can_scoop_cargo(ctx) {
                    return false;
                }
                let speed = ctx.max_speed();
                scan_for_salvage(ctx, speed)
            }
            Cond::ScannerContainsShipAttackingPirate => ctx.check_scanner_with(|ctx, id| {
                ctx.ship(id).is_some_and(|s| {
                    s.has_hostile_target
                        && s.target
                            .and_then(|t| ctx.ship(t))
                            .is_some_and(|t| t.is_pirate)
                })
            }),
            Cond::ScannerContainsShipNeedingEscort => ship_needing_escort(ctx),
            Cond::ScannerContainsSuspiciousShip => ctx.check_scanner_with(|ctx, id| {
                ctx.host().in_role_category(id, categories::POLICE_DISLIKE)
            }),
            Cond::ScannerContainsThargoidMothership => ctx.check_scanner_with(|ctx, id| {
                ctx.ship(id)
                    .is_some_and(|s| s.primary_role == THARGOID_MOTHERSHIP_ROLE)
            }),
            Cond::ScannerContainsUnspreadMissile => unspread_missile(ctx),

            Cond::AllEscortsInFlight => all_escorts_in_flight(ctx),
            Cond::CanScoopCargo => can_scoop_cargo(ctx),
            Cond::CargoIsProfitableHere => cargo_is_profitable_here(ctx),
            Cond::CoinFlip => ctx.chance(0.5),
            Cond::GroupLeaderIsStation => ctx
                .leader()
                .and_then(|l| ctx.ship(l))
                .is_some_and(|l| l.is_station),
            Cond::HasInterceptCoordinates => {
                ctx.params().vector(keys::INTERCEPT_COORDINATES).is_some()
            }
            Cond::HasMothership => ctx.leader().is_some_and(|l| l != ctx.ship_id()),
            Cond::HasNonThargoidTarget => ctx
                .target()
                .and_then(|t| ctx.ship(t))
                .is_some_and(|t| t.scan_class != ScanClass::Thargoid),
            Cond::HasReceivedDistressCall => has_received_distress_call(ctx),
            Cond::HasRememberedTarget => {
                let remembered = live_entity(ctx, keys::REMEMBERED_TARGET)
                    .filter(|&t| ctx.distance_to(t) < ctx.scanner_range());
                if remembered.is_none() {
                    ctx.params_mut().remove(keys::REMEMBERED_TARGET);
                }
                remembered.is_some()
            }
            Cond::HasTarget => ctx.target().is_some(),
            Cond::HasWaypoint => ctx.params().vector(keys::WAYPOINT).is_some(),
            Cond::IsActiveThargon => ctx.me().is_some_and(|s| {
                s.scan_class == ScanClass::Thargoid && s.primary_role == THARGON_ROLE
            }),
            Cond::IsEscorting => is_escorting(ctx),
            Cond::IsGroupLeader => ctx
                .group()
                .is_some_and(|g| g.leader == Some(ctx.ship_id())),
            Cond::MissileOutOfFuel => ctx.me().is_some_and(|s| {
                let range = s
                    .missile
                    .and_then(|m| m.range)
                    .unwrap_or(ctx.config().missile_default_range);
                range < s.distance_travelled
            }),
            Cond::PatrolIsOver => {
                ctx.me()
                    .is_some_and(|s| s.distance_travelled > ctx.config().patrol_distance)
                    || supplies_low(ctx)
            }
            Cond::WitchspaceEntryRequested => {
                ctx.params().number(keys::WITCHSPACE_ENTRY).is_some()
            }

            Cond::Custom(id) => match ctx.session().rules().condition(id) {
                Some(f) => f(ctx),
                None => {
                    warn!(target: "priority_ai::catalog", rule = %id, "custom condition not registered");
                    false
                }
            },
        }
    }
}

/// A cascade weapon went off within scanner range. Forgets ones that are
/// now out of range.
pub(crate) fn cascade_detected(ctx: &mut AiContext<'_>) -> bool {
    let Some(cascade) = ctx.params().vector(keys::CASCADE_DETECTED) else {
        return false;
    };
    if ctx.distance_to_point(cascade) < ctx.scanner_range() {
        return true;
    }
    ctx.params_mut().remove(keys::CASCADE_DETECTED);
    false
}

fn group_attrition_reached(ctx: &mut AiContext<'_>) -> bool {
    let Some(group) = ctx.me().and_then(|s| s.group) else {
        return false;
    };
    let members = ctx.group_members().len();
    ctx.host_mut().group_mut(group).is_some_and(|g| {
        g.blackboard.record_power(members);
        g.blackboard.attrition_reached(members)
    })
}

fn group_supplies_low(ctx: &mut AiContext<'_>) -> bool {
    let members = ctx.group_members();
    if ctx.me().and_then(|s| s.group).is_none() || members.is_empty() {
        return ctx.me().is_some_and(|s| s.damage > 0);
    }
    let damage: u32 = members
        .iter()
        .filter_map(|&id| ctx.ship(id))
        .map(|s| s.damage)
        .sum();
    f64::from(damage) > members.len() as f64 / 2.0
}

fn supplies_low(ctx: &mut AiContext<'_>) -> bool {
    ctx.long_term(CacheKey::SuppliesLow, |ctx| {
        ctx.me().is_some_and(|s| s.damage > 0)
    })
}

/// Fighting something that fights back, alone or through the group.
/// Defense targets that are harmless or out of range are dropped.
fn in_combat_with_hostiles(ctx: &mut AiContext<'_>) -> bool {
    ctx.short_term(CacheKey::InCombatWithHostiles, |ctx| {
        let me = ctx.ship_id();
        if ctx.is_fighting(me) && ctx.target().is_some_and(|t| ctx.is_aggressive(t)) {
            return true;
        }
        let range = ctx.scanner_range();
        let mut hostile = false;
        for id in ctx.me().map(|s| s.defense_targets.clone()).unwrap_or_default() {
            if ctx.is_aggressive(id) && ctx.distance_to(id) < range {
                hostile = true;
                break;
            }
            ctx.remove_defense_target(id);
        }
        if hostile {
            return true;
        }
        let fighting_hostile = |ctx: &AiContext<'_>, id: EntityId| {
            ctx.is_fighting(id)
                && ctx
                    .ship(id)
                    .and_then(|s| s.target)
                    .is_some_and(|t| ctx.is_aggressive(t))
        };
        let mut allies = ctx.group_members();
        allies.extend(ctx.escort_members());
        if allies.into_iter().any(|id| fighting_hostile(&*ctx, id)) {
            return true;
        }
        if let Some(me) = ctx.me_mut() {
            me.paid_pirates = false;
        }
        false
    })
}

fn losing_combat(ctx: &mut AiContext<'_>) -> bool {
    if cascade_detected(ctx) {
        return true;
    }
    if !ctx.in_combat() {
        ctx.params_mut().remove(keys::LAST_FLEEING);
        return false;
    }
    let Some((energy, max_energy, fuel, injectors, fleeing)) = ctx.me().map(|s| {
        (
            s.energy,
            s.max_energy,
            s.fuel,
            s.has(Equipment::FUEL_INJECTION),
            s.is_fleeing,
        )
    }) else {
        return false;
    };
    if energy >= max_energy && !ctx.combat_odds_terrible() {
        // Full shields: forget earlier defeats.
        ctx.params_mut().remove(keys::LAST_FLEEING);
    }
    if ctx.params().flag(keys::FLEES_PREEMPTIVELY) && fuel > 0.0 && injectors {
        return true;
    }
    if let Some(threat) = ctx.params().entity(keys::LAST_FLEEING)
        && ctx.distance_to(threat) < ctx.scanner_range()
    {
        return true;
    }
    if energy * 4.0 < max_energy {
        return true;
    }

    let me = ctx.ship_id();
    let range = ctx.scanner_range();
    for id in ctx.defense_targets().into_iter().rev() {
        let Some((class, target)) = ctx.ship(id).map(|s| (s.scan_class, s.target)) else {
            continue;
        };
        if class == ScanClass::Missile && target == Some(me) {
            ctx.set_target(Some(id));
            return true;
        }
        if class == ScanClass::Mine && ctx.distance_to(id) < range {
            return true;
        }
    }

    // Paid off pirates, or our leader did.
    if ctx.me().is_some_and(|s| s.paid_pirates) {
        return true;
    }
    if ctx
        .leader()
        .and_then(|l| ctx.ship(l))
        .is_some_and(|l| l.paid_pirates)
    {
        return true;
    }

    if energy * 2.0 < max_energy && ctx.combat_odds_bad() {
        return true;
    }
    if ctx.combat_odds_terrible() {
        if !fleeing {
            let priority = if ctx.leader() == Some(me) {
                CommsPriority::NotAfterSending
            } else {
                CommsPriority::Quiet
            };
            ctx.communicate("groupIsOutnumbered", Subject::None, priority);
        }
        return true;
    }
    if !ctx.params().flag(keys::FIGHTS_NEAR_HOSTILE_STATIONS) && hostile_station_nearby(ctx) {
        return true;
    }
    false
}

/// The live leader, if it is not this ship.
fn mothership(ctx: &AiContext<'_>) -> Option<EntityId> {
    ctx.leader().filter(|&l| l != ctx.ship_id())
}

fn mothership_in_combat(ctx: &mut AiContext<'_>) -> bool {
    let Some(leader) = mothership(ctx) else {
        return false;
    };
    if ctx.distance_to(leader) > ctx.scanner_range() {
        return false;
    }
    if ctx.is_fighting(leader) {
        return true;
    }
    let Some(ship) = ctx.ship(leader) else {
        return false;
    };
    let attacks_leader = |id| {
        ctx.ship(id)
            .is_some_and(|s| s.target == Some(leader) && s.has_hostile_target)
    };
    ship.target.is_some_and(&attacks_leader)
        || ship.defense_targets.iter().any(|&d| attacks_leader(d))
}

fn mothership_is_attacking(ctx: &mut AiContext<'_>, hostile_only: bool) -> bool {
    let Some(leader) = mothership(ctx) else {
        return false;
    };
    let Some(target) = ctx.ship(leader).and_then(|l| l.target) else {
        return false;
    };
    ctx.ship(target).is_some()
        && ctx.is_fighting(leader)
        && ctx.distance_to(target) < ctx.scanner_range()
        && (!hostile_only || ctx.is_aggressive(target))
}

fn mothership_under_attack(ctx: &mut AiContext<'_>) -> bool {
    let Some(leader) = mothership(ctx) else {
        return false;
    };
    let Some(ship) = ctx.ship(leader) else {
        return false;
    };
    let range = ctx.scanner_range();
    let attacks_leader = |id| {
        ctx.ship(id)
            .is_some_and(|s| s.target == Some(leader) && s.has_hostile_target)
            && ctx.distance_to(id) < range
    };
    ship.target.is_some_and(&attacks_leader)
        || ship.defense_targets.iter().any(|&d| attacks_leader(d))
}

fn can_witchspace_on_route(ctx: &mut AiContext<'_>) -> bool {
    let Some(me) = ctx.me() else {
        return false;
    };
    if !me.has_hyperspace_motor() {
        return false;
    }
    let fuel = me.fuel;
    match ctx.params().integer(keys::WITCHSPACE_DESTINATION) {
        Some(dest) if dest >= 0 => {
            let Ok(dest) = u32::try_from(dest) else {
                return false;
            };
            ctx.host().distance_to_system(dest) <= fuel
        }
        _ => false,
    }
}

fn friendly_station_exists(ctx: &mut AiContext<'_>) -> bool {
    ctx.short_term(CacheKey::FriendlyStationExists, |ctx| {
        let stations = ctx.host().stations();
        stations.into_iter().any(|s| ctx.friendly_station(s))
    })
}

fn has_selected_station(ctx: &mut AiContext<'_>) -> bool {
    let Some(id) = ctx.params().entity(keys::SELECTED_STATION) else {
        return false;
    };
    let valid = ctx
        .ship(id)
        .filter(|s| s.is_station)
        .map(|s| s.is_in_space());
    match valid {
        Some(in_space) => in_space,
        None => {
            ctx.params_mut().remove(keys::SELECTED_STATION);
            false
        }
    }
}

fn hostile_station_nearby(ctx: &mut AiContext<'_>) -> bool {
    let stations = ctx.host().stations();
    stations
        .into_iter()
        .any(|s| ctx.distance_to(s) < HOSTILE_STATION_RANGE && ctx.hostile_station(s))
}

fn sunskim_possible(ctx: &mut AiContext<'_>) -> bool {
    let system = ctx.host().system();
    if system.sun.is_none() || system.sun_unstable {
        return false;
    }
    ctx.me().is_some_and(|s| {
        s.fuel < 7.0
            && s.has(Equipment::FUEL_SCOOPS)
            && s.max_speed > 0.0
            && (s.heat_insulation > 1_000.0 / s.max_speed || s.heat_insulation >= 12.0)
    })
}

/// The group whose blackboard a pirate crew shares: the leader's.
fn crew_group(ctx: &AiContext<'_>) -> Option<GroupId> {
    ctx.leader()
        .and_then(|l| ctx.ship(l))
        .and_then(|l| l.group)
        .or_else(|| ctx.me().and_then(|s| s.group))
}

fn cargo_demands_met(ctx: &mut AiContext<'_>) -> bool {
    if !ctx.params().flag(keys::WATCH_FOR_CARGO) {
        return false;
    }
    let Some(group) = crew_group(ctx) else {
        return false;
    };
    let seen = ctx.params().integer(keys::CARGO_DROPPED).unwrap_or(0);
    let Some(board) = ctx.host_mut().group_mut(group).map(|g| &mut g.blackboard) else {
        return false;
    };
    if board.cargo_demand_met {
        return true;
    }
    match board.cargo_demand {
        Some(demand) if seen >= i64::from(demand) => {
            board.mark_demand_met();
            true
        }
        _ => false,
    }
}

/// Whether the crew has filled enough of its holds to head home.
fn group_has_enough_loot(ctx: &mut AiContext<'_>) -> bool {
    let mut members = ctx.group_members();
    if members.is_empty() {
        members.push(ctx.ship_id());
    }
    let (used, available) = members
        .iter()
        .filter_map(|&id| ctx.ship(id))
        .fold((0u32, 0u32), |(u, a), s| (u + s.cargo_used(), a + s.cargo_available));
    if available == 0 {
        return true;
    }
    let mut threshold = 0.33;
    if group_attrition_reached(ctx) {
        threshold += 0.25;
    }
    if group_supplies_low(ctx) {
        threshold += 0.25;
    }
    f64::from(available) < f64::from(available + used) * threshold
}

fn scan_for_bounty(ctx: &mut AiContext<'_>, threshold: f64) -> bool {
    ctx.check_scanner_with(|ctx, id| {
        ctx.ship(id).is_some_and(|s| {
            s.is_in_space()
                && f64::from(s.bounty) > threshold
                && !matches!(s.scan_class, ScanClass::Cargo | ScanClass::Rock | ScanClass::Buoy)
        })
    })
}

/// Boulders first, then whole asteroids.
fn scan_for_rocks(ctx: &mut AiContext<'_>) -> bool {
    let boulder = ctx.check_scanner_with(|ctx, id| {
        ctx.ship(id).is_some_and(|s| {
            s.is_in_space() && s.scan_class == ScanClass::Rock && s.primary_role == "boulder"
        })
    });
    boulder
        || ctx.check_scanner_with(|ctx, id| {
            ctx.ship(id)
                .is_some_and(|s| s.is_in_space() && s.primary_role == "asteroid")
        })
}

/// Another missile from the same owner, chasing the same target, close by
/// and ahead of this one. Only ships flagged to spread salvos look.
fn unspread_missile(ctx: &mut AiContext<'_>) -> bool {
    if !ctx.params().flag(keys::AUTO_SPREAD_MISSILES) {
        return false;
    }
    let Some(target) = ctx.target() else {
        return false;
    };
    let Some(target_position) = ctx.ship(target).map(|t| t.position) else {
        return false;
    };
    let owner = ctx.me().and_then(|s| s.owner);
    let my_distance = ctx.distance_to_point(target_position);
    ctx.check_scanner_with(|ctx, id| {
        let close = ctx.distance_to(id) < SALVO_RANGE;
        ctx.ship(id).is_some_and(|s| {
            s.scan_class == ScanClass::Missile
                && s.target == Some(target)
                && s.owner == owner
                && close
                && my_distance > s.position.distance(target_position)
        })
    })
}

/// Cargo pods drifting slower than `max_speed`.
fn scan_for_salvage(ctx: &mut AiContext<'_>, max_speed: f64) -> bool {
    ctx.check_scanner_with(|ctx, id| {
        ctx.ship(id).is_some_and(|s| {
            s.is_in_space()
                && s.scan_class == ScanClass::Cargo
                && s.commodity.is_some()
                && s.velocity.length() < max_speed
        })
    })
}

/// Fastest speed at which someone in the group can still scoop.
fn group_scooping_speed(ctx: &mut AiContext<'_>) -> f64 {
    let mut speed = if can_scoop_cargo(ctx) { ctx.max_speed() } else { 0.0 };
    for id in ctx.group_members() {
        if let Some(s) = ctx.ship(id)
            && s.cargo_available > 0
            && s.has(Equipment::FUEL_SCOOPS)
        {
            speed = speed.max(s.max_speed);
        }
    }
    speed
}

pub(crate) fn can_scoop_cargo(ctx: &AiContext<'_>) -> bool {
    ctx.me()
        .is_some_and(|s| s.cargo_available > 0 && s.has(Equipment::FUEL_SCOOPS))
}

/// Exactly one unallied pirate victim on the scanner.
fn lone_victim(ctx: &mut AiContext<'_>) -> bool {
    let Some(scan) = ctx.params().entities(keys::SCAN_RESULTS).map(<[_]>::to_vec) else {
        return false;
    };
    let me = ctx.ship_id();
    let victims: Vec<_> = scan
        .into_iter()
        .filter(|&id| {
            !ctx.allied(me, id)
                && ctx.host().in_role_category(id, categories::PIRATE_VICTIM)
                && ctx.ship(id).is_some_and(|s| s.cargo_capacity > 0)
        })
        .collect();
    match victims.as_slice() {
        [victim] => {
            ctx.params_mut().set(keys::SCAN_RESULT_SPECIFIC, *victim);
            true
        }
        _ => false,
    }
}

/// A ship of our kind and legal standing with room for another escort.
fn ship_needing_escort(ctx: &mut AiContext<'_>) -> bool {
    let Some((class, clean)) = ctx.me().map(|s| (s.scan_class, s.bounty == 0)) else {
        return false;
    };
    ctx.check_scanner_with(|ctx, id| {
        ctx.ship(id).is_some_and(|s| {
            let room = s
                .escort_group
                .and_then(|g| ctx.host().group(g))
                .is_none_or(|g| g.count() as u32 <= s.max_escorts);
            s.scan_class == class && (s.bounty == 0) == clean && room
        })
    })
}

fn all_escorts_in_flight(ctx: &AiContext<'_>) -> bool {
    let in_flight = |g: GroupId| {
        ctx.host().group(g).is_none_or(|group| {
            group.ships.iter().all(|&id| {
                ctx.ship(id)
                    .is_none_or(|s| s.status == ShipStatus::InFlight)
            })
        })
    };
    let Some(me) = ctx.me() else {
        return true;
    };
    me.escort_group.is_none_or(&in_flight) && me.group.is_none_or(&in_flight)
}

/// Whether to sell here. Ships on a route only sell at their destination.
fn cargo_is_profitable_here(ctx: &AiContext<'_>) -> bool {
    let Some(me) = ctx.me() else {
        return false;
    };
    let here = ctx.host().system().id;
    if me.home_system != me.destination_system {
        if me.destination_system == here {
            return true;
        }
        if me.home_system == here {
            return false;
        }
    }
    ctx.host().system().main_station.is_some() && me.cargo_used() > 0
}

fn has_received_distress_call(ctx: &mut AiContext<'_>) -> bool {
    let aggressor = live_entity(ctx, keys::DISTRESS_AGGRESSOR);
    let sender = live_entity(ctx, keys::DISTRESS_SENDER);
    let stamp = ctx.params().number(keys::DISTRESS_TIMESTAMP);
    let fresh = match (aggressor, sender, stamp) {
        (Some(_), Some(sender), Some(stamp)) => {
            ctx.distance_to(sender) <= ctx.scanner_range()
                && stamp + ctx.config().distress_timeout >= ctx.now()
        }
        _ => false,
    };
    if !fresh {
        let params = ctx.params_mut();
        params.remove(keys::DISTRESS_AGGRESSOR);
        params.remove(keys::DISTRESS_SENDER);
        params.remove(keys::DISTRESS_TIMESTAMP);
    }
    fresh
}

/// Flying in the leader's escort formation. An escort whose leader jumped
/// without leaving a usable wormhole leaves the group.
fn is_escorting(ctx: &mut AiContext<'_>) -> bool {
    let me = ctx.ship_id();
    let Some(leader) = mothership(ctx) else {
        return false;
    };
    let Some((status, escorts)) = ctx.ship(leader).map(|l| (l.status, l.escort_group)) else {
        return false;
    };
    let in_formation = escorts
        .and_then(|g| ctx.host().group(g))
        .is_some_and(|g| g.contains(me));
    if !in_formation {
        return false;
    }
    if status == ShipStatus::EnteringWitchspace {
        let now = ctx.now();
        let hole = ctx.params().entity(keys::WITCHSPACE_WORMHOLE);
        let usable = hole.is_some_and(|id| {
            ctx.host()
                .wormholes()
                .iter()
                .any(|w| w.id == id && w.expiry >= now)
        });
        if !usable {
            ctx.leave_group();
            ctx.params_mut().remove(keys::WITCHSPACE_WORMHOLE);
            return false;
        }
    }
    true
}

//! Reactions to game events.
//!
//! A [`Response`] is the value bound to an [`EventKind`] in a handler table.
//! Responses are plain `Copy` values, so comparing two bindings is an
//! equality test and rebinding allocates nothing.
//!
//! Behaviours assemble their tables from the sets below: the standard set,
//! then docking, escort or scooping additions. Missiles and stations have
//! tables of their own.

use tracing::debug;

use crate::catalog::red_alert;
use crate::comms::{CommsParams, CommsPriority};
use crate::context::AiContext;
use crate::events::{EventKind, GameEvent};
use crate::handlers::HandlerSet;
use crate::host::{
    AlertCondition, DockingMessage, EntityId, Equipment, ScanClass, ScheduledAction, ShipCommand,
    ShipEffect,
};
use crate::params::keys;
use crate::rules::RuleId;
use crate::threat::categories;

/// Distance within which a wormhole is taken to be the one a ship used.
const WORMHOLE_MATCH_RANGE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Response {
    /// Mandatory `aiAwoken` binding; runs a reconsideration.
    Reconsider,
    /// Mandatory `shipDied` binding; tears the controller down.
    Teardown,

    ApproachingPlanetSurface,
    CargoDumpedNearby,
    CascadeWeaponDetected,
    CommsMessageReceived,
    DistressMessageReceived,
    EscortAccepted,
    HelpRequestReceived,
    OffenceCommittedNearby,
    PlayerWillEnterWitchspace,
    /// Follows the player through witchspace even without a known wormhole.
    TrackPlayerWillEnterWitchspace,
    ShipAcceptedEscort,
    ShipAchievedDesiredRange,
    ShipAttackedOther,
    ShipAttackedWithMissile,
    ShipAttackerDistracted,
    ShipBeingAttacked,
    ShipBeingAttackedUnsuccessfully,
    ShipFiredMissile,
    ShipKilledOther,
    ShipLaunchedEscapePod,
    ShipLaunchedFromStation,
    ShipScoopedOther,
    ShipTargetLost,
    /// Target loss while pursuit through witchspace is expected.
    ExpectWitchspaceTargetLost,
    ShipWillEnterWormhole,
    WitchspaceBlocked,
    WormholeSuggested,

    DockingAchievedRange,
    DockingClearanceWithdrawn,

    EscortDock,
    EscortHelpRequest,

    ScoopingAchievedRange,
    ScoopedFuel,

    MissileCommsReceived,
    MissileHitByEcm,
    MissileTargetCloaked,
    MissileTargetLost,
    MissileAchievedRange,

    StationAttackedWithMissile,
    StationBeingAttacked,
    StationCascadeWeaponDetected,
    StationCommsReceived,
    StationFiredMissile,
    StationHelpRequest,
    StationOffenceCommittedNearby,

    /// A response registered in the session's rule table.
    Custom(RuleId),
}

impl Response {
    /// The handlers nearly every behaviour installs.
    ///
    /// `pursuit` selects the variants for ships that follow their target
    /// through witchspace.
    pub fn standard(pursuit: bool) -> HandlerSet {
        use EventKind as E;
        let mut set = HandlerSet::new()
            .with(E::ApproachingPlanetSurface, Response::ApproachingPlanetSurface)
            .with(E::CargoDumpedNearby, Response::CargoDumpedNearby)
            .with(E::CascadeWeaponDetected, Response::CascadeWeaponDetected)
            .with(E::CommsMessageReceived, Response::CommsMessageReceived)
            .with(E::DistressMessageReceived, Response::DistressMessageReceived)
            .with(E::EscortAccepted, Response::EscortAccepted)
            .with(E::HelpRequestReceived, Response::HelpRequestReceived)
            .with(E::OffenceCommittedNearby, Response::OffenceCommittedNearby)
            .with(E::ShipAcceptedEscort, Response::ShipAcceptedEscort)
            .with(E::ShipAttackedOther, Response::ShipAttackedOther)
            .with(E::ShipAttackedWithMissile, Response::ShipAttackedWithMissile)
            .with(E::ShipAttackerDistracted, Response::ShipAttackerDistracted)
            .with(E::ShipBeingAttacked, Response::ShipBeingAttacked)
            .with(
                E::ShipBeingAttackedUnsuccessfully,
                Response::ShipBeingAttackedUnsuccessfully,
            )
            .with(E::ShipFiredMissile, Response::ShipFiredMissile)
            .with(E::ShipKilledOther, Response::ShipKilledOther)
            .with(E::ShipLaunchedEscapePod, Response::ShipLaunchedEscapePod)
            .with(E::ShipLaunchedFromStation, Response::ShipLaunchedFromStation)
            .with(E::ShipWillEnterWormhole, Response::ShipWillEnterWormhole)
            .with(E::WormholeSuggested, Response::WormholeSuggested);
        if pursuit {
            set.insert(E::PlayerWillEnterWitchspace, Response::TrackPlayerWillEnterWitchspace);
            set.insert(E::ShipTargetLost, Response::ExpectWitchspaceTargetLost);
        } else {
            set.insert(E::PlayerWillEnterWitchspace, Response::PlayerWillEnterWitchspace);
            set.insert(E::ShipTargetLost, Response::ShipTargetLost);
        }
        set
    }

    /// The whole table of a missile.
    pub fn missile() -> HandlerSet {
        use EventKind as E;
        HandlerSet::new()
            .with(E::CommsMessageReceived, Response::MissileCommsReceived)
            .with(E::ShipHitByEcm, Response::MissileHitByEcm)
            .with(E::ShipTargetCloaked, Response::MissileTargetCloaked)
            .with(E::ShipTargetLost, Response::MissileTargetLost)
            .with(E::ShipAchievedDesiredRange, Response::MissileAchievedRange)
    }

    /// The whole table of a station. Stations never flee and never chase,
    /// so they skip most of the standard set.
    pub fn station() -> HandlerSet {
        use EventKind as E;
        HandlerSet::new()
            .with(E::CascadeWeaponDetected, Response::StationCascadeWeaponDetected)
            .with(E::CommsMessageReceived, Response::StationCommsReceived)
            .with(E::DistressMessageReceived, Response::DistressMessageReceived)
            .with(E::HelpRequestReceived, Response::StationHelpRequest)
            .with(E::OffenceCommittedNearby, Response::StationOffenceCommittedNearby)
            .with(E::ShipAttackedOther, Response::ShipAttackedOther)
            .with(E::ShipAttackedWithMissile, Response::StationAttackedWithMissile)
            .with(E::ShipBeingAttacked, Response::StationBeingAttacked)
            .with(E::ShipFiredMissile, Response::StationFiredMissile)
            .with(E::ShipKilledOther, Response::ShipKilledOther)
            .with(E::ShipTargetLost, Response::ShipTargetLost)
    }

    /// Runs this response for `event`. Events whose payload does not fit
    /// the response are ignored.
    pub fn respond(self, ctx: &mut AiContext<'_>, event: &GameEvent) {
        use GameEvent as G;
        match (self, event) {
            // Handled by the controller before dispatch reaches here.
            (Response::Reconsider | Response::Teardown, _) => {}

            (Response::ApproachingPlanetSurface, _) => approaching_planet_surface(ctx),
            (Response::CargoDumpedNearby, _) => {
                if ctx.params().flag(keys::WATCH_FOR_CARGO) {
                    let seen = ctx.params().integer(keys::CARGO_DROPPED).unwrap_or(0);
                    ctx.params_mut().set(keys::CARGO_DROPPED, seen + 1);
                }
            }
            (Response::CascadeWeaponDetected, G::CascadeWeaponDetected { weapon }) => {
                cascade_weapon_detected(ctx, *weapon)
            }
            (Response::CommsMessageReceived, G::CommsMessageReceived { sender, .. }) => {
                comms_message_received(ctx, *sender)
            }
            (
                Response::DistressMessageReceived,
                G::DistressMessageReceived { aggressor, sender },
            ) => distress_message_received(ctx, *aggressor, *sender),
            (Response::EscortAccepted, G::EscortAccepted { escort }) => {
                ctx.communicate("escortAccepted", *escort, CommsPriority::NotAfterSending);
            }
            (Response::HelpRequestReceived, G::HelpRequestReceived { ally, enemy }) => {
                help_request_received(ctx, *ally, *enemy)
            }
            (Response::OffenceCommittedNearby, G::OffenceCommittedNearby { attacker, victim }) => {
                offence_committed_nearby(ctx, *attacker, *victim)
            }
            (Response::PlayerWillEnterWitchspace, _) => {
                if let Some(wormhole) = known_wormhole(ctx) {
                    ctx.command(ShipCommand::EnterWormhole(Some(wormhole)));
                }
            }
            (Response::TrackPlayerWillEnterWitchspace, _) => {
                let wormhole = known_wormhole(ctx);
                ctx.command(ShipCommand::EnterWormhole(wormhole));
            }
            (Response::ShipAcceptedEscort, G::ShipAcceptedEscort { mother }) => {
                ctx.communicate("escortMotherAccepted", *mother, CommsPriority::NotAfterSending);
            }
            (Response::ShipAchievedDesiredRange, _) => achieved_desired_range(ctx),
            (Response::ShipAttackedOther, G::ShipAttackedOther { other }) => {
                ctx.communicate("hitTarget", *other, CommsPriority::Quiet);
            }
            (Response::ShipAttackedWithMissile, G::ShipAttackedWithMissile { missile, whom }) => {
                attacked_with_missile(ctx, *missile, *whom)
            }
            (Response::ShipAttackerDistracted, G::ShipAttackerDistracted { whom }) => {
                attacker_distracted(ctx, *whom)
            }
            (Response::ShipBeingAttacked, G::ShipBeingAttacked { whom }) => match whom {
                Some(whom) => being_attacked(ctx, *whom),
                None => ctx.reconsider_now(),
            },
            (
                Response::ShipBeingAttackedUnsuccessfully,
                G::ShipBeingAttackedUnsuccessfully { whom },
            ) => being_attacked_unsuccessfully(ctx, *whom),
            (Response::ShipFiredMissile, G::ShipFiredMissile { target, .. }) => {
                if ctx.me().is_some_and(|s| s.defense_targets.len() > 1) {
                    // Spread missiles between targets.
                    ctx.remove_defense_target(*target);
                    ctx.set_target(None);
                    ctx.reconsider_now();
                }
                ctx.communicate("firedMissile", *target, CommsPriority::Quiet);
            }
            (Response::ShipKilledOther, G::ShipKilledOther { other }) => {
                ctx.communicate("killedTarget", *other, CommsPriority::NotAfterTraffic);
            }
            (Response::ShipLaunchedEscapePod, _) => launched_escape_pod(ctx),
            (Response::ShipLaunchedFromStation, G::ShipLaunchedFromStation { station }) => {
                // Clear the station before anything else.
                let Some(position) = ctx.ship(*station).map(|s| s.position) else {
                    return;
                };
                let speed = ctx.cruise_speed();
                ctx.set_course(position, 15_000.0, speed);
                ctx.fly_to_range();
            }
            (Response::ShipScoopedOther, G::ShipScoopedOther { commodity }) => {
                let mut params = CommsParams::new();
                params.insert("ai_goods_description".to_string(), commodity.clone());
                ctx.communicate("scoopedCargo", params, CommsPriority::Quiet);
                ctx.params_mut().remove(keys::CARGO_DROPPED);
                ctx.reconsider_now();
            }
            (Response::ShipTargetLost, _) => ctx.reconsider_now(),
            (Response::ExpectWitchspaceTargetLost, G::ShipTargetLost { target }) => {
                expect_witchspace_target_lost(ctx, *target)
            }
            (Response::ShipWillEnterWormhole, _) => {
                ctx.params_mut().remove(keys::WITCHSPACE_WORMHOLE);
                ctx.install_handlers(HandlerSet::new());
            }
            (Response::WitchspaceBlocked, G::ShipWitchspaceBlocked { blocker }) => {
                witchspace_blocked(ctx, *blocker)
            }
            (Response::WormholeSuggested, G::WormholeSuggested { wormhole }) => {
                wormhole_suggested(ctx, *wormhole)
            }

            (Response::DockingAchievedRange, _) => {
                let message = ctx.me().and_then(|s| s.docking).map(|d| d.message);
                if matches!(
                    message,
                    Some(
                        DockingMessage::Approach
                            | DockingMessage::BackOff
                            | DockingMessage::ApproachCoordinates
                    )
                ) {
                    ctx.reconsider_now();
                }
            }
            (Response::DockingClearanceWithdrawn, _) => {
                ctx.params_mut().remove(keys::DOCKING_STATION);
                ctx.reconsider_now();
            }

            (Response::EscortDock, _) => ctx.reconsider_now(),
            (Response::EscortHelpRequest, G::HelpRequestReceived { ally, enemy }) => {
                escort_help_request(ctx, *ally, *enemy)
            }

            (Response::ScoopingAchievedRange, _) => ctx.reconsider_now(),
            (Response::ScoopedFuel, _) => {
                if ctx.me().is_some_and(|s| s.fuel >= 7.0) {
                    ctx.reconsider_now();
                }
            }

            (Response::MissileCommsReceived, _) => ctx.note_comms_heard(),
            (Response::MissileHitByEcm, _) => missile_hit_by_ecm(ctx),
            (Response::MissileTargetCloaked, _) => {
                if let Some(target) = ctx.target()
                    && let Some(position) = ctx.ship(target).map(|t| t.position)
                {
                    ctx.params_mut().set(keys::INTERCEPT_COORDINATES, position);
                    ctx.params_mut().set(keys::INTERCEPT_TARGET, target);
                }
                // Stops the intercept reporting a reached range.
                ctx.command(ShipCommand::Idle);
            }
            (Response::MissileTargetLost, _) => ctx.reconsider_now(),
            (Response::MissileAchievedRange, _) => ctx.effect(ShipEffect::Explode),

            (
                Response::StationAttackedWithMissile,
                G::ShipAttackedWithMissile { missile, whom },
            ) => station_attacked_with_missile(ctx, *missile, *whom),
            (Response::StationBeingAttacked, G::ShipBeingAttacked { whom }) => match whom {
                Some(whom) => station_being_attacked(ctx, *whom),
                None => ctx.reconsider_now(),
            },
            (Response::StationCascadeWeaponDetected, _) => {
                red_alert(ctx);
                ctx.reconsider_now();
            }
            (Response::StationCommsReceived, _) => ctx.note_comms_heard(),
            (Response::StationFiredMissile, G::ShipFiredMissile { target, .. }) => {
                ctx.communicate("firedMissile", *target, CommsPriority::Quiet);
            }
            (Response::StationHelpRequest, G::HelpRequestReceived { enemy, .. }) => {
                station_help_request(ctx, *enemy)
            }
            (
                Response::StationOffenceCommittedNearby,
                G::OffenceCommittedNearby { attacker, victim },
            ) => {
                if let Some(offender) = judge_offence(ctx, *attacker, *victim) {
                    ctx.effect(ShipEffect::RaiseBounty {
                        offender,
                        mask: 7,
                    });
                    ctx.add_defense_target(offender);
                    if ctx.me().is_some_and(|s| s.alert < AlertCondition::Red) {
                        red_alert(ctx);
                        ctx.set_target(Some(offender));
                    }
                    ctx.reconsider_now();
                }
            }

            (Response::Custom(id), _) => {
                let session = ctx.session();
                match session.rules().response(id) {
                    Some(f) => f(ctx, event),
                    None => debug!(
                        target: "priority_ai::handlers",
                        rule = %id,
                        "custom response not registered"
                    ),
                }
            }

            (response, event) => debug!(
                target: "priority_ai::handlers",
                ?response,
                kind = %event.kind(),
                "event does not fit response; ignored"
            ),
        }
    }
}

impl HandlerSet {
    /// Adds the docking reactions.
    pub fn with_docking(self) -> Self {
        self.with(EventKind::StationWithdrewDockingClearance, Response::DockingClearanceWithdrawn)
            .with(EventKind::ShipAchievedDesiredRange, Response::DockingAchievedRange)
    }

    /// Overrides help requests for escorts and listens for the order to
    /// dock.
    pub fn with_escort(self) -> Self {
        self.with(EventKind::HelpRequestReceived, Response::EscortHelpRequest)
            .with(EventKind::EscortDock, Response::EscortDock)
    }

    pub fn with_scooping(self) -> Self {
        self.with(EventKind::ShipAchievedDesiredRange, Response::ScoopingAchievedRange)
            .with(EventKind::ShipScoopedFuel, Response::ScoopedFuel)
    }
}

fn approaching_planet_surface(ctx: &mut AiContext<'_>) {
    if !ctx.params().flag(keys::ALLOW_PLANETARY_LANDING) {
        ctx.reconsider_now();
        return;
    }
    let speed = ctx.max_speed() / 4.0;
    ctx.set_desired_speed(speed);
    ctx.command(ShipCommand::LandOnPlanet);
    ctx.clear_wake();
    ctx.install_handlers(HandlerSet::new());
    ctx.communicate("landingOnPlanet", CommsParams::new(), CommsPriority::Quiet);
}

fn cascade_weapon_detected(ctx: &mut AiContext<'_>, weapon: EntityId) {
    if let Some(me) = ctx.me_mut() {
        me.defense_targets.clear();
    }
    ctx.add_defense_target(weapon);
    if let Some(position) = ctx.ship(weapon).map(|w| w.position) {
        ctx.params_mut().set(keys::CASCADE_DETECTED, position);
    }
    ctx.set_target(Some(weapon));
    ctx.command(ShipCommand::Flee);
    ctx.reconsider_now();
}

fn comms_message_received(ctx: &mut AiContext<'_>, sender: EntityId) {
    // A hostile sender aiming at a ship not yet fighting is a pirate demand.
    let me = ctx.ship_id();
    let hostile = ctx
        .ship(sender)
        .is_some_and(|s| s.target == Some(me) && s.has_hostile_target);
    if hostile && !ctx.has_hostile_target() {
        ctx.set_target(Some(sender));
        ctx.command(ShipCommand::Attack);
        ctx.reconsider_now();
    }
    ctx.note_comms_heard();
}

fn distress_message_received(ctx: &mut AiContext<'_>, aggressor: EntityId, sender: EntityId) {
    if !ctx.params().flag(keys::LISTEN_FOR_DISTRESS_CALL) {
        return;
    }
    let enforcer = ctx.me().is_some_and(|s| {
        s.scan_class == ScanClass::Police
            || (s.is_station && s.allegiance == Some(crate::host::Allegiance::Galcop))
    });
    if enforcer && ctx.distance_to(aggressor) < ctx.scanner_range() {
        ctx.effect(ShipEffect::RaiseBounty {
            offender: aggressor,
            mask: 8,
        });
    }
    let now = ctx.now();
    let params = ctx.params_mut();
    params.set(keys::DISTRESS_AGGRESSOR, aggressor);
    params.set(keys::DISTRESS_SENDER, sender);
    params.set(keys::DISTRESS_TIMESTAMP, now);
    ctx.reconsider_now();
}

/// True when `enemy` is a Thargoid and this ship is not already fighting
/// one.
fn thargoid_takes_priority(ctx: &AiContext<'_>, enemy: EntityId) -> bool {
    let is_thargoid = |id: EntityId| {
        ctx.ship(id)
            .is_some_and(|s| s.scan_class == ScanClass::Thargoid)
    };
    is_thargoid(enemy)
        && !is_thargoid(ctx.ship_id())
        && !ctx.target().is_some_and(is_thargoid)
}

fn fire_ecm_at_missile(ctx: &mut AiContext<'_>, enemy: EntityId) -> bool {
    let missile = ctx
        .ship(enemy)
        .is_some_and(|s| s.scan_class == ScanClass::Missile);
    let has_ecm = ctx.me().is_some_and(|s| s.has(Equipment::ECM));
    if missile && has_ecm && ctx.distance_to(enemy) < ctx.scanner_range() {
        ctx.effect(ShipEffect::FireEcm);
        true
    } else {
        false
    }
}

/// Whether this ship is already fighting on `ally`'s side.
fn already_helping(ctx: &AiContext<'_>, ally: EntityId) -> bool {
    let my_target = ctx.target();
    let targets_target = my_target.and_then(|t| ctx.ship(t)).and_then(|t| t.target);
    let allys_target = ctx.ship(ally).and_then(|a| a.target);
    targets_target == Some(ally) || (my_target.is_some() && my_target == allys_target)
}

fn ally_worse_off(ctx: &AiContext<'_>, ally: EntityId) -> bool {
    let mine = ctx.me().map_or(0.0, |s| s.energy_ratio());
    ctx.ship(ally).is_some_and(|a| a.energy_ratio() < mine)
}

fn help_request_received(ctx: &mut AiContext<'_>, ally: EntityId, enemy: EntityId) {
    if ctx.allied(ctx.ship_id(), enemy) {
        return;
    }
    ctx.add_defense_target(enemy);
    fire_ecm_at_missile(ctx, enemy);
    if thargoid_takes_priority(ctx, enemy) && ctx.respond_to_thargoids(enemy, false) {
        ctx.reconsider_now();
        return;
    }
    if !ctx.has_hostile_target() {
        ctx.reconsider_now();
        return;
    }
    if ally_worse_off(ctx, ally) && !already_helping(ctx, ally) {
        ctx.communicate("startHelping", enemy, CommsPriority::Quiet);
        ctx.set_target(Some(enemy));
        ctx.reconsider_now();
    }
}

fn escort_help_request(ctx: &mut AiContext<'_>, ally: EntityId, enemy: EntityId) {
    if ctx.allied(ctx.ship_id(), enemy) {
        return;
    }
    ctx.add_defense_target(enemy);
    fire_ecm_at_missile(ctx, enemy);
    if thargoid_takes_priority(ctx, enemy) && ctx.respond_to_thargoids(enemy, false) {
        ctx.reconsider_now();
        return;
    }
    // Always help the leader.
    if ctx.leader() == Some(ally) {
        let targets_target = ctx.target().and_then(|t| ctx.ship(t)).and_then(|t| t.target);
        if !ctx.has_hostile_target() || targets_target != Some(ally) {
            ctx.set_target(Some(enemy));
            ctx.reconsider_now();
            return;
        }
    }
    if fire_ecm_at_missile(ctx, enemy) {
        return;
    }
    if !ctx.has_hostile_target() {
        ctx.set_target(Some(enemy));
        ctx.command(ShipCommand::Attack);
        ctx.reconsider_now();
        return;
    }
    if ally_worse_off(ctx, ally) && !already_helping(ctx, ally) {
        ctx.set_target(Some(enemy));
        ctx.reconsider_now();
    }
}

fn offence_committed_nearby(ctx: &mut AiContext<'_>, attacker: EntityId, victim: EntityId) {
    let Some(offender) = judge_offence(ctx, attacker, victim) else {
        return;
    };
    let bounty = bounty_of(ctx, offender);
    let priority = if bounty & 7 != 7 {
        CommsPriority::NotAfterTraffic
    } else {
        CommsPriority::Quiet
    };
    ctx.communicate("offenceDetected", offender, priority);
    ctx.effect(ShipEffect::RaiseBounty {
        offender,
        mask: 7,
    });
    ctx.add_defense_target(offender);
    ctx.reconsider_now();
}

/// Decides who is to blame for an offence seen nearby. `None` means the
/// offence is someone else's business or is forgiven.
fn judge_offence(
    ctx: &mut AiContext<'_>,
    attacker: EntityId,
    victim: EntityId,
) -> Option<EntityId> {
    if victim == ctx.ship_id() || ctx.distance_to(attacker) > ctx.scanner_range() {
        return None;
    }
    if !ctx.params().flag(keys::MARK_OFFENDERS) {
        return None;
    }
    let (mut attacker, mut victim) = (attacker, victim);
    if bounty_of(ctx, attacker) == 0 && bounty_of(ctx, victim) == 0 {
        let disliked_victim = in_category(ctx, victim, categories::POLICE_DISLIKE)
            && !in_category(ctx, attacker, categories::POLICE_DISLIKE);
        let liked_attacker = in_category(ctx, attacker, categories::POLICE_LIKE)
            && !in_category(ctx, victim, categories::POLICE_LIKE);
        let victim_fighting = ctx.ship(victim).is_some_and(|s| s.has_hostile_target);
        if (disliked_victim || liked_attacker) && victim_fighting {
            // Both are fighting; the attacker is likely defending itself.
            std::mem::swap(&mut attacker, &mut victim);
        }
    }

    let offender = ctx.ship(attacker)?;
    let (is_player, offender_bounty, offender_target) =
        (offender.is_player, offender.bounty, offender.target);
    if !is_player && offender_target != Some(victim) {
        // Stray fire aimed at a pirate or assassin is forgiven.
        if offender_bounty == 0
            && let Some(aimed_at) = offender_target
            && in_category(ctx, aimed_at, categories::POLICE_DISLIKE)
        {
            ctx.add_defense_target(aimed_at);
            return None;
        }
    } else if is_player && ignore_player_friendly_fire(ctx, attacker) {
        ctx.communicate("friendlyFire", attacker, CommsPriority::NotAfterTraffic);
        return None;
    }
    Some(attacker)
}

fn bounty_of(ctx: &AiContext<'_>, id: EntityId) -> u32 {
    ctx.ship(id).map_or(0, |s| s.bounty)
}

fn in_category(ctx: &AiContext<'_>, id: EntityId, category: &str) -> bool {
    ctx.host().in_role_category(id, category)
}

/// Whether a stray shot from the player may be overlooked.
fn ignore_player_friendly_fire(ctx: &mut AiContext<'_>, player: EntityId) -> bool {
    let me = ctx.ship_id();
    let Some(whom) = ctx.ship(player) else {
        return false;
    };
    if whom.target == Some(me) {
        return false;
    }
    let player_clean = whom.bounty == 0;
    if ctx.params().entity(keys::LAST_ASSIST) == Some(player) {
        // The player has helped in this fight; forgive, but not forever.
        if ctx.chance(0.5) {
            ctx.params_mut().remove(keys::LAST_ASSIST);
        }
        return true;
    }
    let me_clean = ctx.me().is_some_and(|s| s.bounty == 0);
    if me_clean != player_clean || ctx.params().flag(keys::PLAYER_FRIENDLY_FIRE_ALREADY) {
        return false;
    }
    let friendly = ctx
        .params()
        .texts(keys::FRIENDLY_ROLES)
        .is_some_and(|roles| roles.iter().any(|r| ctx.host().in_role_category(player, r)));
    if friendly {
        ctx.params_mut().set(keys::PLAYER_FRIENDLY_FIRE_ALREADY, true);
    }
    friendly
}

/// The stored witchspace wormhole, if it is still open.
fn known_wormhole(ctx: &AiContext<'_>) -> Option<EntityId> {
    let id = ctx.params().entity(keys::WITCHSPACE_WORMHOLE)?;
    ctx.host()
        .wormholes()
        .iter()
        .any(|w| w.id == id)
        .then_some(id)
}

fn achieved_desired_range(ctx: &mut AiContext<'_>) {
    let remaining = ctx.params_mut().path_mut(keys::WAYPOINTS).map(|path| {
        path.pop();
        path.len()
    });
    if let Some(remaining) = remaining {
        if remaining == 0 {
            ctx.params_mut().remove(keys::WAYPOINTS);
        }
    } else if let Some(waypoint) = ctx.params().vector(keys::WAYPOINT) {
        let range = ctx.params().number(keys::WAYPOINT_RANGE).unwrap_or(0.0);
        let destination = ctx.me().map_or(waypoint, |s| s.destination);
        if destination.distance(waypoint) < 1_000.0 + range {
            ctx.communicate("waypointReached", CommsParams::new(), CommsPriority::NotAfterTraffic);
            ctx.params_mut().remove(keys::WAYPOINT);
            ctx.params_mut().remove(keys::WAYPOINT_RANGE);
            if ctx.params().flag(keys::PATROL_STATION)
                && let Some(station) = ctx.leader()
                && ctx.ship(station).is_some_and(|s| s.is_station)
            {
                ctx.communicate("patrolReportIn", station, CommsPriority::Quiet);
                ctx.effect(ShipEffect::PatrolReportIn { station });
            }
        }
    }
    ctx.reconsider_now();
}

fn attacked_with_missile(ctx: &mut AiContext<'_>, missile: EntityId, whom: EntityId) {
    if ctx.params().flag(keys::SENDS_DISTRESS_CALLS) {
        ctx.broadcast_distress_message();
    }
    let has_ecm = ctx.me().is_some_and(|s| s.has(Equipment::ECM));
    ctx.add_defense_target(missile);
    ctx.add_defense_target(whom);
    if has_ecm {
        // The ECM will probably deal with it; no need to reconsider yet.
        ctx.effect(ShipEffect::FireEcm);
        return;
    }
    ctx.communicate("incomingMissile", whom, CommsPriority::NotAfterTraffic);
    let fleeing_missile = ctx
        .target()
        .and_then(|t| ctx.ship(t))
        .is_some_and(|t| t.scan_class == ScanClass::Missile);
    if fleeing_missile {
        // Keep fleeing the first missile, but ask about this one.
        let previous = ctx.target();
        ctx.set_target(Some(missile));
        ctx.effect(ShipEffect::RequestHelpFromGroup);
        ctx.set_target(previous);
    } else {
        ctx.set_target(Some(missile));
        ctx.effect(ShipEffect::RequestHelpFromGroup);
    }
    ctx.reconsider_now();
}

fn attacker_distracted(ctx: &mut AiContext<'_>, whom: EntityId) {
    if thargoid_takes_priority(ctx, whom) && ctx.respond_to_thargoids(whom, false) {
        ctx.reconsider_now();
        return;
    }
    if ctx.params().entity(keys::LAST_ASSIST) != Some(whom) {
        let Some(helper) = ctx.ship(whom) else {
            ctx.reconsider_now();
            return;
        };
        let (is_player, class, bounty) = (helper.is_player, helper.scan_class, helper.bounty);
        let priority = if is_player {
            CommsPriority::Always
        } else {
            CommsPriority::NotAfterTraffic
        };
        ctx.communicate("thanksForHelp", whom, priority);
        let police = ctx.me().is_some_and(|s| s.scan_class == ScanClass::Police);
        if police
            && !matches!(class, ScanClass::Police | ScanClass::Thargoid)
            && bounty > 0
        {
            ctx.effect(ShipEffect::ReduceBounty {
                ship: whom,
                factor: 0.8,
            });
        }
        ctx.params_mut().set(keys::LAST_ASSIST, whom);
    }
    ctx.reconsider_now();
}

/// Tonnes a player is expected to demand of a ship they attack.
fn expected_player_demand(ctx: &AiContext<'_>, divisor: f64) -> u32 {
    let capacity = ctx.me().map_or(0.0, |s| f64::from(s.cargo_capacity));
    (capacity / divisor).ceil() as u32
}

fn being_attacked(ctx: &mut AiContext<'_>, whom: EntityId) {
    let me = ctx.ship_id();
    let Some(attacker) = ctx.ship(whom) else {
        ctx.reconsider_now();
        return;
    };
    let (is_player, aiming_at_me) = (attacker.is_player, attacker.target == Some(me));

    if !aiming_at_me {
        if !is_player {
            if ctx.allied(whom, me) {
                ctx.communicate("friendlyFire", whom, CommsPriority::NotAfterTraffic);
                return;
            }
            // Usually an accident; let it pass.
            if ctx.random() > 0.1 {
                return;
            }
        } else if ctx.in_combat() && ignore_player_friendly_fire(ctx, whom) {
            ctx.communicate("friendlyFire", whom, CommsPriority::NotAfterSending);
            return;
        }
    }

    if ctx.params().flag(keys::MARK_OFFENDERS) {
        let police = ctx.me().is_some_and(|s| s.scan_class == ScanClass::Police);
        let main_station = ctx.host().system().main_station == Some(me);
        if police {
            ctx.effect(ShipEffect::RaiseBounty {
                offender: whom,
                mask: 15,
            });
        } else if main_station {
            ctx.effect(ShipEffect::RaiseBounty {
                offender: whom,
                mask: 63,
            });
        }
    }
    if ctx.me().is_some_and(|s| s.target.is_some() && !s.has_hostile_target) {
        // Don't get confused and shoot the station.
        ctx.set_target(None);
    }
    if ctx.params().flag(keys::SENDS_DISTRESS_CALLS) {
        ctx.broadcast_distress_message();
    }
    if ctx.me().is_some_and(|s| s.is_fleeing) {
        ctx.communicate("surrender", CommsParams::new(), CommsPriority::NotAfterTraffic);
    }
    if thargoid_takes_priority(ctx, whom) && ctx.respond_to_thargoids(whom, true) {
        ctx.reconsider_now();
        return;
    }
    let fighting_thargoid = ctx
        .target()
        .and_then(|t| ctx.ship(t))
        .is_some_and(|t| t.scan_class == ScanClass::Thargoid);
    let attacker_thargoid = ctx
        .ship(whom)
        .is_some_and(|s| s.scan_class == ScanClass::Thargoid);
    if fighting_thargoid && !attacker_thargoid {
        // Everything else is friendly fire right now.
        return;
    }

    let known = ctx.me().is_some_and(|s| s.defense_targets.contains(&whom));
    if !known {
        ctx.communicate("newAssailant", whom, CommsPriority::NotAfterTraffic);
        ctx.add_defense_target(whom);
    } else if ctx.me().is_some_and(|s| s.energy * 4.0 < s.max_energy) {
        ctx.communicate("attackLowEnergy", whom, CommsPriority::NotAfterSending);
        ctx.effect(ShipEffect::RequestHelpFromGroup);
    }

    if ctx.has_hostile_target() {
        switch_to_worse_threat(ctx, whom);
    } else if is_player {
        let demanded = ctx
            .me()
            .is_some_and(|s| s.pirate_demand.is_some() || s.paid_pirates);
        if !demanded {
            let divisor = if in_category(ctx, whom, categories::PIRATE) {
                10.0
            } else if in_category(ctx, whom, categories::ASSASSIN) {
                20.0
            } else {
                15.0
            };
            let demand = expected_player_demand(ctx, divisor);
            if let Some(me) = ctx.me_mut() {
                me.pirate_demand = Some(demand);
            }
        }
    }

    if ctx.me().is_some_and(|s| s.escort_group.is_some()) {
        ctx.effect(ShipEffect::RequestHelpFromGroup);
    }
    ctx.reconsider_now();
}

/// Considers switching from the current target to `whom`.
fn switch_to_worse_threat(ctx: &mut AiContext<'_>, whom: EntityId) {
    let Some(target) = ctx.target() else {
        return;
    };
    let me = ctx.ship_id();
    let switch = if !ctx.is_aggressive(target) {
        // Current target is running away.
        true
    } else if ctx.ship(target).and_then(|t| t.target) != Some(me) {
        ctx.chance(0.2)
    } else {
        let roll = ctx.random();
        ctx.threat_assessment(whom, true) > ctx.threat_assessment(target, true) * (1.0 + roll)
    };
    if switch {
        ctx.note_distraction(whom);
        ctx.set_target(Some(whom));
    }
}

fn being_attacked_unsuccessfully(ctx: &mut AiContext<'_>, whom: EntityId) {
    if ctx.params().flag(keys::SENDS_DISTRESS_CALLS) {
        ctx.broadcast_distress_message();
    }
    if !ctx.me().is_some_and(|s| s.defense_targets.contains(&whom)) {
        ctx.add_defense_target(whom);
        ctx.reconsider_now();
    }
    if ctx.has_hostile_target() {
        return;
    }
    let by_player = ctx.ship(whom).is_some_and(|s| s.is_player);
    let demanded = ctx
        .me()
        .is_some_and(|s| s.pirate_demand.is_some() || s.paid_pirates);
    if by_player && !demanded {
        let demand = expected_player_demand(ctx, 15.0);
        if let Some(me) = ctx.me_mut() {
            me.pirate_demand = Some(demand);
        }
    }
    ctx.set_target(Some(whom));
    ctx.command(ShipCommand::Attack);
    ctx.effect(ShipEffect::RequestHelpFromGroup);
}

fn launched_escape_pod(ctx: &mut AiContext<'_>) {
    ctx.communicate("eject", CommsParams::new(), CommsPriority::Always);
    if ctx.params().flag(keys::SELF_DESTRUCT_ABANDONED_SHIP)
        && !ctx.params().flag(keys::SELF_DESTRUCT_SCHEDULED)
    {
        let delay = ctx.config().escape_pod_self_destruct;
        ctx.schedule(delay, ScheduledAction::SelfDestruct);
        ctx.params_mut().set(keys::SELF_DESTRUCT_SCHEDULED, true);
    }
}

fn expect_witchspace_target_lost(ctx: &mut AiContext<'_>, target: Option<EntityId>) {
    let target = target.or_else(|| ctx.params().entity(keys::REMEMBERED_TARGET));
    if let Some(position) = target.and_then(|t| ctx.ship(t)).map(|t| t.position) {
        // The most recent wormhole is the likeliest.
        let wormhole = ctx
            .host()
            .wormholes()
            .iter()
            .rev()
            .find(|w| w.position.distance(position) < WORMHOLE_MATCH_RANGE)
            .map(|w| w.id);
        if let Some(wormhole) = wormhole {
            ctx.params_mut().set(keys::WITCHSPACE_WORMHOLE, wormhole);
        }
    }
    ctx.reconsider_now();
}

/// Something sits in the way of a witchspace jump.
///
/// The course toward the blocker is never set: only the fly order is
/// re-issued, so the ship keeps whatever destination it already had.
fn witchspace_blocked(ctx: &mut AiContext<'_>, blocker: EntityId) {
    ctx.communicate("witchspaceBlocked", blocker, CommsPriority::NotAfterTraffic);
    ctx.fly_to_range();
    ctx.params_mut().remove(keys::WITCHSPACE_ENTRY);
}

fn wormhole_suggested(ctx: &mut AiContext<'_>, wormhole: EntityId) {
    let Some(position) = ctx
        .host()
        .wormholes()
        .iter()
        .find(|w| w.id == wormhole)
        .map(|w| w.position)
    else {
        return;
    };
    let speed = ctx.max_speed();
    ctx.set_course(position, 0.0, speed);
    ctx.fly_to_range();
    ctx.params_mut().set(keys::WITCHSPACE_WORMHOLE, wormhole);
}

fn station_attacked_with_missile(ctx: &mut AiContext<'_>, missile: EntityId, whom: EntityId) {
    red_alert(ctx);
    ctx.add_defense_target(missile);
    ctx.add_defense_target(whom);
    if ctx.me().is_some_and(|s| s.has(Equipment::ECM)) {
        ctx.effect(ShipEffect::FireEcm);
        return;
    }
    // Help goes after the launcher, not the missile.
    let previous = ctx.target();
    ctx.set_target(Some(whom));
    ctx.effect(ShipEffect::RequestHelpFromGroup);
    ctx.set_target(previous);
    ctx.reconsider_now();
}

fn station_being_attacked(ctx: &mut AiContext<'_>, whom: EntityId) {
    let me = ctx.ship_id();
    let Some(attacker) = ctx.ship(whom) else {
        ctx.reconsider_now();
        return;
    };
    let (is_player, aiming_at_me) = (attacker.is_player, attacker.target == Some(me));
    if !aiming_at_me {
        if !is_player {
            if ctx.allied(whom, me) {
                ctx.communicate("friendlyFire", whom, CommsPriority::Quiet);
                return;
            }
            if ctx.random() > 0.1 {
                return;
            }
        } else if ctx.me().is_some_and(|s| s.alert > AlertCondition::Green)
            && ignore_player_friendly_fire(ctx, whom)
        {
            ctx.communicate("friendlyFire", whom, CommsPriority::NotAfterSending);
            return;
        }
    }

    red_alert(ctx);
    if !ctx.me().is_some_and(|s| s.defense_targets.contains(&whom)) {
        ctx.add_defense_target(whom);
        ctx.reconsider_now();
    } else if ctx.me().is_some_and(|s| s.energy * 4.0 < s.max_energy) {
        ctx.reconsider_now();
        ctx.effect(ShipEffect::RequestHelpFromGroup);
    }

    match ctx.target().filter(|_| ctx.has_hostile_target()) {
        Some(target) if !ctx.is_aggressive(target) => ctx.set_target(Some(whom)),
        Some(target) => {
            let aimed_at_us = ctx.ship(target).and_then(|t| t.target) == Some(me);
            if !aimed_at_us && ctx.chance(0.2) {
                ctx.set_target(Some(whom));
            }
        }
        None => {
            ctx.set_target(Some(whom));
            ctx.reconsider_now();
        }
    }
}

fn station_help_request(ctx: &mut AiContext<'_>, enemy: EntityId) {
    ctx.add_defense_target(enemy);
    if fire_ecm_at_missile(ctx, enemy) {
        return;
    }
    ctx.set_target(Some(enemy));
    if ctx.me().is_some_and(|s| s.alert != AlertCondition::Red) {
        ctx.reconsider_now();
    }
}

fn missile_hit_by_ecm(ctx: &mut AiContext<'_>) {
    let hardened = ctx
        .me()
        .is_some_and(|s| s.primary_role == "EQ_HARDENED_MISSILE");
    if hardened {
        // Hardheads shrug off most pulses.
        if !ctx.chance(0.1) {
            return;
        }
        if ctx.chance(0.5) {
            Response::MissileAchievedRange.respond(ctx, &GameEvent::ShipAchievedDesiredRange);
            return;
        }
    }
    ctx.effect(ShipEffect::Explode);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::CommsRegistry;
    use crate::config::AiConfig;
    use crate::context::{ControllerState, EngineMode};
    use crate::host::{Allegiance, InMemoryHost, ShipState, Vector, Wormhole};
    use crate::session::AiSession;

    const ME: EntityId = EntityId(1);

    fn setup() -> (InMemoryHost, AiSession, ControllerState) {
        let mut host = InMemoryHost::new();
        host.add_ship(ShipState::new(ME, "trader"));
        let mut registry = CommsRegistry::new();
        registry.set_communication("generic", "generic", "witchspaceBlocked", "Move!");
        let session = AiSession::with_registry(AiConfig::default(), registry);
        (host, session, ControllerState::new(ME, EngineMode::Priority))
    }

    #[test]
    fn pursuit_flag_swaps_target_lost_handler() {
        let plain = Response::standard(false);
        let pursuit = Response::standard(true);
        assert_eq!(plain.get(EventKind::ShipTargetLost), Some(Response::ShipTargetLost));
        assert_eq!(
            pursuit.get(EventKind::ShipTargetLost),
            Some(Response::ExpectWitchspaceTargetLost)
        );
        assert_eq!(
            pursuit.get(EventKind::PlayerWillEnterWitchspace),
            Some(Response::TrackPlayerWillEnterWitchspace)
        );
        assert!(!plain.contains(EventKind::ShipWitchspaceBlocked));
        assert!(!plain.contains(EventKind::ShipAchievedDesiredRange));
    }

    #[test]
    fn additions_override_standard_entries() {
        let set = Response::standard(false).with_escort().with_docking();
        assert_eq!(set.get(EventKind::HelpRequestReceived), Some(Response::EscortHelpRequest));
        assert_eq!(
            set.get(EventKind::ShipAchievedDesiredRange),
            Some(Response::DockingAchievedRange)
        );
    }

    #[test]
    fn witchspace_blocked_keeps_the_old_course() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::new(EntityId(2), "trader").at(Vector::new(0.0, 0.0, 500.0)));
        {
            let me = host.ships.get_mut(&ME).unwrap();
            me.destination = Vector::new(1.0, 2.0, 3.0);
            me.desired_range = 42.0;
            me.desired_speed = 7.0;
        }
        state.params.set(keys::WITCHSPACE_ENTRY, 1_015.0);
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::WitchspaceBlocked.respond(
            &mut ctx,
            &GameEvent::ShipWitchspaceBlocked {
                blocker: EntityId(2),
            },
        );

        let me = &host.ships[&ME];
        assert_eq!(me.destination, Vector::new(1.0, 2.0, 3.0));
        assert_eq!(me.desired_range, 42.0);
        assert_eq!(me.desired_speed, 7.0);
        assert_eq!(host.last_command(ME), Some(ShipCommand::FlyToRangeFromDestination));
        assert_eq!(host.messages_from(ME), vec!["Move!"]);
        assert!(!state.params.contains(keys::WITCHSPACE_ENTRY));
    }

    #[test]
    fn achieved_range_pops_waypoint_path() {
        let (mut host, session, mut state) = setup();
        state.params.set(keys::WAYPOINTS, vec![Vector::X]);
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::ShipAchievedDesiredRange.respond(&mut ctx, &GameEvent::ShipAchievedDesiredRange);
        assert!(!state.params.contains(keys::WAYPOINTS));
        assert!(state.wake.is_scheduled());
    }

    #[test]
    fn achieved_range_clears_reached_waypoint() {
        let (mut host, session, mut state) = setup();
        host.ships.get_mut(&ME).unwrap().destination = Vector::new(0.0, 0.0, 10_000.0);
        state.params.set(keys::WAYPOINT, Vector::new(0.0, 0.0, 10_500.0));
        state.params.set(keys::WAYPOINT_RANGE, 100.0);
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::ShipAchievedDesiredRange.respond(&mut ctx, &GameEvent::ShipAchievedDesiredRange);
        assert!(!state.params.contains(keys::WAYPOINT));
        assert!(!state.params.contains(keys::WAYPOINT_RANGE));
    }

    #[test]
    fn escape_pod_schedules_one_self_destruct() {
        let (mut host, session, mut state) = setup();
        state.params.set(keys::SELF_DESTRUCT_ABANDONED_SHIP, true);
        {
            let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
            Response::ShipLaunchedEscapePod.respond(&mut ctx, &GameEvent::ShipLaunchedEscapePod);
            Response::ShipLaunchedEscapePod.respond(&mut ctx, &GameEvent::ShipLaunchedEscapePod);
        }
        assert_eq!(host.timers, vec![(ME, 1_010.0, ScheduledAction::SelfDestruct)]);
    }

    #[test]
    fn cargo_sightings_are_counted_when_watching() {
        let (mut host, session, mut state) = setup();
        state.params.set(keys::WATCH_FOR_CARGO, true);
        let event = GameEvent::CargoDumpedNearby {
            cargo: EntityId(5),
            ship: EntityId(6),
        };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::CargoDumpedNearby.respond(&mut ctx, &event);
        Response::CargoDumpedNearby.respond(&mut ctx, &event);
        assert_eq!(state.params.integer(keys::CARGO_DROPPED), Some(2));
    }

    #[test]
    fn lost_pursuit_target_remembers_its_wormhole() {
        let (mut host, session, mut state) = setup();
        host.add_ship(ShipState::new(EntityId(2), "pirate").at(Vector::new(0.0, 0.0, 9_000.0)));
        host.wormholes.push(Wormhole {
            id: EntityId(50),
            position: Vector::new(0.0, 0.0, 9_050.0),
            expiry: 2_000.0,
        });
        state.params.set(keys::REMEMBERED_TARGET, EntityId(2));
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::ExpectWitchspaceTargetLost
            .respond(&mut ctx, &GameEvent::ShipTargetLost { target: None });
        assert_eq!(state.params.entity(keys::WITCHSPACE_WORMHOLE), Some(EntityId(50)));
    }

    #[test]
    fn missile_fired_at_us_without_ecm_calls_for_help() {
        let (mut host, session, mut state) = setup();
        host.ships.get_mut(&ME).unwrap().equipment = Equipment::empty();
        host.add_ship(ShipState::new(EntityId(2), "pirate"));
        host.add_ship(ShipState::new(EntityId(3), "missile").with_scan_class(ScanClass::Missile));
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::ShipAttackedWithMissile.respond(
            &mut ctx,
            &GameEvent::ShipAttackedWithMissile {
                missile: EntityId(3),
                whom: EntityId(2),
            },
        );
        let me = &host.ships[&ME];
        assert_eq!(me.target, Some(EntityId(3)));
        assert_eq!(me.defense_targets, vec![EntityId(3), EntityId(2)]);
        assert_eq!(host.effects_of(ME), vec![ShipEffect::RequestHelpFromGroup]);
    }

    #[test]
    fn station_table_has_no_flight_reactions() {
        let set = Response::station();
        assert_eq!(
            set.get(EventKind::ShipBeingAttacked),
            Some(Response::StationBeingAttacked)
        );
        assert_eq!(
            set.get(EventKind::HelpRequestReceived),
            Some(Response::StationHelpRequest)
        );
        assert_eq!(set.get(EventKind::ShipTargetLost), Some(Response::ShipTargetLost));
        assert!(!set.contains(EventKind::ShipAchievedDesiredRange));
        assert!(!set.contains(EventKind::PlayerWillEnterWitchspace));
        assert!(!set.contains(EventKind::ShipLaunchedFromStation));
    }

    fn station_setup() -> (InMemoryHost, AiSession, ControllerState) {
        let (mut host, session, state) = setup();
        host.add_ship(ShipState::station(ME, Allegiance::Galcop));
        host.add_ship(ShipState::new(EntityId(2), "pirate"));
        host.add_ship(ShipState::new(EntityId(3), "missile").with_scan_class(ScanClass::Missile));
        (host, session, state)
    }

    #[test]
    fn station_with_ecm_answers_missiles_itself() {
        let (mut host, session, mut state) = station_setup();
        host.ships.get_mut(&ME).unwrap().equipment = Equipment::ECM;
        let event = GameEvent::ShipAttackedWithMissile {
            missile: EntityId(3),
            whom: EntityId(2),
        };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::StationAttackedWithMissile.respond(&mut ctx, &event);

        let me = &host.ships[&ME];
        assert_eq!(me.alert, AlertCondition::Red);
        assert_eq!(me.defense_targets, vec![EntityId(3), EntityId(2)]);
        assert_eq!(host.effects_of(ME), vec![ShipEffect::FireEcm]);
        assert!(!state.wake.is_scheduled());
    }

    #[test]
    fn station_without_ecm_keeps_its_target_after_calling_for_help() {
        let (mut host, session, mut state) = station_setup();
        host.add_ship(ShipState::new(EntityId(4), "pirate"));
        host.ships.get_mut(&ME).unwrap().target = Some(EntityId(4));
        let event = GameEvent::ShipAttackedWithMissile {
            missile: EntityId(3),
            whom: EntityId(2),
        };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::StationAttackedWithMissile.respond(&mut ctx, &event);

        assert_eq!(host.ships[&ME].target, Some(EntityId(4)));
        assert_eq!(host.effects_of(ME), vec![ShipEffect::RequestHelpFromGroup]);
        assert!(state.wake.is_scheduled());
    }

    #[test]
    fn station_at_red_alert_takes_a_help_request_without_rethinking() {
        let (mut host, session, mut state) = station_setup();
        host.ships.get_mut(&ME).unwrap().alert = AlertCondition::Red;
        let event = GameEvent::HelpRequestReceived {
            ally: EntityId(5),
            enemy: EntityId(2),
        };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::StationHelpRequest.respond(&mut ctx, &event);

        assert_eq!(host.ships[&ME].target, Some(EntityId(2)));
        assert_eq!(host.ships[&ME].defense_targets, vec![EntityId(2)]);
        assert!(!state.wake.is_scheduled());
    }

    #[test]
    fn calm_station_rethinks_on_a_help_request() {
        let (mut host, session, mut state) = station_setup();
        let event = GameEvent::HelpRequestReceived {
            ally: EntityId(5),
            enemy: EntityId(2),
        };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::StationHelpRequest.respond(&mut ctx, &event);
        assert_eq!(host.ships[&ME].target, Some(EntityId(2)));
        assert!(state.wake.is_scheduled());
    }

    #[test]
    fn cascade_weapon_puts_the_station_on_red_alert() {
        let (mut host, session, mut state) = station_setup();
        let event = GameEvent::CascadeWeaponDetected { weapon: EntityId(3) };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::StationCascadeWeaponDetected.respond(&mut ctx, &event);
        assert_eq!(host.ships[&ME].alert, AlertCondition::Red);
        assert!(state.wake.is_scheduled());
    }

    #[test]
    fn station_turns_on_a_direct_attacker() {
        let (mut host, session, mut state) = station_setup();
        host.ships.get_mut(&EntityId(2)).unwrap().target = Some(ME);
        let event = GameEvent::ShipBeingAttacked { whom: Some(EntityId(2)) };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::StationBeingAttacked.respond(&mut ctx, &event);

        let me = &host.ships[&ME];
        assert_eq!(me.alert, AlertCondition::Red);
        assert_eq!(me.target, Some(EntityId(2)));
        assert_eq!(me.defense_targets, vec![EntityId(2)]);
    }

    #[test]
    fn station_offence_is_punished_without_comment() {
        let (mut host, session, mut state) = station_setup();
        host.add_ship(ShipState::new(EntityId(5), "trader"));
        host.ships.get_mut(&EntityId(2)).unwrap().target = Some(EntityId(5));
        state.params.set(keys::MARK_OFFENDERS, true);
        let event = GameEvent::OffenceCommittedNearby {
            attacker: EntityId(2),
            victim: EntityId(5),
        };
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::StationOffenceCommittedNearby.respond(&mut ctx, &event);

        let me = &host.ships[&ME];
        assert_eq!(me.alert, AlertCondition::Red);
        assert_eq!(me.target, Some(EntityId(2)));
        assert_eq!(
            host.effects_of(ME),
            vec![ShipEffect::RaiseBounty {
                offender: EntityId(2),
                mask: 7,
            }]
        );
        assert!(host.messages_from(ME).is_empty());
    }

    #[test]
    fn mismatched_payload_is_ignored() {
        let (mut host, session, mut state) = setup();
        let mut ctx = AiContext::new(&mut host, &session, ME, &mut state);
        Response::WormholeSuggested.respond(&mut ctx, &GameEvent::EscortDock);
        assert!(host.commands.is_empty());
    }
}

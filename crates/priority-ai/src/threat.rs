//! Threat, odds and allegiance assessment.
//!
//! Everything here reads other entities through the host and treats a
//! vanished entity as absent. Values that are costly or that several
//! conditions consult in one pass go through the context caches.

use tracing::trace;

use crate::cache::{CacheKey, CacheValue};
use crate::comms::CommsPriority;
use crate::config::OddsThresholds;
use crate::context::AiContext;
use crate::host::{AlertCondition, Allegiance, EntityId, ScanClass, ShipEffect, ShipStatus};
use crate::params::keys;

/// Role categories the engine asks the host about.
pub mod categories {
    pub const PIRATE: &str = "pirate";
    pub const PIRATE_LEADER: &str = "pirate-leader";
    /// Ships pirates prey on.
    pub const PIRATE_VICTIM: &str = "pirate-victim";
    pub const ASSASSIN: &str = "assassin";
    pub const BOUNTY_HUNTER: &str = "bounty-hunter";
    pub const COURIER: &str = "courier";
    /// Roles the police side with when they are attacked.
    pub const POLICE_LIKE: &str = "police-like";
    /// Roles the police suspect on sight.
    pub const POLICE_DISLIKE: &str = "police-dislike";
}

/// Distance within which a neutral station counts as under the main
/// station's protection.
const AEGIS_RADIUS: f64 = 51_200.0;

/// Combat odds, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OddsClass {
    Terrible,
    Bad,
    Even,
    Good,
    Excellent,
}

impl OddsClass {
    /// Classifies an us/them ratio.
    ///
    /// A ship that surrenders early treats the `bad` threshold as terrible;
    /// one that surrenders late treats the `terrible` threshold as merely
    /// bad.
    pub fn classify(
        ratio: f64,
        odds: &OddsThresholds,
        surrenders_early: bool,
        surrenders_late: bool,
    ) -> Self {
        if ratio < Self::terrible_limit(odds, surrenders_early) {
            OddsClass::Terrible
        } else if ratio < Self::bad_limit(odds, surrenders_late) {
            OddsClass::Bad
        } else if ratio >= odds.excellent {
            OddsClass::Excellent
        } else if ratio >= odds.good {
            OddsClass::Good
        } else {
            OddsClass::Even
        }
    }

    pub fn terrible_limit(odds: &OddsThresholds, surrenders_early: bool) -> f64 {
        if surrenders_early { odds.bad } else { odds.terrible }
    }

    pub fn bad_limit(odds: &OddsThresholds, surrenders_late: bool) -> f64 {
        if surrenders_late { odds.terrible } else { odds.bad }
    }
}

/// Opening or follow-up attack message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPhase {
    Beginning,
    Continuing,
}

impl AttackPhase {
    fn key(self) -> &'static str {
        match self {
            AttackPhase::Beginning => "beginningAttack",
            AttackPhase::Continuing => "continuingAttack",
        }
    }
}

impl AiContext<'_> {
    /// Threat score of one entity. Stations count as 1 for ships that are
    /// willing to fight near them.
    pub fn threat_assessment(&self, id: EntityId, full: bool) -> f64 {
        let Some(ship) = self.ship(id) else {
            return 0.0;
        };
        if ship.is_station && self.params().flag(keys::FIGHTS_NEAR_HOSTILE_STATIONS) {
            return 1.0;
        }
        self.host().threat_assessment(id, full)
    }

    /// Ratio of friendly to hostile strength around the current target.
    /// 10 when there is no target. Computed at most once per pass.
    pub fn odds_assessment(&mut self) -> f64 {
        self.short_term(CacheKey::Odds, |ctx| ctx.compute_odds())
    }

    pub fn odds_class(&mut self) -> OddsClass {
        let ratio = self.odds_assessment();
        let early = self.params().flag(keys::SURRENDERS_EARLY);
        let late = self.params().flag(keys::SURRENDERS_LATE);
        OddsClass::classify(ratio, &self.config().odds, early, late)
    }

    pub fn combat_odds_terrible(&mut self) -> bool {
        let ratio = self.odds_assessment();
        let early = self.params().flag(keys::SURRENDERS_EARLY);
        ratio < OddsClass::terrible_limit(&self.config().odds, early)
    }

    pub fn combat_odds_bad(&mut self) -> bool {
        let ratio = self.odds_assessment();
        let late = self.params().flag(keys::SURRENDERS_LATE);
        ratio < OddsClass::bad_limit(&self.config().odds, late)
    }

    pub fn combat_odds_good(&mut self) -> bool {
        self.odds_assessment() >= self.config().odds.good
    }

    pub fn combat_odds_excellent(&mut self) -> bool {
        self.odds_assessment() >= self.config().odds.excellent
    }

    fn compute_odds(&mut self) -> f64 {
        let Some(target) = self.target() else {
            return 10.0;
        };
        let Some(target_position) = self.ship(target).map(|t| t.position) else {
            return 10.0;
        };
        let me = self.ship_id();
        let range = self.scanner_range();
        let near_target = |ctx: &Self, id: EntityId| {
            id != me
                && ctx
                    .ship(id)
                    .is_some_and(|s| s.position.distance(target_position) < range)
        };

        let mut allies = Vec::new();
        let my_group = self.me().and_then(|s| s.group);
        allies.extend(self.group_members());
        if let Some(leader_group) = self
            .leader()
            .and_then(|l| self.ship(l))
            .and_then(|l| l.group)
            .filter(|g| Some(*g) != my_group)
        {
            allies.extend(crate::group::live_members(self.host(), leader_group));
        }
        if self.me().and_then(|s| s.escort_group) != my_group {
            allies.extend(self.escort_members());
        }
        allies.sort();
        allies.dedup();

        let mut us = self.threat_assessment(me, true);
        for ally in allies {
            if near_target(self, ally) {
                us += self.threat_assessment(ally, true);
            }
        }

        // In combat the target is almost certainly fighting us; otherwise
        // the lighter non-combat score encourages pile-ons.
        let full = self.in_combat();
        let mut them = self.threat_assessment(target, full);
        let (target_group, target_escorts) = self
            .ship(target)
            .map_or((None, None), |t| (t.group, t.escort_group));
        let mut enemies = Vec::new();
        if let Some(g) = target_group {
            enemies.extend(crate::group::live_members(self.host(), g));
        }
        if target_escorts.is_some() && target_escorts != target_group {
            enemies.extend(
                target_escorts
                    .map(|g| crate::group::live_members(self.host(), g))
                    .unwrap_or_default(),
            );
        }
        enemies.sort();
        enemies.dedup();
        for enemy in enemies {
            if enemy != target && self.distance_to(enemy) < range {
                them += self.threat_assessment(enemy, full);
            }
        }

        let ratio = if them > 0.0 { us / them } else { 10.0 };
        trace!(target: "priority_ai::catalog", ship = %me, us, them, ratio, "odds assessed");
        ratio
    }

    /// Red alert. Leaving combat also forgets any pirate demand this ship
    /// already paid.
    pub fn in_combat(&mut self) -> bool {
        self.short_term(CacheKey::InCombat, |ctx| {
            let fighting = ctx.me().is_some_and(|s| s.alert == AlertCondition::Red);
            if !fighting && let Some(me) = ctx.me_mut() {
                me.paid_pirates = false;
            }
            fighting
        })
    }

    /// Speed the group can hold together at.
    pub fn cruise_speed(&mut self) -> f64 {
        self.long_term(CacheKey::CruiseSpeed, |ctx| {
            let max = ctx.max_speed();
            let ignore = max / 4.0;
            let mut cruise = max * 0.8;
            let mut grouped = false;

            let members = ctx.group_members();
            if members.len() > 1 {
                grouped = true;
            }
            for id in members.iter().rev() {
                let speed = ctx.ship(*id).map_or(max, |s| s.max_speed);
                if speed >= ignore && cruise > speed {
                    cruise = speed * 0.95;
                }
            }
            let escorts = ctx.escort_members();
            if escorts.len() > 1 {
                grouped = true;
            }
            for id in escorts.iter().rev() {
                let speed = ctx.ship(*id).map_or(max, |s| s.max_speed);
                if speed >= ignore && cruise > speed {
                    cruise = speed;
                }
            }
            if grouped { cruise } else { max }
        })
    }

    /// Bounty above which the police take an interest.
    pub fn fine_threshold(&mut self) -> f64 {
        self.long_term(CacheKey::FineThreshold, |ctx| {
            50.0 - f64::from(ctx.host().system().government) * 6.0
        })
    }

    /// Declared allegiance, or one inferred from the station's look.
    pub fn station_allegiance(&self, station: EntityId) -> Allegiance {
        let Some(s) = self.ship(station) else {
            return Allegiance::Neutral;
        };
        if let Some(allegiance) = s.allegiance {
            return allegiance;
        }
        let inferred = if s.is_main_station {
            Allegiance::Galcop
        } else if s.scan_class == ScanClass::Thargoid {
            Allegiance::Thargoid
        } else if matches!(s.scan_class, ScanClass::Military | ScanClass::Police) {
            Allegiance::Hunter
        } else if s.bounty > 0 {
            Allegiance::Pirate
        } else {
            Allegiance::Neutral
        };
        if inferred == Allegiance::Neutral {
            let main = self.host().system().main_station.and_then(|m| self.ship(m));
            if main.is_some_and(|m| m.position.distance(s.position) < AEGIS_RADIUS) {
                return Allegiance::Galcop;
            }
        }
        inferred
    }

    /// The station this ship calls home: its owner, or a station in its
    /// group, provided either is friendly.
    pub fn home_station(&mut self) -> Option<EntityId> {
        self.long_term(CacheKey::HomeStation, |ctx| {
            if let Some(owner) = ctx.me().and_then(|s| s.owner)
                && ctx.ship(owner).is_some_and(|o| o.is_station)
                && ctx.friendly_station(owner)
            {
                return Some(owner);
            }
            let me = ctx.ship_id();
            let members = ctx.group_members();
            members.into_iter().rev().find(|&id| {
                id != me && ctx.ship(id).is_some_and(|s| s.is_station) && ctx.friendly_station(id)
            })
        })
    }

    fn cached_home_station(&self) -> Option<EntityId> {
        self.state
            .long_term
            .get(CacheKey::HomeStation)
            .and_then(|v| v.as_entity())
            .flatten()
    }

    /// Whether this ship may dock at `station`.
    pub fn friendly_station(&mut self, station: EntityId) -> bool {
        let Some(s) = self.ship(station) else {
            return false;
        };
        if !s.is_in_space() {
            return false;
        }
        let shooting_at_me = s.target == Some(self.ship_id()) && s.has_hostile_target;
        if self.cached_home_station() == Some(station) {
            return !shooting_at_me;
        }
        let allegiance = self.station_allegiance(station);
        let Some(me) = self.me() else {
            return false;
        };
        let thargoid = me.scan_class == ScanClass::Thargoid;
        let (bounty, is_pirate) = (me.bounty, me.is_pirate);
        let refused = match allegiance {
            Allegiance::Thargoid => !thargoid,
            _ if thargoid => true,
            Allegiance::Hunter => bounty > 0,
            Allegiance::Galcop => f64::from(bounty) > self.fine_threshold() || is_pirate,
            Allegiance::Pirate => {
                bounty == 0 || self.host()
                    .in_role_category(self.ship_id(), categories::PIRATE_VICTIM)
            }
            Allegiance::Neutral => is_pirate,
            Allegiance::Restricted | Allegiance::Private => true,
            Allegiance::Chaotic => false,
        };
        !refused && !shooting_at_me
    }

    /// Whether `station` will shoot at this ship. Not the exact negation of
    /// [`friendly_station`](Self::friendly_station): neutral, chaotic and
    /// private stations are neither.
    pub fn hostile_station(&mut self, station: EntityId) -> bool {
        let Some(s) = self.ship(station) else {
            return false;
        };
        if !s.is_in_space() {
            return false;
        }
        let shooting_at_me = s.target == Some(self.ship_id()) && s.has_hostile_target;
        if self.cached_home_station() == Some(station) {
            return shooting_at_me;
        }
        let allegiance = self.station_allegiance(station);
        let Some(me) = self.me() else {
            return false;
        };
        let thargoid = me.scan_class == ScanClass::Thargoid;
        let (bounty, is_pirate) = (me.bounty, me.is_pirate);
        let hostile = match allegiance {
            Allegiance::Thargoid => !thargoid,
            _ if thargoid => true,
            Allegiance::Hunter => bounty > 0,
            Allegiance::Galcop => f64::from(bounty) > self.fine_threshold() || is_pirate,
            Allegiance::Pirate => {
                bounty == 0 || self.host()
                    .in_role_category(self.ship_id(), categories::PIRATE_VICTIM)
            }
            Allegiance::Restricted => true,
            Allegiance::Neutral | Allegiance::Chaotic | Allegiance::Private => false,
        };
        hostile || shooting_at_me
    }

    /// Whether two ships are on the same side: same group, escorts of the
    /// same formation, or both Thargoid or both police.
    pub fn allied(&self, a: EntityId, b: EntityId) -> bool {
        let (Some(first), Some(second)) = (self.ship(a), self.ship(b)) else {
            return false;
        };
        let host = self.host();
        let leader_group = |group| {
            host.group(group)
                .and_then(|g| g.leader)
                .and_then(|l| host.ship(l))
                .and_then(|l| l.group)
                .and_then(|g| host.group(g))
        };
        let g1 = first.group;
        let g2 = second.group;
        if g1.and_then(|g| host.group(g)).is_some_and(|g| g.contains(b)) {
            return true;
        }
        if g1.and_then(leader_group).is_some_and(|g| g.contains(b)) {
            return true;
        }
        if g2.and_then(leader_group).is_some_and(|g| g.contains(a)) {
            return true;
        }
        let second_leader = g2.and_then(|g| host.group(g)).and_then(|g| g.leader);
        if let Some(other_leader) = second_leader
            && g1.and_then(leader_group).is_some_and(|g| g.contains(other_leader))
        {
            return true;
        }
        matches!(first.scan_class, ScanClass::Thargoid | ScanClass::Police)
            && first.scan_class == second.scan_class
    }

    /// Hostile and not running away. The player is assumed hostile unless
    /// fleeing.
    pub fn is_aggressive(&self, id: EntityId) -> bool {
        self.ship(id).is_some_and(|s| {
            if s.is_player {
                !s.is_fleeing
            } else {
                s.has_hostile_target && !s.is_fleeing && !s.is_derelict
            }
        })
    }

    pub fn is_fighting(&self, id: EntityId) -> bool {
        self.ship(id).is_some_and(|s| {
            if s.is_player {
                !s.is_fleeing
            } else {
                s.target.is_some() && s.has_hostile_target
            }
        })
    }

    /// A harmless ship that is far away and outrunning us.
    pub fn is_escaping(&self, id: EntityId) -> bool {
        if self.params().flag(keys::CONTINUE_UNLIKELY_PURSUITS) {
            return false;
        }
        let Some(other) = self.ship(id) else {
            return false;
        };
        let (max, speed) = self.me().map_or((0.0, 0.0), |s| (s.max_speed, s.speed));
        !self.is_aggressive(id)
            && self.distance_to(id) > 15_000.0
            && other.speed > max
            && other.speed > speed
    }

    /// Tells the current target we are about to switch to `whom`.
    pub fn note_distraction(&mut self, whom: EntityId) {
        if let Some(target) = self.target() {
            self.effect(ShipEffect::NotifyDistraction { target, by: whom });
        }
    }

    /// Searches the last scan for an entity matching `predicate`, storing
    /// the match as the specific scan result.
    ///
    /// The current target wins if it matches. Otherwise the search starts at
    /// a random offset so that ships scanning together spread their picks.
    /// Ships still exiting witchspace are passed over, with a reconsideration
    /// requested shortly.
    pub fn check_scanner_with(
        &mut self,
        mut predicate: impl FnMut(&mut Self, EntityId) -> bool,
    ) -> bool {
        let Some(scan) = self.params().entities(keys::SCAN_RESULTS).map(<[_]>::to_vec) else {
            return false;
        };
        if let Some(target) = self.target()
            && predicate(self, target)
        {
            self.params_mut().set(keys::SCAN_RESULT_SPECIFIC, target);
            return true;
        }
        if scan.is_empty() {
            return false;
        }
        let offset = (self.random() * scan.len() as f64) as usize;
        for i in 0..scan.len() {
            let id = scan[(i + offset) % scan.len()];
            let Some(status) = self.ship(id).map(|s| s.status) else {
                continue;
            };
            if !predicate(self, id) {
                continue;
            }
            if status == ShipStatus::ExitingWitchspace {
                self.reconsider_in(5.0);
                continue;
            }
            self.params_mut().set(keys::SCAN_RESULT_SPECIFIC, id);
            return true;
        }
        false
    }

    /// Announces an attack on `target`, with Thargoid and inanimate variants.
    pub fn broadcast_attack_message(
        &mut self,
        target: EntityId,
        phase: AttackPhase,
        priority: CommsPriority,
    ) -> bool {
        let suffix = match self.ship(target).map(|t| t.scan_class) {
            Some(ScanClass::Thargoid) => "Thargoid",
            Some(class) if class.is_inanimate() => "Inanimate",
            _ => "",
        };
        let key = format!("{}{}", phase.key(), suffix);
        self.communicate(&key, target, priority)
    }

    /// Broadcasts a distress call, at most once per long-term window.
    pub fn broadcast_distress_message(&mut self) {
        let already = self.long_term(CacheKey::SentDistress, |_| false);
        if already {
            return;
        }
        self.state
            .long_term
            .insert(CacheKey::SentDistress, CacheValue::Flag(true));
        self.effect(ShipEffect::BroadcastDistress);
        if let Some(aggressor) = self.me().and_then(|s| s.aggressor) {
            self.communicate("makeDistressCall", aggressor, CommsPriority::NotAfterSending);
        }
    }

    /// Thargoids take priority over any other enemy. Returns false when the
    /// ship is flagged to treat them like anyone else.
    ///
    /// `pass_on` also notifies the old target and calls the group in.
    pub fn respond_to_thargoids(&mut self, whom: EntityId, pass_on: bool) -> bool {
        if self.params().flag(keys::NO_SPECIAL_THARGOID_REACTION) {
            return false;
        }
        let current_is_thargoid = self
            .target()
            .and_then(|t| self.ship(t))
            .map(|t| t.scan_class == ScanClass::Thargoid);
        if current_is_thargoid == Some(false) {
            if pass_on {
                self.note_distraction(whom);
            }
            self.set_target(Some(whom));
            if pass_on {
                self.effect(ShipEffect::RequestHelpFromGroup);
                self.communicate("thargoidAttack", whom, CommsPriority::NotAfterSending);
            }
        }
        for id in self.defense_targets() {
            let keep = self.ship(id).is_some_and(|s| {
                matches!(s.scan_class, ScanClass::Thargoid | ScanClass::Missile | ScanClass::Mine)
            });
            if !keep {
                self.remove_defense_target(id);
            }
        }
        true
    }
}

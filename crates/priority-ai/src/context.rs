//! The blackboard every rule runs against.
//!
//! An [`AiContext`] is built for one reconsideration pass or one event
//! dispatch. It borrows the host, the session and the controller's own
//! state, and exposes the helpers conditions, configurations, behaviours
//! and responses share: scheduling, caching, communications and safe
//! lookups of other entities.
//!
//! Handler changes requested through [`AiContext::install_handlers`] are
//! collected here and applied by the controller once the pass ends.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::cache::{CacheKey, CacheValue, Cached, LongTermCache, ShortTermCache};
use crate::comms::{CommsIdentity, CommsLog, CommsParams, CommsPriority};
use crate::config::AiConfig;
use crate::group;
use crate::handlers::HandlerSet;
use crate::host::{
    EntityId, GroupState, Host, ScheduledAction, ShipCommand, ShipEffect, ShipState, Vector,
};
use crate::params::{ParameterStore, keys};
use crate::responses::Response;
use crate::scheduler::WakeSchedule;
use crate::session::AiSession;

pub use priority_tree::EvalMode as EngineMode;

/// What a message is about.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Subject {
    #[default]
    None,
    /// Contributes the entity's name and class.
    Entity(EntityId),
    Params(CommsParams),
}

impl From<EntityId> for Subject {
    fn from(id: EntityId) -> Self {
        Subject::Entity(id)
    }
}

impl From<Option<EntityId>> for Subject {
    fn from(id: Option<EntityId>) -> Self {
        id.map_or(Subject::None, Subject::Entity)
    }
}

impl From<CommsParams> for Subject {
    fn from(params: CommsParams) -> Self {
        Subject::Params(params)
    }
}

/// Everything a controller keeps between passes.
#[derive(Debug)]
pub(crate) struct ControllerState {
    pub(crate) params: ParameterStore,
    pub(crate) short_term: ShortTermCache,
    pub(crate) long_term: LongTermCache,
    pub(crate) wake: WakeSchedule,
    pub(crate) mode: EngineMode,
    pub(crate) comms: CommsIdentity,
    pub(crate) comms_log: CommsLog,
    pub(crate) behaviour_logging: bool,
    pub(crate) rng: SmallRng,
}

impl ControllerState {
    pub(crate) fn new(ship: EntityId, mode: EngineMode) -> Self {
        Self {
            params: ParameterStore::new(),
            short_term: ShortTermCache::default(),
            long_term: LongTermCache::default(),
            wake: WakeSchedule::new(),
            mode,
            comms: CommsIdentity::default(),
            comms_log: CommsLog::default(),
            behaviour_logging: false,
            rng: SmallRng::seed_from_u64(u64::from(ship.0)),
        }
    }

    /// Wakes shortly after `now`. The priority engine only ever brings the
    /// wake time forward; the legacy engine overwrites it.
    pub(crate) fn reconsider_now(&mut self, now: f64, config: &AiConfig) {
        match self.mode {
            EngineMode::Priority => {
                self.wake.tighten(now, config.reconsider_now_delay);
            }
            EngineMode::Legacy => self.wake.replace(now, config.legacy_reconsider_now_delay),
        }
    }

    /// Requests shorter than the configured minimum are ignored.
    pub(crate) fn reconsider_in(&mut self, now: f64, delay: f64, config: &AiConfig) {
        if delay < config.min_reconsider_delay {
            return;
        }
        match self.mode {
            EngineMode::Priority => {
                self.wake.tighten(now, delay);
            }
            EngineMode::Legacy => self.wake.replace(now, delay),
        }
    }
}

pub struct AiContext<'a> {
    pub(crate) host: &'a mut dyn Host,
    pub(crate) session: &'a AiSession,
    pub(crate) ship: EntityId,
    pub(crate) state: &'a mut ControllerState,
    pub(crate) handler_request: Option<HandlerSet>,
}

impl<'a> AiContext<'a> {
    pub(crate) fn new(
        host: &'a mut dyn Host,
        session: &'a AiSession,
        ship: EntityId,
        state: &'a mut ControllerState,
    ) -> Self {
        Self {
            host,
            session,
            ship,
            state,
            handler_request: None,
        }
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    /// The entity this context decides for.
    pub fn ship_id(&self) -> EntityId {
        self.ship
    }

    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    pub fn host_mut(&mut self) -> &mut dyn Host {
        &mut *self.host
    }

    pub fn session(&self) -> &'a AiSession {
        self.session
    }

    pub fn config(&self) -> &'a AiConfig {
        self.session.config()
    }

    pub fn now(&self) -> f64 {
        self.host.now()
    }

    pub fn me(&self) -> Option<&ShipState> {
        self.host.ship(self.ship)
    }

    pub fn me_mut(&mut self) -> Option<&mut ShipState> {
        self.host.ship_mut(self.ship)
    }

    /// Another entity, if it still exists.
    pub fn ship(&self, id: EntityId) -> Option<&ShipState> {
        self.host.ship(id)
    }

    pub fn params(&self) -> &ParameterStore {
        &self.state.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.state.params
    }

    pub fn mode(&self) -> EngineMode {
        self.state.mode
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.state.rng
    }

    /// Uniform in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.state.rng.gen_range(0.0..1.0)
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        self.state.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Asks for a reconsideration as soon as state has settled.
    pub fn reconsider_now(&mut self) {
        let now = self.now();
        self.state.reconsider_now(now, self.session.config());
    }

    /// Asks for a reconsideration `delay` seconds from now. Requests
    /// shorter than the configured minimum are ignored.
    pub fn reconsider_in(&mut self, delay: f64) {
        let now = self.now();
        self.state.reconsider_in(now, delay, self.session.config());
    }

    /// Cancels any scheduled reconsideration.
    pub fn clear_wake(&mut self) {
        self.state.wake.clear();
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Requests `set` as the handler table once this pass ends. The last
    /// request in a pass wins.
    pub fn install_handlers(&mut self, set: HandlerSet) {
        self.handler_request = Some(set);
    }

    /// The standard handler set, in its witchspace pursuit variant when the
    /// ship is flagged for it.
    pub fn standard_handlers(&self) -> HandlerSet {
        Response::standard(self.params().flag(keys::WITCHSPACE_PURSUIT))
    }

    // ------------------------------------------------------------------
    // Communications
    // ------------------------------------------------------------------

    /// Sends a templated message if rate limits allow. Returns whether a
    /// message went out.
    pub fn communicate(
        &mut self,
        key: &str,
        subject: impl Into<Subject>,
        priority: CommsPriority,
    ) -> bool {
        let session = self.session;
        if session.comms_suppressed() {
            return false;
        }
        let now = self.now();
        let config = session.config();
        if !self.state.comms_log.allows(
            priority,
            now,
            config.comms_short_window,
            config.comms_long_window,
        ) {
            return false;
        }
        let Some(template) = session.comms().get_communication(
            &self.state.comms.role,
            &self.state.comms.personality,
            key,
        ) else {
            return false;
        };
        let params = match subject.into() {
            Subject::None => CommsParams::new(),
            Subject::Params(params) => params,
            Subject::Entity(id) => self.entity_comms_params(id),
        };
        let message = template.render(key, &params);
        if message.is_empty() {
            debug!(target: "priority_ai::comms", ship = %self.ship, key, "empty message");
            return false;
        }
        self.host.comms_message(self.ship, &message);
        self.state.comms_log.note_sent(now);
        debug!(target: "priority_ai::comms", ship = %self.ship, key, %message, "sent");
        true
    }

    pub fn note_comms_heard(&mut self) {
        let now = self.now();
        self.state.comms_log.note_heard(now);
    }

    /// Name and class of `id` for message expansion.
    pub fn entity_comms_params(&self, id: EntityId) -> CommsParams {
        let mut params = CommsParams::new();
        if let Some(other) = self.ship(id) {
            params.insert(keys::ENTITY_NAME.to_string(), other.name.clone());
            params.insert(keys::ENTITY_CLASS.to_string(), other.class_name.clone());
        }
        params
    }

    // ------------------------------------------------------------------
    // Host calls
    // ------------------------------------------------------------------

    pub fn command(&mut self, command: ShipCommand) {
        self.host.command(self.ship, command);
    }

    pub fn effect(&mut self, effect: ShipEffect) {
        self.host.effect(self.ship, effect);
    }

    pub fn schedule(&mut self, delay: f64, action: ScheduledAction) {
        self.host.schedule(self.ship, delay, action);
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    pub fn position(&self) -> Vector {
        self.me().map_or(Vector::ZERO, |s| s.position)
    }

    /// Distance to another entity; infinite if either side is gone.
    pub fn distance_to(&self, id: EntityId) -> f64 {
        match (self.me(), self.ship(id)) {
            (Some(me), Some(other)) => me.position.distance(other.position),
            _ => f64::INFINITY,
        }
    }

    pub fn distance_to_point(&self, point: Vector) -> f64 {
        self.me()
            .map_or(f64::INFINITY, |me| me.position.distance(point))
    }

    pub fn scanner_range(&self) -> f64 {
        self.me().map_or(0.0, |s| s.scanner_range)
    }

    pub fn max_speed(&self) -> f64 {
        self.me().map_or(0.0, |s| s.max_speed)
    }

    // ------------------------------------------------------------------
    // Flight controls
    // ------------------------------------------------------------------

    pub fn set_destination(&mut self, destination: Vector) {
        if let Some(me) = self.me_mut() {
            me.destination = destination;
        }
    }

    pub fn set_desired_range(&mut self, range: f64) {
        if let Some(me) = self.me_mut() {
            me.desired_range = range;
        }
    }

    pub fn set_desired_speed(&mut self, speed: f64) {
        if let Some(me) = self.me_mut() {
            me.desired_speed = speed;
        }
    }

    /// Destination, range and speed in one go.
    pub fn set_course(&mut self, destination: Vector, range: f64, speed: f64) {
        if let Some(me) = self.me_mut() {
            me.destination = destination;
            me.desired_range = range;
            me.desired_speed = speed;
        }
    }

    pub fn fly_to_range(&mut self) {
        self.command(ShipCommand::FlyToRangeFromDestination);
    }

    // ------------------------------------------------------------------
    // Targeting
    // ------------------------------------------------------------------

    /// The current target, if it still exists.
    pub fn target(&self) -> Option<EntityId> {
        let target = self.me()?.target?;
        self.ship(target).map(|_| target)
    }

    pub fn set_target(&mut self, target: Option<EntityId>) {
        if let Some(me) = self.me_mut() {
            me.target = target;
        }
    }

    pub fn has_hostile_target(&self) -> bool {
        self.me().is_some_and(|s| s.has_hostile_target) && self.target().is_some()
    }

    pub fn add_defense_target(&mut self, other: EntityId) {
        if let Some(me) = self.me_mut() {
            me.add_defense_target(other);
        }
    }

    pub fn remove_defense_target(&mut self, other: EntityId) {
        if let Some(me) = self.me_mut() {
            me.remove_defense_target(other);
        }
    }

    /// Defense targets that still exist.
    pub fn defense_targets(&self) -> Vec<EntityId> {
        self.me()
            .map(|s| {
                s.defense_targets
                    .iter()
                    .copied()
                    .filter(|&id| self.ship(id).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub fn group(&self) -> Option<&GroupState> {
        self.host.group(self.me()?.group?)
    }

    pub fn escort_group(&self) -> Option<&GroupState> {
        self.host.group(self.me()?.escort_group?)
    }

    /// Live leader of this ship's group.
    pub fn leader(&self) -> Option<EntityId> {
        group::live_leader(&*self.host, self.me()?.group?)
    }

    /// Live members of this ship's group, self included.
    pub fn group_members(&self) -> Vec<EntityId> {
        self.me()
            .and_then(|s| s.group)
            .map(|g| group::live_members(&*self.host, g))
            .unwrap_or_default()
    }

    pub fn escort_members(&self) -> Vec<EntityId> {
        self.me()
            .and_then(|s| s.escort_group)
            .map(|g| group::live_members(&*self.host, g))
            .unwrap_or_default()
    }

    /// Leaves the current group, and the leader's escort group if in it.
    pub fn leave_group(&mut self) {
        let Some(me) = self.me() else { return };
        let Some(group) = me.group else { return };
        let escort_group = self
            .leader()
            .and_then(|l| self.ship(l))
            .and_then(|l| l.escort_group);
        if let Some(escorts) = escort_group.and_then(|g| self.host.group_mut(g)) {
            escorts.remove(self.ship);
        }
        if let Some(g) = self.host.group_mut(group) {
            g.remove(self.ship);
        }
        if let Some(me) = self.me_mut() {
            me.group = None;
        }
    }

    // ------------------------------------------------------------------
    // Caches
    // ------------------------------------------------------------------

    /// Returns the short-term value for `key`, computing it on first use
    /// within this pass.
    pub(crate) fn short_term<T: Cached>(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce(&mut Self) -> T,
    ) -> T {
        if let Some(value) = self.state.short_term.get(key).and_then(T::from_value) {
            return value;
        }
        let value = compute(self);
        self.state.short_term.insert(key, value.into_value());
        value
    }

    /// Long-term counterpart of [`short_term`](Self::short_term).
    pub(crate) fn long_term<T: Cached>(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce(&mut Self) -> T,
    ) -> T {
        if let Some(value) = self.state.long_term.get(key).and_then(T::from_value) {
            return value;
        }
        let value = compute(self);
        self.state.long_term.insert(key, value.into_value());
        value
    }

    /// The nearest station. A found station is kept for the long-term
    /// window; finding none is never cached, so a station that appears later
    /// in the window is picked up on the next call.
    pub fn nearest_station(&mut self) -> Option<EntityId> {
        if let Some(CacheValue::Entity(Some(station))) =
            self.state.long_term.get(CacheKey::NearestStation)
        {
            return Some(station);
        }
        let stations = self.host.stations();
        let nearest = stations
            .into_iter()
            .filter(|&s| s != self.ship)
            .map(|s| (self.distance_to(s), s))
            .filter(|(d, _)| d.is_finite())
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, s)| s);
        if let Some(station) = nearest {
            self.state
                .long_term
                .insert(CacheKey::NearestStation, CacheValue::Entity(Some(station)));
        }
        nearest
    }
}

impl priority_tree::EvalContext for AiContext<'_> {
    fn reconsider_in(&mut self, seconds: f64) {
        AiContext::reconsider_in(self, seconds);
    }

    fn behaviour_logging(&self) -> bool {
        self.state.behaviour_logging || self.state.params.flag(keys::LOGGING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::CommsRegistry;
    use crate::host::InMemoryHost;

    fn setup() -> (InMemoryHost, AiSession, ControllerState) {
        let mut host = InMemoryHost::new();
        host.add_ship(ShipState::new(EntityId(1), "trader"));
        let mut registry = CommsRegistry::new();
        registry.set_communication("generic", "generic", "hello", "Hello, [ai_entity_name].");
        registry.set_communication("generic", "generic", "silent", "");
        let session = AiSession::with_registry(AiConfig::default(), registry);
        (host, session, ControllerState::new(EntityId(1), EngineMode::Priority))
    }

    #[test]
    fn reconsider_now_tightens_in_priority_mode() {
        let (mut host, session, mut state) = setup();
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        ctx.reconsider_in(30.0);
        ctx.reconsider_now();
        ctx.reconsider_in(5.0);
        assert!((state.wake.wake_time() - 1_000.1).abs() < 1e-9);
    }

    #[test]
    fn legacy_mode_replaces_wake_time() {
        let (mut host, session, _) = setup();
        let mut state = ControllerState::new(EntityId(1), EngineMode::Legacy);
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        ctx.reconsider_now();
        ctx.reconsider_in(30.0);
        assert_eq!(state.wake.wake_time(), 1_030.0);
    }

    #[test]
    fn tiny_delays_are_ignored() {
        let (mut host, session, mut state) = setup();
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        ctx.reconsider_in(0.05);
        assert!(!state.wake.is_scheduled());
    }

    #[test]
    fn short_term_value_is_computed_once() {
        let (mut host, session, mut state) = setup();
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        let mut calls = 0;
        let first = ctx.short_term(CacheKey::Odds, |_| {
            calls += 1;
            2.5
        });
        let second = ctx.short_term(CacheKey::Odds, |_| {
            calls += 1;
            9.0
        });
        assert_eq!((first, second, calls), (2.5, 2.5, 1));
    }

    #[test]
    fn communicate_expands_entity_and_respects_empty_templates() {
        let (mut host, session, mut state) = setup();
        let mut other = ShipState::new(EntityId(2), "pirate");
        other.name = "Krait".into();
        host.add_ship(other);
        {
            let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
            assert!(!ctx.communicate("silent", Subject::None, CommsPriority::Always));
            assert!(ctx.communicate("hello", EntityId(2), CommsPriority::Always));
            assert!(!ctx.communicate("missing", Subject::None, CommsPriority::Always));
        }
        assert_eq!(host.messages_from(EntityId(1)), vec!["Hello, Krait."]);
        assert_eq!(state.comms_log.last_sent, Some(1_000.0));
    }

    #[test]
    fn comms_are_muted_during_witchspace() {
        let (mut host, mut session, mut state) = setup();
        session.witchspace_started();
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        assert!(!ctx.communicate("hello", Subject::None, CommsPriority::Always));
    }

    #[test]
    fn missing_station_is_looked_up_again() {
        let (mut host, session, mut state) = setup();
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        assert_eq!(ctx.nearest_station(), None);
        drop(ctx);

        let station = ShipState::station(EntityId(9), crate::host::Allegiance::Galcop)
            .at(Vector::new(0.0, 0.0, 5_000.0));
        host.add_ship(station);
        host.advance(10.0);
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        assert_eq!(ctx.nearest_station(), Some(EntityId(9)));
    }

    #[test]
    fn found_station_is_kept_for_the_window() {
        let (mut host, session, mut state) = setup();
        host.add_ship(
            ShipState::station(EntityId(9), crate::host::Allegiance::Galcop)
                .at(Vector::new(0.0, 0.0, 5_000.0)),
        );
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        assert_eq!(ctx.nearest_station(), Some(EntityId(9)));
        drop(ctx);

        host.add_ship(
            ShipState::station(EntityId(10), crate::host::Allegiance::Galcop)
                .at(Vector::new(0.0, 0.0, 1_000.0)),
        );
        let mut ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        assert_eq!(ctx.nearest_station(), Some(EntityId(9)));
    }

    #[test]
    fn vanished_entities_are_infinitely_far() {
        let (mut host, session, mut state) = setup();
        let ctx = AiContext::new(&mut host, &session, EntityId(1), &mut state);
        assert_eq!(ctx.distance_to(EntityId(42)), f64::INFINITY);
    }
}

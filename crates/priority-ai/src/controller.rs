//! One entity's decision engine.
//!
//! A [`Controller`] owns everything an entity's AI keeps between calls: the
//! active tree, the parameter store, both caches, the wake time and the
//! installed handlers. The host drives it in three ways:
//!
//! 1. [`Controller::tick`] whenever simulation time advances, which runs a
//!    reconsideration once the wake time has passed
//! 2. [`Controller::dispatch`] for each game event addressed to the entity
//! 3. the authoring calls (`set_priorities`, `set_parameter`, ...)
//!
//! # Example
//!
//! ```rust,ignore
//! let session = AiSession::start(AiConfig::default())?;
//! let mut ai = Controller::new(ship);
//! ai.set_priorities(&host, roles::trader(), None)?;
//! loop {
//!     host.step();
//!     ai.tick(&mut host, &session)?;
//! }
//! ```

use priority_tree::Evaluator;
use rand::Rng;
use tracing::{debug, error, info, trace};

use crate::catalog::{AiTree, Behaviour};
use crate::comms::CommsPriority;
use crate::context::{AiContext, ControllerState, EngineMode, Subject};
use crate::error::{AiError, Result};
use crate::events::GameEvent;
use crate::handlers::{HandlerDiff, HandlerManager, HandlerSet};
use crate::host::{EntityId, Host};
use crate::params::{Param, ParameterStore, keys};
use crate::responses::Response;
use crate::session::AiSession;
use crate::waypoints::WaypointGenerator;

#[derive(Debug)]
pub struct Controller {
    ship: EntityId,
    tree: Option<AiTree>,
    state: ControllerState,
    handlers: HandlerManager,
    failures: u64,
    torn_down: bool,
}

impl Controller {
    /// A controller for `ship` running the priority engine.
    pub fn new(ship: EntityId) -> Self {
        Self::with_mode(ship, EngineMode::Priority)
    }

    pub fn with_mode(ship: EntityId, mode: EngineMode) -> Self {
        Self {
            ship,
            tree: None,
            state: ControllerState::new(ship, mode),
            handlers: HandlerManager::new(),
            failures: 0,
            torn_down: false,
        }
    }

    pub fn ship(&self) -> EntityId {
        self.ship
    }

    pub fn mode(&self) -> EngineMode {
        self.state.mode
    }

    pub fn priorities(&self) -> Option<&AiTree> {
        self.tree.as_ref()
    }

    pub fn handlers(&self) -> &HandlerManager {
        &self.handlers
    }

    /// How many passes ended with every priority failing.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // ------------------------------------------------------------------
    // Authoring API
    // ------------------------------------------------------------------

    /// Installs `tree` and schedules the first reconsideration after
    /// `delay` seconds, or a random offset below one second so that ships
    /// created together do not all think on the same tick.
    pub fn set_priorities(
        &mut self,
        host: &dyn Host,
        tree: AiTree,
        delay: Option<f64>,
    ) -> Result<()> {
        self.ensure_alive()?;
        if !tree.has_fallback() {
            debug!(
                target: "priority_ai::controller",
                ship = %self.ship,
                tree = tree.label(),
                "tree has no unconditional fallback"
            );
        }
        self.tree = Some(tree);
        self.handlers.clear();
        let role = role_of(host, self.ship);
        self.install(&HandlerSet::new(), &role);

        let delay = match delay {
            Some(d) if d > 0.0 => d,
            _ => self.state.rng.gen_range(0.0..1.0),
        };
        let now = host.now();
        match self.state.mode {
            EngineMode::Priority => {
                self.state.wake.tighten(now, delay);
            }
            EngineMode::Legacy => self.state.wake.replace(now, delay),
        }
        Ok(())
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<Param>) {
        self.state.params.set(key, value);
    }

    pub fn parameter(&self, key: &str) -> Option<&Param> {
        self.state.params.get(key)
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.state.params
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.state.params
    }

    pub fn set_waypoint_generator(&mut self, generator: WaypointGenerator) {
        self.state.params.set(keys::WAYPOINT_GENERATOR, generator);
    }

    pub fn set_behaviour_logging(&mut self, enabled: bool) {
        self.state.behaviour_logging = enabled;
    }

    pub fn set_communications_role(&mut self, role: impl Into<String>) {
        self.state.comms.role = role.into();
    }

    pub fn set_communications_personality(&mut self, personality: impl Into<String>) {
        self.state.comms.personality = personality.into();
    }

    pub fn communications_role(&self) -> &str {
        &self.state.comms.role
    }

    pub fn communications_personality(&self) -> &str {
        &self.state.comms.personality
    }

    /// Sends a templated message on behalf of the entity. Returns whether
    /// anything was sent.
    pub fn communicate(
        &mut self,
        host: &mut dyn Host,
        session: &AiSession,
        key: &str,
        subject: impl Into<Subject>,
        priority: CommsPriority,
    ) -> Result<bool> {
        self.ensure_alive()?;
        let mut ctx = AiContext::new(host, session, self.ship, &mut self.state);
        Ok(ctx.communicate(key, subject, priority))
    }

    /// Records that a message from another entity was heard.
    pub fn note_comms_heard(&mut self, host: &dyn Host) {
        self.state.comms_log.note_heard(host.now());
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    pub fn reconsider_now(&mut self, host: &dyn Host, session: &AiSession) {
        self.state.reconsider_now(host.now(), session.config());
    }

    pub fn reconsider_in(&mut self, host: &dyn Host, session: &AiSession, delay: f64) {
        self.state.reconsider_in(host.now(), delay, session.config());
    }

    /// Zero when nothing is scheduled.
    pub fn wake_time(&self) -> f64 {
        self.state.wake.wake_time()
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.state.wake.is_due(now)
    }

    /// Reconsiders if the wake time has passed. Returns the behaviour run,
    /// if any.
    pub fn tick(&mut self, host: &mut dyn Host, session: &AiSession) -> Result<Option<Behaviour>> {
        self.ensure_alive()?;
        if !self.state.wake.is_due(host.now()) {
            return Ok(None);
        }
        self.reconsider(host, session)
    }

    /// Runs one reconsideration pass now, regardless of the wake time.
    pub fn reconsider(
        &mut self,
        host: &mut dyn Host,
        session: &AiSession,
    ) -> Result<Option<Behaviour>> {
        self.ensure_alive()?;
        // The wake that brought us here is spent.
        self.state.wake.clear();

        let Some(tree) = self.tree.clone() else {
            return Ok(None);
        };
        let Some(me) = host.ship(self.ship) else {
            return Ok(None);
        };
        if !me.is_in_space() {
            trace!(target: "priority_ai::controller", ship = %self.ship, status = %me.status, "not in space");
            return Ok(None);
        }
        let role = me.primary_role.clone();
        let name = me.name.clone();

        let now = host.now();
        self.state.short_term.clear();
        self.state
            .long_term
            .refresh(now, session.config().long_term_window);

        let mode = self.state.mode;
        let (chosen, request) = {
            let mut ctx = AiContext::new(host, session, self.ship, &mut self.state);
            ctx.nearest_station();
            let chosen = Evaluator::new(mode).evaluate(&tree, &mut ctx);
            if let Some(behaviour) = chosen {
                if priority_tree::EvalContext::behaviour_logging(&ctx) {
                    debug!(
                        target: "priority_ai::controller",
                        ship = %self.ship,
                        ?behaviour,
                        "running behaviour"
                    );
                }
                behaviour.run(&mut ctx);
            }
            (chosen, ctx.handler_request.take())
        };

        let Some(behaviour) = chosen else {
            self.failures += 1;
            error!(
                target: "priority_ai::controller",
                ship = %self.ship,
                name = %name,
                role = %role,
                tree = tree.label(),
                "AI had all priorities fail; keeping last command"
            );
            return Ok(None);
        };
        if let Some(set) = request {
            self.install(&set, &role);
        }
        Ok(Some(behaviour))
    }

    /// Routes `event` to its installed response. Events without a binding
    /// are ignored.
    pub fn dispatch(
        &mut self,
        host: &mut dyn Host,
        session: &AiSession,
        event: &GameEvent,
    ) -> Result<()> {
        self.ensure_alive()?;
        let kind = event.kind();
        let Some(response) = self.handlers.response_for(kind) else {
            trace!(target: "priority_ai::controller", ship = %self.ship, event = %kind, "unhandled");
            return Ok(());
        };
        match response {
            Response::Teardown => {
                self.cleanup();
                Ok(())
            }
            Response::Reconsider => self.reconsider(host, session).map(|_| ()),
            other => {
                let request = {
                    let mut ctx = AiContext::new(host, session, self.ship, &mut self.state);
                    other.respond(&mut ctx, event);
                    ctx.handler_request.take()
                };
                if let Some(set) = request {
                    let role = role_of(host, self.ship);
                    self.install(&set, &role);
                }
                Ok(())
            }
        }
    }

    /// Tears the controller down. The wake time and handlers go first so
    /// nothing can call back in while the rest is dropped.
    pub fn cleanup(&mut self) {
        if self.torn_down {
            return;
        }
        self.state.wake.clear();
        self.handlers.clear();
        self.state.params.clear();
        self.state.short_term.clear();
        self.state.long_term.clear();
        self.tree = None;
        self.torn_down = true;
        info!(target: "priority_ai::controller", ship = %self.ship, "controller torn down");
    }

    fn install(&mut self, set: &HandlerSet, role: &str) -> HandlerDiff {
        match self.state.mode {
            EngineMode::Priority => self.handlers.apply(set, role),
            EngineMode::Legacy => self.handlers.replace_all(set, role),
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.torn_down {
            return Err(AiError::TornDown);
        }
        Ok(())
    }
}

fn role_of(host: &dyn Host, ship: EntityId) -> String {
    host.ship(ship)
        .map(|s| s.primary_role.clone())
        .unwrap_or_default()
}

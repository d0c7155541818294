//! The rule vocabulary trees are written in.
//!
//! Three enums cover the node-function categories:
//!
//! - [`Cond`]: predicates, evaluated through [`priority_tree::Condition`]
//! - [`Setup`]: configuration steps, through [`priority_tree::Configuration`]
//! - [`Behaviour`]: terminal actions, run once by the controller after a
//!   tree yields them
//!
//! Ships, missiles, stations and thargons all draw on the same vocabulary;
//! station rules are prefixed `Station`.
//!
//! Each enum carries a `Custom(RuleId)` variant for rules registered in the
//! session's [`RuleTable`](crate::rules::RuleTable), so the vocabulary stays
//! open without dispatching on strings.
//!
//! # Example
//!
//! ```rust,ignore
//! use priority_ai::catalog::{AiNode, AiTree, Behaviour, Cond, Setup};
//! use priority_tree::{fallback, when};
//!
//! let tree = AiTree::new("trader", vec![
//!     when(Cond::LosingCombat, Behaviour::FleeCombat).reconsider(5.0),
//!     AiNode::new()
//!         .when(Cond::HasSelectedStation)
//!         .configure(Setup::SetSelectedStationForDocking)
//!         .behaviour(Behaviour::DockWithStation)
//!         .reconsider(5.0),
//!     fallback(Behaviour::Idle),
//! ]);
//! ```

mod behaviours;
mod conditions;
mod configurations;

pub use behaviours::Behaviour;
pub use conditions::Cond;
pub use configurations::Setup;

use priority_tree::{PriorityNode, PriorityTree};

use crate::context::AiContext;
use crate::host::{AlertCondition, Body, EntityId, Vector};
use crate::params::keys;

pub type AiNode = PriorityNode<Cond, Setup, Behaviour>;
pub type AiTree = PriorityTree<Cond, Setup, Behaviour>;

/// Where ships arrive from witchspace.
pub const WITCHPOINT: Vector = Vector::ZERO;

/// Main planet and every other planet the host reports.
pub(crate) fn planets(ctx: &AiContext<'_>) -> Vec<Body> {
    let system = ctx.host().system();
    let mut all: Vec<Body> = system.main_planet.into_iter().collect();
    all.extend(
        system
            .planets
            .iter()
            .copied()
            .filter(|p| Some(p.id) != system.main_planet.map(|m| m.id)),
    );
    all
}

/// The planet stored under `ai_selected_planet`, if it still exists.
pub(crate) fn selected_planet(ctx: &AiContext<'_>) -> Option<Body> {
    let id = ctx.params().integer(keys::SELECTED_PLANET)?;
    planets(ctx).into_iter().find(|p| i64::from(p.id) == id)
}

/// An entity parameter whose entity is still in space.
pub(crate) fn live_entity(ctx: &AiContext<'_>, key: &str) -> Option<EntityId> {
    let id = ctx.params().entity(key)?;
    ctx.ship(id).filter(|s| s.is_in_space()).map(|_| id)
}

pub(crate) fn distance_to_body(ctx: &AiContext<'_>, body: &Body) -> f64 {
    ctx.distance_to_point(body.position)
}

/// One alert level calmer, for stations standing down.
pub(crate) fn reduce_alert(ctx: &mut AiContext<'_>) {
    if let Some(me) = ctx.me_mut() {
        me.alert = me.alert.reduced();
    }
}

pub(crate) fn red_alert(ctx: &mut AiContext<'_>) {
    if let Some(me) = ctx.me_mut() {
        me.alert = AlertCondition::Red;
    }
}

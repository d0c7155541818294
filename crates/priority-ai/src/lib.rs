//! Priority-tree decision engine for ships, stations and missiles.
//!
//! Each entity owns a [`Controller`]. On every reconsideration the
//! controller walks its [`AiTree`] and runs the single [`Behaviour`] it
//! selects: one flight or combat command plus the handler table that reacts
//! to [`GameEvent`]s until the next pass.
//!
//! # Modules
//!
//! - [`controller`]: the per-entity engine and its public authoring API
//! - [`catalog`]: conditions, configurations and behaviours trees are built from
//! - [`templates`] / [`waypoints`]: reusable tree fragments and patrol strategies
//! - [`responses`] / [`handlers`]: event reactions and the handler table
//! - [`threat`] / [`group`]: odds assessment and shared group state
//! - [`comms`]: role and personality keyed messages with rate limiting
//! - [`host`]: the simulation boundary, plus [`InMemoryHost`] for tests
//! - [`session`] / [`config`]: process-level state and tuning constants

pub mod cache;
pub mod catalog;
pub mod comms;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod events;
pub mod group;
pub mod handlers;
pub mod host;
pub mod params;
pub mod responses;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod templates;
pub mod threat;
pub mod waypoints;

pub use catalog::{AiNode, AiTree, Behaviour, Cond, Setup, WITCHPOINT};
pub use comms::{CommsParams, CommsPriority, CommsRegistry, Template};
pub use config::{AiConfig, OddsThresholds};
pub use context::{AiContext, EngineMode, Subject};
pub use controller::Controller;
pub use error::{AiError, Result};
pub use events::{EventKind, GameEvent};
pub use group::GroupBlackboard;
pub use handlers::{HandlerDiff, HandlerManager, HandlerSet};
pub use host::{EntityId, Host, InMemoryHost, ShipCommand, ShipEffect, ShipState, Vector};
pub use params::{Param, ParameterStore};
pub use responses::Response;
pub use rules::{RuleId, RuleTable};
pub use session::AiSession;
pub use threat::OddsClass;
pub use waypoints::WaypointGenerator;

pub use priority_tree::{branch, configured, fallback, unless, when};

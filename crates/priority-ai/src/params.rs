//! Per-controller parameter store.
//!
//! The only AI-local state that survives between reconsiderations. Keys are
//! free-form strings owned by rule authors, except those starting with
//! [`RESERVED_PREFIX`], which the engine reads and writes itself (see
//! [`keys`]). The store is cleared wholesale only on teardown.

use std::collections::BTreeMap;

use crate::host::{EntityId, Vector};
use crate::waypoints::WaypointGenerator;

/// Keys with this prefix are engine-owned.
pub const RESERVED_PREFIX: &str = "ai_";

/// Engine-owned parameter keys.
pub mod keys {
    pub const WAYPOINT: &str = "ai_waypoint";
    pub const WAYPOINT_RANGE: &str = "ai_waypoint_range";
    /// Stack of intermediate points; the last entry is flown to first.
    pub const WAYPOINTS: &str = "ai_waypoints";
    pub const WAYPOINT_GENERATOR: &str = "ai_waypoint_generator";
    pub const SELECTED_STATION: &str = "ai_selected_station";
    pub const SELECTED_PLANET: &str = "ai_selected_planet";
    pub const DOCKING_STATION: &str = "ai_docking_station";
    pub const WITCHSPACE_DESTINATION: &str = "ai_witchspace_destination";
    pub const WITCHSPACE_ENTRY: &str = "ai_witchspace_entry";
    pub const WITCHSPACE_WORMHOLE: &str = "ai_witchspace_wormhole";
    pub const SCAN_RESULTS: &str = "ai_scan_results";
    pub const SCAN_RESULT_SPECIFIC: &str = "ai_scan_result_specific";
    pub const DISTRESS_AGGRESSOR: &str = "ai_distress_aggressor";
    pub const DISTRESS_SENDER: &str = "ai_distress_sender";
    pub const DISTRESS_TIMESTAMP: &str = "ai_distress_timestamp";
    pub const CASCADE_DETECTED: &str = "ai_cascade_detected";
    pub const LAST_FLEEING: &str = "ai_last_fleeing";
    pub const CONSIDER_WITCHSPACE_FLEE: &str = "ai_consider_witchspace_flee";
    pub const REMEMBERED_TARGET: &str = "ai_remembered_target";
    pub const INTERCEPT_COORDINATES: &str = "ai_intercept_coordinates";
    pub const INTERCEPT_TARGET: &str = "ai_intercept_target";
    pub const PIRATE_LURK: &str = "ai_pirate_lurk";
    pub const LAST_PIRATE_VICTIM: &str = "ai_last_pirate_victim";
    pub const LAST_ASSIST: &str = "ai_last_assist";
    /// Cargo pods seen dumped since the last demand.
    pub const CARGO_DROPPED: &str = "ai_cargo_dropped";
    pub const LEADER_ROLE: &str = "ai_leader_role";
    pub const ESCORT_ROLE: &str = "ai_escort_role";
    pub const OLD_ROLE: &str = "ai_old_role";
    pub const ENTITY_NAME: &str = "ai_entity_name";
    pub const ENTITY_CLASS: &str = "ai_entity_class";
    /// Tonnes named in a pirate demand message.
    pub const DEMAND_SIZE: &str = "ai_demand_size";
    pub const LOGGING: &str = "ai_logging";
    /// Primary role of the ships a station sends on patrol.
    pub const STATION_PATROL_ROLE: &str = "ai_station_patrol_role";

    pub const SURRENDERS_EARLY: &str = "ai_flag_surrenders_early";
    pub const SURRENDERS_LATE: &str = "ai_flag_surrenders_late";
    pub const FLEES_PREEMPTIVELY: &str = "ai_flag_flees_preemptively";
    pub const FIGHTS_NEAR_HOSTILE_STATIONS: &str = "ai_flag_fights_near_hostile_stations";
    pub const NEVER_FLEE: &str = "ai_flag_never_flee";
    pub const WITCHSPACE_PURSUIT: &str = "ai_flag_witchspace_pursuit";
    pub const SEND_SPONTANEOUS_CHATTER: &str = "ai_flag_send_spontaneous_chatter";
    pub const PATROL_STATION: &str = "ai_flag_patrol_station";
    pub const ALLOW_PLASMA_GUNS: &str = "ai_flag_allow_plasma_guns";
    pub const SELF_DESTRUCT_ABANDONED_SHIP: &str = "ai_flag_self_destruct_abandoned_ship";
    pub const ALLOW_PLANETARY_LANDING: &str = "ai_flag_allow_planetary_landing";
    pub const WATCH_FOR_CARGO: &str = "ai_flag_watch_for_cargo";
    pub const MARK_OFFENDERS: &str = "ai_flag_mark_offenders";
    pub const SENDS_DISTRESS_CALLS: &str = "ai_flag_sends_distress_calls";
    pub const SCAN_IGNORES_UNPOWERED: &str = "ai_flag_scan_ignores_unpowered";
    pub const NO_SPECIAL_THARGOID_REACTION: &str = "ai_flag_no_special_thargoid_reaction";
    pub const CONTINUE_UNLIKELY_PURSUITS: &str = "ai_flag_continue_unlikely_pursuits";
    pub const LISTEN_FOR_DISTRESS_CALL: &str = "ai_flag_listen_for_distress_call";
    pub const AUTO_SPREAD_MISSILES: &str = "ai_flag_auto_spread_missiles";

    /// Role categories whose stray shots are forgiven once.
    pub const FRIENDLY_ROLES: &str = "ai_friendly_roles";
    pub const PLAYER_FRIENDLY_FIRE_ALREADY: &str = "ai_player_friendly_fire_already";
    pub const SELF_DESTRUCT_SCHEDULED: &str = "ai_self_destruct_scheduled";
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Flag(bool),
    Number(f64),
    Integer(i64),
    Text(String),
    Entity(EntityId),
    Vector(Vector),
    Path(Vec<Vector>),
    Entities(Vec<EntityId>),
    Texts(Vec<String>),
    Generator(WaypointGenerator),
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Param {
            fn from(value: $ty) -> Self {
                Param::$variant(value.into())
            }
        })*
    };
}

impl_from! {
    bool => Flag,
    f64 => Number,
    i64 => Integer,
    u32 => Integer,
    String => Text,
    &str => Text,
    EntityId => Entity,
    Vector => Vector,
    Vec<Vector> => Path,
    Vec<EntityId> => Entities,
    Vec<String> => Texts,
    WaypointGenerator => Generator,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    entries: BTreeMap<String, Param>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reserved(key: &str) -> bool {
        key.starts_with(RESERVED_PREFIX)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Param>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Param> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Missing or non-flag values read as false.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(Param::Flag(true)))
    }

    /// Numbers and integers both read as `f64`.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.entries.get(key)? {
            Param::Number(n) => Some(*n),
            Param::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            Param::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            Param::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn entity(&self, key: &str) -> Option<EntityId> {
        match self.entries.get(key)? {
            Param::Entity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn vector(&self, key: &str) -> Option<Vector> {
        match self.entries.get(key)? {
            Param::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn path(&self, key: &str) -> Option<&[Vector]> {
        match self.entries.get(key)? {
            Param::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn path_mut(&mut self, key: &str) -> Option<&mut Vec<Vector>> {
        match self.entries.get_mut(key)? {
            Param::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn entities(&self, key: &str) -> Option<&[EntityId]> {
        match self.entries.get(key)? {
            Param::Entities(list) => Some(list),
            _ => None,
        }
    }

    pub fn texts(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key)? {
            Param::Texts(list) => Some(list),
            _ => None,
        }
    }

    pub fn generator(&self, key: &str) -> Option<WaypointGenerator> {
        match self.entries.get(key)? {
            Param::Generator(g) => Some(*g),
            _ => None,
        }
    }

    /// Renders a value for message expansion. Lists and vectors have no
    /// textual form.
    pub fn display(&self, key: &str) -> Option<String> {
        match self.entries.get(key)? {
            Param::Flag(b) => Some(b.to_string()),
            Param::Number(n) => Some(n.to_string()),
            Param::Integer(n) => Some(n.to_string()),
            Param::Text(s) => Some(s.clone()),
            Param::Entity(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

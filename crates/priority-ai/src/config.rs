//! Engine tuning constants.
//!
//! Every timing window and threshold the controller uses is read from an
//! [`AiConfig`] held by the session. Values missing from a configuration file
//! fall back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};

/// Default length of the long-term cache window in seconds.
pub const DEFAULT_LONG_TERM_WINDOW: f64 = 60.0;
/// Default delay used by `reconsider_now`.
pub const DEFAULT_RECONSIDER_NOW_DELAY: f64 = 0.1;
/// Default `reconsider_now` delay in legacy mode.
pub const DEFAULT_LEGACY_RECONSIDER_NOW_DELAY: f64 = 0.25;
/// Requests shorter than this are ignored by `reconsider_in`.
pub const DEFAULT_MIN_RECONSIDER_DELAY: f64 = 0.1;
pub const DEFAULT_COMMS_SHORT_WINDOW: f64 = 10.0;
pub const DEFAULT_COMMS_LONG_WINDOW: f64 = 60.0;
pub const DEFAULT_DISTRESS_TIMEOUT: f64 = 30.0;
pub const DEFAULT_ESCAPE_POD_SELF_DESTRUCT: f64 = 10.0;
pub const DEFAULT_PATROL_DISTANCE: f64 = 200_000.0;
pub const DEFAULT_STATION_PATROL_OFFSET: f64 = 25_000.0;
pub const DEFAULT_MISSILE_RANGE: f64 = 30_000.0;

/// Combat odds classification thresholds.
///
/// `terrible` and `bad` swap roles for ships flagged to surrender early or
/// late; see [`crate::threat::OddsClass`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsThresholds {
    pub terrible: f64,
    pub bad: f64,
    pub good: f64,
    pub excellent: f64,
}

impl Default for OddsThresholds {
    fn default() -> Self {
        Self {
            terrible: 0.375,
            bad: 0.75,
            good: 1.5,
            excellent: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub long_term_window: f64,
    pub reconsider_now_delay: f64,
    pub legacy_reconsider_now_delay: f64,
    pub min_reconsider_delay: f64,
    pub comms_short_window: f64,
    pub comms_long_window: f64,
    pub distress_timeout: f64,
    pub escape_pod_self_destruct: f64,
    pub patrol_distance: f64,
    pub station_patrol_offset: f64,
    pub missile_default_range: f64,
    pub odds: OddsThresholds,
}

impl AiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| AiError::io(path, e))?;
        Self::from_toml_str(&source)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            long_term_window: DEFAULT_LONG_TERM_WINDOW,
            reconsider_now_delay: DEFAULT_RECONSIDER_NOW_DELAY,
            legacy_reconsider_now_delay: DEFAULT_LEGACY_RECONSIDER_NOW_DELAY,
            min_reconsider_delay: DEFAULT_MIN_RECONSIDER_DELAY,
            comms_short_window: DEFAULT_COMMS_SHORT_WINDOW,
            comms_long_window: DEFAULT_COMMS_LONG_WINDOW,
            distress_timeout: DEFAULT_DISTRESS_TIMEOUT,
            escape_pod_self_destruct: DEFAULT_ESCAPE_POD_SELF_DESTRUCT,
            patrol_distance: DEFAULT_PATROL_DISTANCE,
            station_patrol_offset: DEFAULT_STATION_PATROL_OFFSET,
            missile_default_range: DEFAULT_MISSILE_RANGE,
            odds: OddsThresholds::default(),
        }
    }
}

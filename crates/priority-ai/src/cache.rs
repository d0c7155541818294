//! Memoization for values that are costly to derive.
//!
//! The short-term cache lives for exactly one reconsideration pass. The
//! long-term cache survives until its window closes, after which it is
//! discarded wholesale and a new window begins.

use std::collections::HashMap;

use crate::host::EntityId;

/// What a cached value describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    // Short-term
    Odds,
    InCombat,
    InCombatWithHostiles,
    ScannerSelf,
    // Long-term
    CruiseSpeed,
    FineThreshold,
    HomeStation,
    NearestStation,
    FriendlyStationExists,
    SuppliesLow,
    SentDistress,
    ConsiderWitchspaceFlee,
    WitchspaceFleeAt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheValue {
    Number(f64),
    Flag(bool),
    Entity(Option<EntityId>),
}

impl CacheValue {
    pub fn as_number(self) -> Option<f64> {
        match self {
            CacheValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            CacheValue::Flag(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_entity(self) -> Option<Option<EntityId>> {
        match self {
            CacheValue::Entity(e) => Some(e),
            _ => None,
        }
    }
}

/// Plain values that can live in a cache slot.
pub trait Cached: Copy {
    fn into_value(self) -> CacheValue;
    fn from_value(value: CacheValue) -> Option<Self>;
}

impl Cached for f64 {
    fn into_value(self) -> CacheValue {
        CacheValue::Number(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        value.as_number()
    }
}

impl Cached for bool {
    fn into_value(self) -> CacheValue {
        CacheValue::Flag(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        value.as_flag()
    }
}

impl Cached for Option<EntityId> {
    fn into_value(self) -> CacheValue {
        CacheValue::Entity(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        value.as_entity()
    }
}

/// Cleared unconditionally at the start of every pass.
#[derive(Debug, Default, Clone)]
pub struct ShortTermCache {
    entries: HashMap<CacheKey, CacheValue>,
}

impl ShortTermCache {
    pub fn get(&self, key: CacheKey) -> Option<CacheValue> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: CacheKey) {
        self.entries.remove(&key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entries valid until `window_ends`.
#[derive(Debug, Default, Clone)]
pub struct LongTermCache {
    entries: HashMap<CacheKey, CacheValue>,
    window_ends: f64,
}

impl LongTermCache {
    /// Discards everything once `now` has passed the window and opens a new
    /// one lasting `window` seconds.
    pub fn refresh(&mut self, now: f64, window: f64) {
        if self.window_ends < now {
            self.entries.clear();
            self.window_ends = now + window;
        }
    }

    pub fn window_ends(&self) -> f64 {
        self.window_ends
    }

    pub fn get(&self, key: CacheKey) -> Option<CacheValue> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: CacheKey) {
        self.entries.remove(&key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.window_ends = 0.0;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Communications templates and rate limiting.
//!
//! Templates are stored by role, personality and key. Lookup falls back from
//! the exact pair through `generic` stand-ins:
//!
//! 1. (role, personality)
//! 2. (`generic`, personality), unless the role starts with `_`
//! 3. (role, `generic`), unless the personality starts with `_`
//! 4. (`generic`, `generic`), unless either starts with `_`
//!
//! Empty templates count as absent, so an author can blank a message for one
//! level and still let the next level answer.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{AiError, Result};

pub const GENERIC: &str = "generic";
/// Roles and personalities starting with this never fall back to `generic`.
pub const NO_FALLBACK_MARKER: char = '_';

/// Message parameters used for `[name]` expansion.
pub type CommsParams = BTreeMap<String, String>;

/// Raw table layout: role, then personality, then key.
pub type CommsTable = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

pub type Generator = Arc<dyn Fn(&str, &CommsParams) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Template {
    Text(String),
    /// Produces the message at send time from the key and parameters.
    Generated(Generator),
}

impl Template {
    pub fn generated(f: impl Fn(&str, &CommsParams) -> String + Send + Sync + 'static) -> Self {
        Template::Generated(Arc::new(f))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Template::Text(text) if text.is_empty())
    }

    pub fn render(&self, key: &str, params: &CommsParams) -> String {
        match self {
            Template::Text(text) => expand(text, params),
            Template::Generated(f) => f(key, params),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Template::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Template::Text(text.to_string())
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Template::Text(text)
    }
}

/// Replaces every `[name]` whose name is in `params`. Unknown names are
/// left as written.
pub fn expand(text: &str, params: &CommsParams) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                let name = &after[..close];
                match params.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('[');
                        out.push_str(name);
                        out.push(']');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// How readily a message may be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommsPriority {
    /// Always sent.
    Always = 1,
    /// Suppressed if this entity sent anything within the short window.
    NotAfterSending = 2,
    /// Suppressed if anything was sent or heard within the short window.
    NotAfterTraffic = 3,
    /// Suppressed if anything was sent or heard within the long window.
    Quiet = 4,
}

impl TryFrom<u8> for CommsPriority {
    type Error = AiError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(CommsPriority::Always),
            2 => Ok(CommsPriority::NotAfterSending),
            3 => Ok(CommsPriority::NotAfterTraffic),
            4 => Ok(CommsPriority::Quiet),
            other => Err(AiError::InvalidCommsPriority(other)),
        }
    }
}

/// When this entity last sent and heard a message.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommsLog {
    pub last_sent: Option<f64>,
    pub last_heard: Option<f64>,
}

impl CommsLog {
    pub fn allows(&self, priority: CommsPriority, now: f64, short: f64, long: f64) -> bool {
        let within = |at: Option<f64>, window: f64| at.is_some_and(|t| now - t < window);
        match priority {
            CommsPriority::Always => true,
            CommsPriority::NotAfterSending => !within(self.last_sent, short),
            CommsPriority::NotAfterTraffic => {
                !within(self.last_sent, short) && !within(self.last_heard, short)
            }
            CommsPriority::Quiet => !within(self.last_sent, long) && !within(self.last_heard, long),
        }
    }

    pub fn note_sent(&mut self, now: f64) {
        self.last_sent = Some(now);
    }

    pub fn note_heard(&mut self, now: f64) {
        self.last_heard = Some(now);
    }
}

/// Role and personality selecting an entity's templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommsIdentity {
    pub role: String,
    pub personality: String,
}

impl Default for CommsIdentity {
    fn default() -> Self {
        Self {
            role: GENERIC.to_string(),
            personality: GENERIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommsRegistry {
    table: BTreeMap<String, BTreeMap<String, BTreeMap<String, Template>>>,
}

impl CommsRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in message table.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::from_ron_str(include_str!("../data/comms.ron"))?;
        registry.set_communication(
            "police",
            GENERIC,
            "continuingAttack",
            Template::generated(|_, p| {
                format!("Targeting the {}. Cover me.", entity_name(p))
            }),
        );
        registry.set_communication(
            "police",
            GENERIC,
            "beginningAttack",
            Template::generated(|_, p| format!("Leave the system or die, {}!", entity_name(p))),
        );
        Ok(registry)
    }

    pub fn from_ron_str(source: &str) -> Result<Self> {
        let table: CommsTable = ron::from_str(source)?;
        let mut registry = Self::new();
        registry.set_communications(table);
        Ok(registry)
    }

    /// Merges a RON table from disk, overwriting matching entries. Returns
    /// the number of templates read.
    pub fn load_ron(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| AiError::io(path, e))?;
        let table: CommsTable = ron::from_str(&source)?;
        let count = table
            .values()
            .flat_map(|p| p.values())
            .map(|keys| keys.len())
            .sum();
        self.set_communications(table);
        debug!(target: "priority_ai::comms", path = %path.display(), count, "loaded communications");
        Ok(count)
    }

    pub fn set_communication(
        &mut self,
        role: &str,
        personality: &str,
        key: &str,
        template: impl Into<Template>,
    ) {
        self.table
            .entry(role.to_string())
            .or_default()
            .entry(personality.to_string())
            .or_default()
            .insert(key.to_string(), template.into());
    }

    pub fn set_communications(&mut self, table: CommsTable) {
        for (role, personalities) in table {
            for (personality, keys) in personalities {
                for (key, text) in keys {
                    self.set_communication(&role, &personality, &key, text);
                }
            }
        }
    }

    /// Resolves a template through the fallback chain.
    pub fn get_communication(&self, role: &str, personality: &str, key: &str) -> Option<&Template> {
        let role_falls_back = !role.starts_with(NO_FALLBACK_MARKER);
        let personality_falls_back = !personality.starts_with(NO_FALLBACK_MARKER);

        self.exact(role, personality, key)
            .or_else(|| {
                role_falls_back
                    .then(|| self.exact(GENERIC, personality, key))
                    .flatten()
            })
            .or_else(|| {
                personality_falls_back
                    .then(|| self.exact(role, GENERIC, key))
                    .flatten()
            })
            .or_else(|| {
                (role_falls_back && personality_falls_back)
                    .then(|| self.exact(GENERIC, GENERIC, key))
                    .flatten()
            })
    }

    /// Personalities declared for `role`.
    pub fn personalities(&self, role: &str) -> Vec<&str> {
        self.table
            .get(role)
            .map(|p| p.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.table
            .values()
            .flat_map(|p| p.values())
            .map(|keys| keys.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn exact(&self, role: &str, personality: &str, key: &str) -> Option<&Template> {
        self.table
            .get(role)?
            .get(personality)?
            .get(key)
            .filter(|t| !t.is_empty())
    }
}

fn entity_name(params: &CommsParams) -> &str {
    params
        .get(crate::params::keys::ENTITY_NAME)
        .map_or("you", String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(t: Option<&Template>) -> Option<String> {
        t.map(|t| t.render("k", &CommsParams::new()))
    }

    #[test]
    fn falls_back_to_generic_role() {
        let mut registry = CommsRegistry::new();
        registry.set_communication("generic", "x", "k", "generic-x");
        assert_eq!(text(registry.get_communication("pirate", "x", "k")), Some("generic-x".into()));
    }

    #[test]
    fn underscore_role_blocks_role_fallback() {
        let mut registry = CommsRegistry::new();
        registry.set_communication("generic", "x", "k", "generic-x");
        registry.set_communication("generic", "generic", "k", "generic-generic");
        assert_eq!(text(registry.get_communication("_custom", "x", "k")), None);
    }

    #[test]
    fn underscore_personality_still_uses_generic_role() {
        let mut registry = CommsRegistry::new();
        registry.set_communication("generic", "_quiet", "k", "generic-quiet");
        registry.set_communication("pirate", "generic", "k", "pirate-generic");
        assert_eq!(
            text(registry.get_communication("pirate", "_quiet", "k")),
            Some("generic-quiet".into())
        );
        assert_eq!(text(registry.get_communication("trader", "_other", "k")), None);
    }

    #[test]
    fn fallback_order_prefers_generic_role_over_generic_personality() {
        let mut registry = CommsRegistry::new();
        registry.set_communication("generic", "x", "k", "generic-x");
        registry.set_communication("pirate", "generic", "k", "pirate-generic");
        assert_eq!(text(registry.get_communication("pirate", "x", "k")), Some("generic-x".into()));
    }

    #[test]
    fn empty_template_is_skipped() {
        let mut registry = CommsRegistry::new();
        registry.set_communication("pirate", "x", "k", "");
        registry.set_communication("generic", "generic", "k", "fallback");
        assert_eq!(text(registry.get_communication("pirate", "x", "k")), Some("fallback".into()));
    }

    #[test]
    fn expansion_leaves_unknown_names() {
        let mut params = CommsParams::new();
        params.insert("ai_entity_name".into(), "Viper".into());
        assert_eq!(expand("Die, [ai_entity_name]! [other] [", &params), "Die, Viper! [other] [");
    }

    #[test]
    fn priority_windows() {
        let log = CommsLog {
            last_sent: Some(100.0),
            last_heard: None,
        };
        assert!(log.allows(CommsPriority::Always, 100.0, 10.0, 60.0));
        assert!(!log.allows(CommsPriority::NotAfterSending, 105.0, 10.0, 60.0));
        assert!(log.allows(CommsPriority::NotAfterSending, 110.0, 10.0, 60.0));
        assert!(!log.allows(CommsPriority::Quiet, 130.0, 10.0, 60.0));
        assert!(log.allows(CommsPriority::Quiet, 165.0, 10.0, 60.0));

        let heard = CommsLog {
            last_sent: None,
            last_heard: Some(100.0),
        };
        assert!(heard.allows(CommsPriority::NotAfterSending, 101.0, 10.0, 60.0));
        assert!(!heard.allows(CommsPriority::NotAfterTraffic, 101.0, 10.0, 60.0));
    }

    #[test]
    fn priority_from_number() {
        assert_eq!(CommsPriority::try_from(3).unwrap(), CommsPriority::NotAfterTraffic);
        assert!(matches!(CommsPriority::try_from(5), Err(AiError::InvalidCommsPriority(5))));
    }

    #[test]
    fn builtin_table_parses() {
        let registry = CommsRegistry::builtin().unwrap();
        let mut params = CommsParams::new();
        params.insert("ai_entity_name".into(), "Krait".into());
        let generic = registry.get_communication("trader", "generic", "beginningAttack").unwrap();
        assert_eq!(generic.render("beginningAttack", &params), "Die, Krait!");
        let police = registry.get_communication("police", "generic", "beginningAttack").unwrap();
        assert_eq!(police.render("beginningAttack", &params), "Leave the system or die, Krait!");
        assert!(registry.personalities("_thargoid").contains(&"thargoid"));
    }

    #[test]
    fn load_ron_merges() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "miner": {{ "generic": {{ "mining": "Rocks ahoy." }} }} }}"#).unwrap();
        let mut registry = CommsRegistry::new();
        assert_eq!(registry.load_ron(file.path()).unwrap(), 1);
        assert_eq!(text(registry.get_communication("miner", "dour", "mining")), Some("Rocks ahoy.".into()));
    }
}

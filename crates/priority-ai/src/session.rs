//! Process-level state shared by every controller.
//!
//! An [`AiSession`] replaces what would otherwise be global: tuning
//! constants, the communications registry and the custom rule table. It is
//! passed by reference into each controller call.

use tracing::info;

use crate::comms::CommsRegistry;
use crate::config::AiConfig;
use crate::error::Result;
use crate::rules::RuleTable;

#[derive(Debug)]
pub struct AiSession {
    config: AiConfig,
    comms: CommsRegistry,
    rules: RuleTable,
    /// Raised while any witchspace transition is under way.
    comms_suppressed: bool,
}

impl AiSession {
    /// Starts a session with the built-in communications table.
    pub fn start(config: AiConfig) -> Result<Self> {
        let comms = CommsRegistry::builtin()?;
        info!(
            target: "priority_ai::controller",
            templates = comms.len(),
            "ai session started"
        );
        Ok(Self {
            config,
            comms,
            rules: RuleTable::new(),
            comms_suppressed: false,
        })
    }

    /// A session with an explicit registry, e.g. an empty one for tests.
    pub fn with_registry(config: AiConfig, comms: CommsRegistry) -> Self {
        Self {
            config,
            comms,
            rules: RuleTable::new(),
            comms_suppressed: false,
        }
    }

    pub fn shutdown(self) {
        info!(
            target: "priority_ai::controller",
            rules = self.rules.len(),
            "ai session ended"
        );
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn comms(&self) -> &CommsRegistry {
        &self.comms
    }

    pub fn comms_mut(&mut self) -> &mut CommsRegistry {
        &mut self.comms
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleTable {
        &mut self.rules
    }

    /// Host notification: a witchspace transition began.
    pub fn witchspace_started(&mut self) {
        self.comms_suppressed = true;
    }

    /// Host notification: the transition finished.
    pub fn witchspace_finished(&mut self) {
        self.comms_suppressed = false;
    }

    pub fn comms_suppressed(&self) -> bool {
        self.comms_suppressed
    }
}

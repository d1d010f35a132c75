use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTLEMENT_DELAY: Duration = Duration::from_millis(2500);

/// How `resolve_step` treats requests it cannot apply: unknown invoice,
/// unknown step, or a step that is not the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvePolicy {
    /// Report the failure to the caller.
    #[default]
    Strict,
    /// Log it and carry on; the store is left untouched.
    Lenient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TowerConfig {
    pub settlement_delay: Duration,
    pub policy: ResolvePolicy,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            settlement_delay: DEFAULT_SETTLEMENT_DELAY,
            policy: ResolvePolicy::Strict,
        }
    }
}

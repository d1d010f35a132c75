use serde::{Deserialize, Serialize};

pub const SYSTEM_ROLE_ID: &str = "system";

/// Whoever resolves a workflow step. Always passed explicitly into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub name: String,
    pub role: String,
    pub role_id: String,
}

impl Actor {
    pub fn new(name: &str, role: &str, role_id: &str) -> Self {
        Self {
            name: name.to_owned(),
            role: role.to_owned(),
            role_id: role_id.to_owned(),
        }
    }

    /// Identity stamped on steps completed by automated settlement.
    pub fn system() -> Self {
        Self::new("System", "Automated Settlement", SYSTEM_ROLE_ID)
    }
}

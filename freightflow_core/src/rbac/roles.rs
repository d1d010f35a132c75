use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::Actor;
use crate::error::WorkflowError;
use crate::workflow::WorkflowStepConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub can_view_invoices: bool,
    pub can_approve_l1: bool,
    pub can_approve_l2: bool,
    pub can_manage_rates: bool,
    pub can_admin_system: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Role id -> permissions. Consulted by the host before it forwards a human
/// decision; the engine itself never checks authorization.
#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    roles: HashMap<String, RoleDefinition>,
}

impl RoleDirectory {
    pub fn new(roles: Vec<RoleDefinition>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn role(&self, role_id: &str) -> Option<&RoleDefinition> {
        self.roles.get(role_id)
    }

    pub fn is_admin(&self, actor: &Actor) -> bool {
        self.role(&actor.role_id)
            .map(|r| r.permissions.can_admin_system)
            .unwrap_or(false)
    }

    /// Owner of the step's role, or any system administrator.
    pub fn can_act(&self, actor: &Actor, step: &WorkflowStepConfig) -> bool {
        actor.role_id == step.role_id || self.is_admin(actor)
    }

    pub fn authorize(&self, actor: &Actor, step: &WorkflowStepConfig) -> Result<(), WorkflowError> {
        if self.can_act(actor, step) {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized {
                actor: actor.name.clone(),
                role_id: actor.role_id.clone(),
                step_id: step.id.clone(),
            })
        }
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::state::{StepStatus, WorkflowHistoryItem};
use crate::core::actor::SYSTEM_ROLE_ID;
use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    #[default]
    Always,
    AmountGt,
    VarianceGt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStepConfig {
    pub id: String,
    pub step_name: String,
    pub role_id: String,
    #[serde(default)]
    pub condition_type: ConditionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_value: Option<f64>,
    #[serde(default)]
    pub is_system_step: bool,
}

impl WorkflowStepConfig {
    pub fn human(id: &str, step_name: &str, role_id: &str) -> Self {
        Self {
            id: id.to_owned(),
            step_name: step_name.to_owned(),
            role_id: role_id.to_owned(),
            condition_type: ConditionType::Always,
            condition_value: None,
            is_system_step: false,
        }
    }

    pub fn system(id: &str, step_name: &str) -> Self {
        Self {
            is_system_step: true,
            ..Self::human(id, step_name, SYSTEM_ROLE_ID)
        }
    }

    pub fn with_condition(mut self, condition_type: ConditionType, value: Option<f64>) -> Self {
        self.condition_type = condition_type;
        self.condition_value = value;
        self
    }

    /// Unset thresholds compare against zero.
    pub fn threshold(&self) -> f64 {
        self.condition_value.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "first_version")]
    pub version: u32,
    pub steps: Vec<WorkflowStepConfig>,
}

fn first_version() -> u32 {
    1
}

impl WorkflowConfig {
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        steps: Vec<WorkflowStepConfig>,
    ) -> Result<Self, WorkflowError> {
        let workflow = WorkflowConfig {
            id: id.to_owned(),
            name: name.to_owned(),
            description: description.to_owned(),
            version: first_version(),
            steps,
        };

        workflow.validate()?;
        Ok(workflow)
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.id.trim().is_empty() {
            return Err(WorkflowError::Definition(
                "Workflow id cannot be empty".to_string(),
            ));
        }

        if self.steps.is_empty() {
            return Err(WorkflowError::Definition(
                "Workflow must have at least one step".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(WorkflowError::Definition(format!(
                    "Step '{}' has an empty id",
                    step.step_name
                )));
            }

            if !seen.insert(step.id.as_str()) {
                return Err(WorkflowError::Definition(format!(
                    "Duplicate step id '{}' in workflow '{}'",
                    step.id, self.id
                )));
            }
        }

        Ok(())
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn step(&self, step_id: &str) -> Option<&WorkflowStepConfig> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Steps strictly after `step_id` in configuration order. Empty when the
    /// step is not part of this workflow.
    pub fn steps_after(&self, step_id: &str) -> &[WorkflowStepConfig] {
        match self.position(step_id) {
            Some(pos) => self.steps.get(pos + 1..).unwrap_or_default(),
            None => &[],
        }
    }

    pub fn initial_history(&self) -> Vec<WorkflowHistoryItem> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let status = if i == 0 {
                    StepStatus::Active
                } else {
                    StepStatus::Pending
                };
                WorkflowHistoryItem::new(&step.id, status)
            })
            .collect()
    }
}

use super::definition::{ConditionType, WorkflowStepConfig};
use crate::core::Invoice;

/// Applicability check for a workflow step against a concrete invoice.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    AlwaysTrue,
    AmountAbove(f64),
    VarianceAbove(f64),
}

impl Validator {
    pub fn for_step(step: &WorkflowStepConfig) -> Self {
        match step.condition_type {
            ConditionType::Always => Validator::AlwaysTrue,
            ConditionType::AmountGt => Validator::AmountAbove(step.threshold()),
            ConditionType::VarianceGt => Validator::VarianceAbove(step.threshold()),
        }
    }

    pub fn applies(&self, invoice: &Invoice) -> bool {
        match self {
            Validator::AlwaysTrue => true,
            Validator::AmountAbove(threshold) => invoice.amount > *threshold,
            Validator::VarianceAbove(threshold) => invoice.variance > *threshold,
        }
    }
}

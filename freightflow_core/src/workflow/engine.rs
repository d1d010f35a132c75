use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::definition::WorkflowConfig;
use super::state::StepStatus;
use super::transition::{Decision, NextStep, Resolution};
use super::validators::Validator;
use crate::core::{Actor, Invoice, InvoiceStatus};
use crate::error::WorkflowError;

/// Versioned workflow registry plus the step-resolution rule.
///
/// `resolve` is pure: it takes an invoice snapshot and returns the next
/// snapshot. Committing it, stamping time and scheduling settlements is the
/// host's job (see `runtime::ControlTower`).
pub struct Engine {
    workflows: HashMap<String, Vec<Arc<WorkflowConfig>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            workflows: HashMap::new(),
        }
    }

    /// Stores `workflow` as the next version of its id. Invoices already
    /// pinned to an older version keep using it.
    pub fn register_workflow(
        &mut self,
        mut workflow: WorkflowConfig,
    ) -> Result<Arc<WorkflowConfig>, WorkflowError> {
        workflow.validate()?;

        let versions = self.workflows.entry(workflow.id.clone()).or_default();
        workflow.version = versions.last().map(|w| w.version + 1).unwrap_or(1);

        let workflow = Arc::new(workflow);
        versions.push(Arc::clone(&workflow));

        debug!(
            workflow_id = %workflow.id,
            version = workflow.version,
            steps = workflow.steps.len(),
            "registered workflow"
        );

        Ok(workflow)
    }

    pub fn load_workflow_from_json(
        &mut self,
        workflow_json: Value,
    ) -> Result<Arc<WorkflowConfig>, WorkflowError> {
        let workflow: WorkflowConfig = serde_json::from_value(workflow_json)
            .map_err(|e| WorkflowError::Parsing(format!("Failed to parse workflow: {}", e)))?;

        self.register_workflow(workflow)
    }

    pub fn latest(&self, workflow_id: &str) -> Result<Arc<WorkflowConfig>, WorkflowError> {
        self.workflows
            .get(workflow_id)
            .and_then(|versions| versions.last())
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflow(workflow_id.to_string()))
    }

    pub fn workflow(
        &self,
        workflow_id: &str,
        version: u32,
    ) -> Result<Arc<WorkflowConfig>, WorkflowError> {
        self.workflows
            .get(workflow_id)
            .and_then(|versions| versions.iter().find(|w| w.version == version))
            .cloned()
            .ok_or_else(|| {
                WorkflowError::UnknownWorkflow(format!("{} (version {})", workflow_id, version))
            })
    }

    pub fn workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Applies `decision` on `step_id` to a copy of `invoice`.
    ///
    /// Only the invoice's current step (ACTIVE or PROCESSING) can be resolved,
    /// and nothing moves once the invoice is APPROVED or REJECTED.
    pub fn resolve(
        &self,
        invoice: &Invoice,
        step_id: &str,
        decision: Decision,
        actor: &Actor,
        comment: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Resolution, WorkflowError> {
        let current = invoice
            .history_item(step_id)
            .ok_or_else(|| WorkflowError::StepNotFound {
                invoice_id: invoice.id.clone(),
                step_id: step_id.to_string(),
            })?;

        if !current.status.is_current() || invoice.status.is_workflow_terminal() {
            return Err(WorkflowError::InvalidStepState {
                step_id: step_id.to_string(),
                status: current.status,
                invoice_status: invoice.status,
            });
        }

        let workflow = self.workflow(&invoice.workflow_id, invoice.workflow_version)?;
        if workflow.position(step_id).is_none() {
            return Err(WorkflowError::Definition(format!(
                "Step '{}' is not part of workflow '{}' version {}",
                step_id, workflow.id, workflow.version
            )));
        }

        let mut next_invoice = invoice.clone();
        if let Some(item) = next_invoice.history_item_mut(step_id) {
            item.stamp(decision.resulting_status(), actor, at, comment);
        }

        if decision == Decision::Reject {
            next_invoice.status = InvoiceStatus::Rejected;
            return Ok(Resolution {
                invoice: next_invoice,
                next: NextStep::Rejected,
                skipped: vec![],
            });
        }

        let mut skipped = Vec::new();
        let mut next = NextStep::Completed;

        for step in workflow.steps_after(step_id) {
            let applies = Validator::for_step(step).applies(&next_invoice);

            let Some(item) = next_invoice.history_item_mut(&step.id) else {
                continue;
            };

            if !applies {
                item.status = StepStatus::Skipped;
                skipped.push(step.id.clone());
                debug!(invoice_id = %invoice.id, step_id = %step.id, "step not applicable, skipped");
                continue;
            }

            if step.is_system_step {
                item.status = StepStatus::Processing;
                next = NextStep::Processing {
                    step_id: step.id.clone(),
                };
            } else {
                item.status = StepStatus::Active;
                next = NextStep::AwaitingApproval {
                    step_id: step.id.clone(),
                };
            }
            break;
        }

        if next == NextStep::Completed {
            next_invoice.status = InvoiceStatus::Approved;
        }

        Ok(Resolution {
            invoice: next_invoice,
            next,
            skipped,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // only in tests :) I want them to panic here but never during runtime
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::indexing_slicing)]
    #![allow(clippy::panic)]

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::core::NewInvoice;
    use crate::workflow::definition::{ConditionType, WorkflowStepConfig};
    use crate::workflow::test_support::three_step_workflow;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 10, 15, 0).unwrap()
    }

    fn ops() -> Actor {
        Actor::new("Priya Nair", "Ops Manager", "ops_manager")
    }

    fn finance() -> Actor {
        Actor::new("Tom Becker", "Finance Controller", "finance_controller")
    }

    fn engine_with(workflow: WorkflowConfig) -> (Engine, Arc<WorkflowConfig>) {
        let mut engine = Engine::new();
        let registered = engine.register_workflow(workflow).unwrap();
        (engine, registered)
    }

    fn ingest(workflow: &WorkflowConfig, amount: f64, variance: f64) -> Invoice {
        NewInvoice::new("INV-1001", amount, variance).into_invoice(workflow, 1)
    }

    fn statuses(invoice: &Invoice) -> Vec<StepStatus> {
        invoice.workflow_history.iter().map(|h| h.status).collect()
    }

    fn create_test_workflow() -> Value {
        json!({
          "id": "fba_control_tower",
          "name": "FBA Control Tower",
          "description": "Three-tier freight invoice approval",
          "steps": [
            {"id": "step_ops", "stepName": "Operational Review", "roleId": "role_ops", "conditionType": "ALWAYS"},
            {"id": "step_fin", "stepName": "Financial Approval", "roleId": "role_fin",
             "conditionType": "AMOUNT_GT", "conditionValue": 10000},
            {"id": "step_pay", "stepName": "Payment Settlement", "roleId": "system",
             "conditionType": "ALWAYS", "isSystemStep": true}
          ]
        })
    }

    #[test]
    fn test_workflow_loads() {
        let mut engine = Engine::new();

        let workflow = engine.load_workflow_from_json(create_test_workflow()).unwrap();

        assert_eq!(workflow.id, "fba_control_tower");
        assert_eq!(workflow.version, 1);
        assert_eq!(workflow.steps.len(), 3);
        assert_eq!(engine.latest("fba_control_tower").unwrap().steps.len(), 3);
        assert_eq!(engine.workflow_ids(), vec!["fba_control_tower".to_string()]);
    }

    #[test]
    fn test_invalid_json_workflow_rejected() {
        let mut engine = Engine::new();

        let missing_steps = engine.load_workflow_from_json(json!({"id": "x", "name": "x"}));
        let no_steps = engine.load_workflow_from_json(json!({"id": "x", "name": "x", "steps": []}));

        assert!(matches!(missing_steps, Err(WorkflowError::Parsing(_))));
        assert!(matches!(no_steps, Err(WorkflowError::Definition(_))));
        assert!(engine.workflow_ids().is_empty());
    }

    #[test]
    fn test_reregistering_bumps_version_and_keeps_old() {
        let (mut engine, v1) = engine_with(three_step_workflow());

        let mut edited = three_step_workflow();
        edited.steps.remove(1);
        let v2 = engine.register_workflow(edited).unwrap();

        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(engine.latest("freight_audit").unwrap().steps.len(), 2);
        assert_eq!(engine.workflow("freight_audit", 1).unwrap().steps.len(), 3);
        assert!(matches!(
            engine.workflow("freight_audit", 3),
            Err(WorkflowError::UnknownWorkflow(_))
        ));
    }

    #[test]
    fn test_approve_skips_to_system_step_below_threshold() {
        let (engine, workflow) = engine_with(three_step_workflow());
        let invoice = ingest(&workflow, 5000.0, 0.0);

        let resolution = engine
            .resolve(&invoice, "L1", Decision::Approve, &ops(), Some("ok"), at())
            .unwrap();

        assert_eq!(
            statuses(&resolution.invoice),
            vec![StepStatus::Approved, StepStatus::Skipped, StepStatus::Processing]
        );
        assert_eq!(resolution.skipped, vec!["L2".to_string()]);
        assert_eq!(
            resolution.next,
            NextStep::Processing {
                step_id: "L3".to_string()
            }
        );
        assert_eq!(resolution.invoice.status, InvoiceStatus::Pending);

        let ticket = resolution.settlement().unwrap();
        assert_eq!(ticket.invoice_id, "INV-1001");
        assert_eq!(ticket.step_id, "L3");
        assert_eq!(ticket.workflow_epoch, 1);

        let l1 = &resolution.invoice.workflow_history[0];
        assert_eq!(l1.approver_name.as_deref(), Some("Priya Nair"));
        assert_eq!(l1.timestamp, Some(at()));
        // input snapshot is untouched
        assert_eq!(invoice.workflow_history[0].status, StepStatus::Active);
    }

    #[test]
    fn test_approve_activates_human_step_above_threshold() {
        let (engine, workflow) = engine_with(three_step_workflow());
        let invoice = ingest(&workflow, 20000.0, 0.0);

        let resolution = engine
            .resolve(&invoice, "L1", Decision::Approve, &ops(), None, at())
            .unwrap();

        assert_eq!(
            statuses(&resolution.invoice),
            vec![StepStatus::Approved, StepStatus::Active, StepStatus::Pending]
        );
        assert!(resolution.settlement().is_none());
        assert_eq!(resolution.invoice.current_step_count(), 1);
    }

    #[test]
    fn test_reject_is_terminal_and_leaves_pending() {
        let (engine, workflow) = engine_with(three_step_workflow());
        let invoice = ingest(&workflow, 20000.0, 0.0);

        let after_l1 = engine
            .resolve(&invoice, "L1", Decision::Approve, &ops(), None, at())
            .unwrap()
            .invoice;
        let rejected = engine
            .resolve(
                &after_l1,
                "L2",
                Decision::Reject,
                &finance(),
                Some("Duplicate of INV-0998"),
                at(),
            )
            .unwrap();

        assert_eq!(rejected.next, NextStep::Rejected);
        assert_eq!(rejected.invoice.status, InvoiceStatus::Rejected);
        assert_eq!(
            statuses(&rejected.invoice),
            vec![StepStatus::Approved, StepStatus::Rejected, StepStatus::Pending]
        );

        let again = engine.resolve(&rejected.invoice, "L2", Decision::Approve, &finance(), None, at());
        assert!(matches!(again, Err(WorkflowError::InvalidStepState { .. })));
    }

    #[test]
    fn test_last_step_approval_completes_invoice() {
        let steps = vec![
            WorkflowStepConfig::human("L1", "Ops", "ops_manager"),
            WorkflowStepConfig::human("L2", "Variance review", "finance_controller")
                .with_condition(ConditionType::VarianceGt, Some(250.0)),
        ];
        let (engine, workflow) =
            engine_with(WorkflowConfig::new("two_step", "Two step", "", steps).unwrap());
        let invoice = ingest(&workflow, 900.0, 100.0);

        let resolution = engine
            .resolve(&invoice, "L1", Decision::Approve, &ops(), None, at())
            .unwrap();

        assert_eq!(resolution.next, NextStep::Completed);
        assert_eq!(resolution.invoice.status, InvoiceStatus::Approved);
        assert_eq!(
            statuses(&resolution.invoice),
            vec![StepStatus::Approved, StepStatus::Skipped]
        );
        assert_eq!(resolution.invoice.current_step_count(), 0);
    }

    #[test]
    fn test_scan_follows_configuration_order_not_history_order() {
        let (engine, workflow) = engine_with(three_step_workflow());
        let mut invoice = ingest(&workflow, 20000.0, 0.0);
        // history stored out of configuration order
        invoice.workflow_history.reverse();

        let resolution = engine
            .resolve(&invoice, "L1", Decision::Approve, &ops(), None, at())
            .unwrap();

        assert_eq!(
            resolution.next,
            NextStep::AwaitingApproval {
                step_id: "L2".to_string()
            }
        );
        assert_eq!(
            resolution.invoice.history_item("L3").unwrap().status,
            StepStatus::Pending
        );
    }

    #[test]
    fn test_steps_missing_from_history_are_passed_over() {
        let (engine, workflow) = engine_with(three_step_workflow());
        let mut invoice = ingest(&workflow, 20000.0, 0.0);
        invoice.workflow_history.retain(|h| h.step_id != "L2");

        let resolution = engine
            .resolve(&invoice, "L1", Decision::Approve, &ops(), None, at())
            .unwrap();

        assert!(resolution.skipped.is_empty());
        assert_eq!(
            resolution.next,
            NextStep::Processing {
                step_id: "L3".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_step_and_non_current_step() {
        let (engine, workflow) = engine_with(three_step_workflow());
        let invoice = ingest(&workflow, 20000.0, 0.0);

        let unknown = engine.resolve(&invoice, "L9", Decision::Approve, &ops(), None, at());
        let pending = engine.resolve(&invoice, "L3", Decision::Approve, &ops(), None, at());

        assert_eq!(
            unknown.unwrap_err(),
            WorkflowError::StepNotFound {
                invoice_id: "INV-1001".to_string(),
                step_id: "L9".to_string()
            }
        );
        match pending {
            Err(WorkflowError::InvalidStepState { status, .. }) => {
                assert_eq!(status, StepStatus::Pending)
            }
            other => panic!("expected InvalidStepState, got {:?}", other),
        }
    }

    #[test]
    fn test_unpinned_workflow_version_is_reported() {
        let (engine, workflow) = engine_with(three_step_workflow());
        let mut invoice = ingest(&workflow, 20000.0, 0.0);
        invoice.workflow_version = 7;

        let result = engine.resolve(&invoice, "L1", Decision::Approve, &ops(), None, at());

        assert!(matches!(result, Err(WorkflowError::UnknownWorkflow(_))));
    }
}

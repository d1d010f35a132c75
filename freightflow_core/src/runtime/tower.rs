use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::{ResolvePolicy, TowerConfig};
use super::scheduler::Scheduler;
use crate::clock::Clock;
use crate::core::{Actor, Dispute, Invoice, InvoiceStatus, NewInvoice, VendorAction};
use crate::error::WorkflowError;
use crate::rbac::RoleDirectory;
use crate::store::InvoiceStore;
use crate::workflow::transition::SETTLEMENT_COMMENT;
use crate::workflow::{
    Decision, Engine, NextStep, Resolution, SettlementTicket, StepStatus, WorkflowStepConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resolved {
        invoice_status: InvoiceStatus,
        next: NextStep,
    },
    /// Lenient policy swallowed the error; nothing was written.
    Ignored(WorkflowError),
    /// A settlement fired for an invoice that moved on without it.
    Stale,
}

impl From<&Resolution> for Outcome {
    fn from(resolution: &Resolution) -> Self {
        Outcome::Resolved {
            invoice_status: resolution.invoice.status,
            next: resolution.next.clone(),
        }
    }
}

/// Host for the decision engine: owns the invoice store, the displayed
/// invoice, the clock and the settlement scheduler.
///
/// Every mutation reads a snapshot, builds the next one and commits it with
/// a single `put`, so a failed call never leaves a partial write behind.
pub struct ControlTower {
    engine: Engine,
    store: Box<dyn InvoiceStore>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    config: TowerConfig,
    selected: Option<Invoice>,
    last_epoch: u64,
}

impl ControlTower {
    pub fn new(
        engine: Engine,
        store: Box<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        config: TowerConfig,
    ) -> Self {
        let last_epoch = store
            .list()
            .iter()
            .map(|i| i.workflow_epoch)
            .max()
            .unwrap_or(0);

        Self {
            engine,
            store,
            clock,
            scheduler,
            config,
            selected: None,
            last_epoch,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Workflow edits go through here; they only affect invoices ingested
    /// afterwards.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn config(&self) -> &TowerConfig {
        &self.config
    }

    pub fn invoice(&self, invoice_id: &str) -> Option<Invoice> {
        self.store.get(invoice_id)
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.store.list()
    }

    /// Attaches the latest version of `workflow_id` and stores the invoice.
    pub fn ingest(
        &mut self,
        new_invoice: NewInvoice,
        workflow_id: &str,
    ) -> Result<Invoice, WorkflowError> {
        if self.store.contains(&new_invoice.id) {
            return Err(WorkflowError::DuplicateInvoice(new_invoice.id));
        }

        if new_invoice.status.is_workflow_terminal() {
            return Err(WorkflowError::Validation(format!(
                "Invoice '{}' cannot enter a workflow while {}",
                new_invoice.id, new_invoice.status
            )));
        }

        let workflow = self.engine.latest(workflow_id)?;
        let epoch = self.next_epoch();
        let invoice = new_invoice.into_invoice(&workflow, epoch);

        info!(
            invoice_id = %invoice.id,
            workflow_id = %workflow.id,
            workflow_version = workflow.version,
            "invoice ingested"
        );

        self.commit(invoice.clone());
        Ok(invoice)
    }

    /// Records a human (or system) decision on the invoice's current step and
    /// advances the workflow.
    pub fn resolve_step(
        &mut self,
        invoice_id: &str,
        step_id: &str,
        decision: Decision,
        actor: &Actor,
        comment: Option<&str>,
    ) -> Result<Outcome, WorkflowError> {
        let result = self
            .apply(invoice_id, step_id, decision, actor, comment)
            .map(|resolution| Outcome::from(&resolution));

        self.with_policy(invoice_id, step_id, result)
    }

    /// Like `resolve_step`, but only for actors the role directory lets act
    /// on the step. Lookup failures go through the same policy.
    pub fn resolve_step_as(
        &mut self,
        roles: &RoleDirectory,
        invoice_id: &str,
        step_id: &str,
        decision: Decision,
        actor: &Actor,
        comment: Option<&str>,
    ) -> Result<Outcome, WorkflowError> {
        let step = match self.step_config(invoice_id, step_id) {
            Ok(step) => step,
            Err(e) => return self.with_policy(invoice_id, step_id, Err(e)),
        };
        roles.authorize(actor, &step)?;

        self.resolve_step(invoice_id, step_id, decision, actor, comment)
    }

    /// Completes a system step whose settlement timer fired.
    pub fn settle(&mut self, ticket: &SettlementTicket) -> Result<Outcome, WorkflowError> {
        let Some(invoice) = self.store.get(&ticket.invoice_id) else {
            warn!(invoice_id = %ticket.invoice_id, "settlement for removed invoice dropped");
            return Ok(Outcome::Stale);
        };

        if invoice.workflow_epoch != ticket.workflow_epoch {
            warn!(
                invoice_id = %ticket.invoice_id,
                expected = ticket.workflow_epoch,
                found = invoice.workflow_epoch,
                "settlement for superseded workflow dropped"
            );
            return Ok(Outcome::Stale);
        }

        let still_processing = invoice
            .history_item(&ticket.step_id)
            .map(|item| item.status == StepStatus::Processing)
            .unwrap_or(false);

        if !still_processing {
            warn!(
                invoice_id = %ticket.invoice_id,
                step_id = %ticket.step_id,
                "settlement for step no longer processing dropped"
            );
            return Ok(Outcome::Stale);
        }

        let resolution = self.apply(
            &ticket.invoice_id,
            &ticket.step_id,
            Decision::Approve,
            &Actor::system(),
            Some(SETTLEMENT_COMMENT),
        )?;

        Ok(Outcome::from(&resolution))
    }

    /// Re-schedules a settlement for every step left in PROCESSING, e.g.
    /// after the timers of a previous session were lost.
    pub fn reconcile(&mut self) -> usize {
        let tickets: Vec<SettlementTicket> = self
            .store
            .list()
            .iter()
            .filter_map(|invoice| {
                invoice.processing_step().map(|item| SettlementTicket {
                    invoice_id: invoice.id.clone(),
                    step_id: item.step_id.clone(),
                    workflow_epoch: invoice.workflow_epoch,
                })
            })
            .collect();

        for ticket in &tickets {
            self.scheduler
                .schedule(self.config.settlement_delay, ticket.clone());
        }

        if !tickets.is_empty() {
            info!(count = tickets.len(), "rescheduled stuck settlements");
        }

        tickets.len()
    }

    pub fn processing_count(&self) -> usize {
        self.store
            .list()
            .iter()
            .filter(|i| i.processing_step().is_some())
            .count()
    }

    /// Invoices whose ACTIVE human step the actor is allowed to decide.
    pub fn inbox(&self, actor: &Actor, roles: &RoleDirectory) -> Vec<Invoice> {
        self.store
            .list()
            .into_iter()
            .filter(|invoice| {
                if invoice.status.is_workflow_terminal() {
                    return false;
                }
                let Some(current) = invoice.current_step() else {
                    return false;
                };
                if current.status != StepStatus::Active {
                    return false;
                }
                self.engine
                    .workflow(&invoice.workflow_id, invoice.workflow_version)
                    .ok()
                    .and_then(|w| w.step(&current.step_id).cloned())
                    .map(|step| !step.is_system_step && roles.can_act(actor, &step))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Step definition from the workflow version the invoice is pinned to.
    pub fn step_config(
        &self,
        invoice_id: &str,
        step_id: &str,
    ) -> Result<WorkflowStepConfig, WorkflowError> {
        let invoice = self
            .store
            .get(invoice_id)
            .ok_or_else(|| WorkflowError::InvoiceNotFound(invoice_id.to_string()))?;

        self.engine
            .workflow(&invoice.workflow_id, invoice.workflow_version)?
            .step(step_id)
            .cloned()
            .ok_or_else(|| WorkflowError::StepNotFound {
                invoice_id: invoice_id.to_string(),
                step_id: step_id.to_string(),
            })
    }

    pub fn select(&mut self, invoice_id: &str) -> Result<&Invoice, WorkflowError> {
        let invoice = self
            .store
            .get(invoice_id)
            .ok_or_else(|| WorkflowError::InvoiceNotFound(invoice_id.to_string()))?;

        Ok(self.selected.insert(invoice))
    }

    pub fn selected(&self) -> Option<&Invoice> {
        self.selected.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Manual whole-record replacement. Outstanding settlements for the old
    /// record are invalidated.
    pub fn override_invoice(&mut self, mut invoice: Invoice) -> Result<(), WorkflowError> {
        if !self.store.contains(&invoice.id) {
            return Err(WorkflowError::InvoiceNotFound(invoice.id));
        }

        invoice.workflow_epoch = self.next_epoch();
        info!(invoice_id = %invoice.id, status = %invoice.status, "invoice overridden");
        self.commit(invoice);
        Ok(())
    }

    pub fn remove_invoice(&mut self, invoice_id: &str) -> Option<Invoice> {
        let removed = self.store.remove(invoice_id);

        if self.selected.as_ref().is_some_and(|s| s.id == invoice_id) {
            self.selected = None;
        }

        if removed.is_some() {
            info!(invoice_id = %invoice_id, "invoice removed");
        }
        removed
    }

    /// Carrier answered a dispute from the vendor portal.
    pub fn record_vendor_response(
        &mut self,
        invoice_id: &str,
        action: VendorAction,
        comment: Option<&str>,
    ) -> Result<Invoice, WorkflowError> {
        let mut invoice = self
            .store
            .get(invoice_id)
            .ok_or_else(|| WorkflowError::InvoiceNotFound(invoice_id.to_string()))?;

        invoice.dispute = Some(Dispute::with_vendor_response(
            invoice.dispute.as_ref(),
            action,
            comment,
            self.clock.now(),
        ));
        invoice.status = InvoiceStatus::VendorResponded;

        info!(invoice_id = %invoice_id, action = action.label(), "vendor responded to dispute");
        self.commit(invoice.clone());
        Ok(invoice)
    }

    fn with_policy(
        &self,
        invoice_id: &str,
        step_id: &str,
        result: Result<Outcome, WorkflowError>,
    ) -> Result<Outcome, WorkflowError> {
        match result {
            Err(e) if e.is_ignorable() && self.config.policy == ResolvePolicy::Lenient => {
                warn!(
                    invoice_id = %invoice_id,
                    step_id = %step_id,
                    error = %e,
                    "ignoring decision"
                );
                Ok(Outcome::Ignored(e))
            }
            other => other,
        }
    }

    fn apply(
        &mut self,
        invoice_id: &str,
        step_id: &str,
        decision: Decision,
        actor: &Actor,
        comment: Option<&str>,
    ) -> Result<Resolution, WorkflowError> {
        let invoice = self
            .store
            .get(invoice_id)
            .ok_or_else(|| WorkflowError::InvoiceNotFound(invoice_id.to_string()))?;

        let resolution =
            self.engine
                .resolve(&invoice, step_id, decision, actor, comment, self.clock.now())?;

        self.commit(resolution.invoice.clone());

        if let Some(ticket) = resolution.settlement() {
            debug!(
                invoice_id = %ticket.invoice_id,
                step_id = %ticket.step_id,
                delay_ms = self.config.settlement_delay.as_millis() as u64,
                "settlement scheduled"
            );
            self.scheduler
                .schedule(self.config.settlement_delay, ticket);
        }

        info!(
            invoice_id = %invoice_id,
            step_id = %step_id,
            decision = ?decision,
            actor = %actor.name,
            invoice_status = %resolution.invoice.status,
            "step resolved"
        );

        Ok(resolution)
    }

    fn commit(&mut self, invoice: Invoice) {
        if self.selected.as_ref().is_some_and(|s| s.id == invoice.id) {
            self.selected = Some(invoice.clone());
        }
        self.store.put(invoice);
    }

    fn next_epoch(&mut self) -> u64 {
        self.last_epoch += 1;
        self.last_epoch
    }
}

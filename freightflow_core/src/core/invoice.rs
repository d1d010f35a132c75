use serde::{Deserialize, Serialize};

use super::dispute::Dispute;
use crate::workflow::{StepStatus, WorkflowConfig, WorkflowHistoryItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Exception,
    Approved,
    Rejected,
    VendorResponded,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Exception => "EXCEPTION",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::VendorResponded => "VENDOR_RESPONDED",
            Self::Paid => "PAID",
        }
    }

    /// Statuses the approval workflow can end in. Nothing moves afterwards.
    pub fn is_workflow_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub carrier: String,
    pub origin: String,
    pub destination: String,
    pub amount: f64,
    pub currency: String,
    /// Positive means the carrier overcharged.
    pub variance: f64,
    pub status: InvoiceStatus,

    pub workflow_id: String,
    pub workflow_version: u32,
    /// Bumped whenever the history is rebuilt or overridden; pending
    /// settlements carry the epoch they were scheduled under.
    pub workflow_epoch: u64,
    pub workflow_history: Vec<WorkflowHistoryItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispute: Option<Dispute>,
}

impl Invoice {
    pub fn history_item(&self, step_id: &str) -> Option<&WorkflowHistoryItem> {
        self.workflow_history.iter().find(|h| h.step_id == step_id)
    }

    pub fn history_item_mut(&mut self, step_id: &str) -> Option<&mut WorkflowHistoryItem> {
        self.workflow_history
            .iter_mut()
            .find(|h| h.step_id == step_id)
    }

    /// The unique ACTIVE or PROCESSING item, if the workflow is in flight.
    pub fn current_step(&self) -> Option<&WorkflowHistoryItem> {
        self.workflow_history.iter().find(|h| h.status.is_current())
    }

    pub fn processing_step(&self) -> Option<&WorkflowHistoryItem> {
        self.workflow_history
            .iter()
            .find(|h| h.status == StepStatus::Processing)
    }

    pub fn current_step_count(&self) -> usize {
        self.workflow_history
            .iter()
            .filter(|h| h.status.is_current())
            .count()
    }
}

/// An invoice as it arrives from extraction, before a workflow is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub id: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub variance: f64,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub dispute: Option<Dispute>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl NewInvoice {
    pub fn new(id: &str, amount: f64, variance: f64) -> Self {
        Self {
            id: id.to_owned(),
            invoice_number: id.to_owned(),
            carrier: String::new(),
            origin: String::new(),
            destination: String::new(),
            amount,
            currency: default_currency(),
            variance,
            status: InvoiceStatus::Pending,
            dispute: None,
        }
    }

    /// Attaches the workflow snapshot: first step ACTIVE, the rest PENDING.
    pub fn into_invoice(self, workflow: &WorkflowConfig, epoch: u64) -> Invoice {
        Invoice {
            id: self.id,
            invoice_number: self.invoice_number,
            carrier: self.carrier,
            origin: self.origin,
            destination: self.destination,
            amount: self.amount,
            currency: self.currency,
            variance: self.variance,
            status: self.status,
            workflow_id: workflow.id.clone(),
            workflow_version: workflow.version,
            workflow_epoch: epoch,
            workflow_history: workflow.initial_history(),
            dispute: self.dispute,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use serde_json::json;

    use super::*;
    use crate::workflow::test_support::three_step_workflow;

    #[test]
    fn ingested_invoice_starts_at_first_step() {
        let invoice = NewInvoice::new("INV-1", 5000.0, 0.0).into_invoice(&three_step_workflow(), 1);

        assert_eq!(invoice.workflow_id, "freight_audit");
        assert_eq!(invoice.workflow_history.len(), 3);
        assert_eq!(invoice.workflow_history[0].status, StepStatus::Active);
        assert_eq!(invoice.workflow_history[1].status, StepStatus::Pending);
        assert_eq!(invoice.workflow_history[2].status, StepStatus::Pending);
        assert_eq!(invoice.current_step().unwrap().step_id, "L1");
        assert_eq!(invoice.current_step_count(), 1);
    }

    #[test]
    fn new_invoice_parses_with_defaults() {
        let parsed: NewInvoice = serde_json::from_value(json!({
            "id": "INV-9",
            "carrier": "Maersk",
            "amount": 12500.5,
            "status": "EXCEPTION"
        }))
        .unwrap();

        assert_eq!(parsed.currency, "USD");
        assert_eq!(parsed.variance, 0.0);
        assert_eq!(parsed.status, InvoiceStatus::Exception);
    }

    #[test]
    fn only_approved_and_rejected_end_the_workflow() {
        assert!(InvoiceStatus::Approved.is_workflow_terminal());
        assert!(InvoiceStatus::Rejected.is_workflow_terminal());
        assert!(!InvoiceStatus::Exception.is_workflow_terminal());
        assert!(!InvoiceStatus::VendorResponded.is_workflow_terminal());
        assert_eq!(InvoiceStatus::VendorResponded.to_string(), "VENDOR_RESPONDED");
    }
}

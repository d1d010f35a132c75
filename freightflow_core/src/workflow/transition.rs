use serde::{Deserialize, Serialize};

use super::state::StepStatus;
use crate::core::Invoice;

pub const SETTLEMENT_COMMENT: &str = "System settlement processed automatically.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn resulting_status(&self) -> StepStatus {
        match self {
            Decision::Approve => StepStatus::Approved,
            Decision::Reject => StepStatus::Rejected,
        }
    }
}

/// Deferred continuation for a system step left in PROCESSING.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettlementTicket {
    pub invoice_id: String,
    pub step_id: String,
    pub workflow_epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Rejected,
    AwaitingApproval { step_id: String },
    Processing { step_id: String },
    Completed,
}

/// New invoice snapshot produced by a single decision, not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub invoice: Invoice,
    pub next: NextStep,
    pub skipped: Vec<String>,
}

impl Resolution {
    pub fn settlement(&self) -> Option<SettlementTicket> {
        match &self.next {
            NextStep::Processing { step_id } => Some(SettlementTicket {
                invoice_id: self.invoice.id.clone(),
                step_id: step_id.clone(),
                workflow_epoch: self.invoice.workflow_epoch,
            }),
            _ => None,
        }
    }
}

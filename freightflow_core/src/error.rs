use thiserror::Error;

use crate::core::InvoiceStatus;
use crate::workflow::StepStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("{0}")]
    Definition(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Parsing(String),

    #[error("Invoice '{0}' not found")]
    InvoiceNotFound(String),

    #[error("Step '{step_id}' not found in workflow history of invoice '{invoice_id}'")]
    StepNotFound { invoice_id: String, step_id: String },

    #[error("Step '{step_id}' cannot be resolved while {status} (invoice is {invoice_status})")]
    InvalidStepState {
        step_id: String,
        status: StepStatus,
        invoice_status: InvoiceStatus,
    },

    #[error("Invoice '{0}' already exists")]
    DuplicateInvoice(String),

    #[error("Unknown workflow {0}")]
    UnknownWorkflow(String),

    #[error("Actor '{actor}' with role '{role_id}' may not act on step '{step_id}'")]
    Unauthorized {
        actor: String,
        role_id: String,
        step_id: String,
    },

    #[error("Control tower runner is no longer accepting commands")]
    RunnerClosed,
}

impl WorkflowError {
    /// Failures that leave the store untouched and that the lenient policy
    /// turns into no-ops.
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            WorkflowError::InvoiceNotFound(_)
                | WorkflowError::StepNotFound { .. }
                | WorkflowError::InvalidStepState { .. }
        )
    }
}

pub mod definition;
pub mod engine;
pub mod state;
pub mod transition;
pub mod validators;

pub use definition::{ConditionType, WorkflowConfig, WorkflowStepConfig};
pub use engine::Engine;
pub use state::{StepStatus, WorkflowHistoryItem};
pub use transition::{Decision, NextStep, Resolution, SettlementTicket};
pub use validators::Validator;

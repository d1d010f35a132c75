#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::indexing_slicing)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]

pub mod clock;
pub mod core;
pub mod error;
pub mod rbac;
pub mod runtime;
pub mod store;
pub mod workflow;

pub use clock::{Clock, FixedClock, SystemClock};
pub use crate::core::{Actor, Invoice, InvoiceStatus, NewInvoice};
pub use error::WorkflowError;
pub use rbac::{Permissions, RoleDefinition, RoleDirectory};
pub use runtime::{ControlTower, ResolvePolicy, TowerConfig, TowerHandle, TowerRunner};
pub use store::{InvoiceStore, MemoryStore};
pub use workflow::{
    Decision, Engine, StepStatus, WorkflowConfig, WorkflowHistoryItem, WorkflowStepConfig,
};

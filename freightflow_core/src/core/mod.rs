pub mod actor;
pub mod dispute;
pub mod invoice;

pub use actor::Actor;
pub use dispute::{Dispute, DisputeActor, DisputeEntry, DisputeStatus, VendorAction};
pub use invoice::{Invoice, InvoiceStatus, NewInvoice};

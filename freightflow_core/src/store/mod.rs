pub mod memory;

pub use memory::MemoryStore;

use crate::core::Invoice;

/// Holder of invoice records. Writes replace the whole record.
pub trait InvoiceStore: Send {
    fn get(&self, invoice_id: &str) -> Option<Invoice>;
    fn put(&mut self, invoice: Invoice);
    fn remove(&mut self, invoice_id: &str) -> Option<Invoice>;
    fn contains(&self, invoice_id: &str) -> bool {
        self.get(invoice_id).is_some()
    }
    /// All invoices ordered by id.
    fn list(&self) -> Vec<Invoice>;
}

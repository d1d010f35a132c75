use std::collections::BTreeMap;

use super::InvoiceStore;
use crate::core::Invoice;

#[derive(Debug, Default)]
pub struct MemoryStore {
    invoices: BTreeMap<String, Invoice>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }
}

impl InvoiceStore for MemoryStore {
    fn get(&self, invoice_id: &str) -> Option<Invoice> {
        self.invoices.get(invoice_id).cloned()
    }

    fn put(&mut self, invoice: Invoice) {
        self.invoices.insert(invoice.id.clone(), invoice);
    }

    fn remove(&mut self, invoice_id: &str) -> Option<Invoice> {
        self.invoices.remove(invoice_id)
    }

    fn contains(&self, invoice_id: &str) -> bool {
        self.invoices.contains_key(invoice_id)
    }

    fn list(&self) -> Vec<Invoice> {
        self.invoices.values().cloned().collect()
    }
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in retail entity catalog.
//!
//! Most entities are read-only while offline. The point-of-sale flow (ring up
//! a sale, take payment, move cash, adjust stock, register a customer) is the
//! allow-list that keeps working without a connection.

use std::sync::Arc;

use crate::error::Result;
use crate::registry::{EntityDescriptor, Registry};
use crate::remote::RemoteApi;

/// Schema version of the catalog below. Bump when tables or indexes change.
pub const CATALOG_VERSION: i64 = 1;

/// One catalog row.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub offline_writable: bool,
    pub indexes: &'static [&'static str],
}

const fn ro(name: &'static str, indexes: &'static [&'static str]) -> CatalogEntry {
    CatalogEntry {
        name,
        offline_writable: false,
        indexes,
    }
}

const fn rw(name: &'static str, indexes: &'static [&'static str]) -> CatalogEntry {
    CatalogEntry {
        name,
        offline_writable: true,
        indexes,
    }
}

pub const CATALOG: &[CatalogEntry] = &[
    // Products and pricing
    ro("products", &["category_id", "brand_id", "supplier_id", "barcode", "active"]),
    ro("product_categories", &["parent_id"]),
    ro("product_variants", &["product_id", "sku"]),
    ro("brands", &[]),
    ro("units", &[]),
    ro("price_tables", &["active"]),
    ro("promotions", &["active", "starts_at"]),
    // People
    rw("customers", &["document", "email"]),
    ro("customer_groups", &[]),
    ro("suppliers", &["document"]),
    ro("employees", &["store_id", "role_id"]),
    ro("roles", &[]),
    ro("commissions", &["employee_id", "status"]),
    // Point of sale
    rw("sales", &["status", "customer_id", "cash_register_id", "created_at"]),
    rw("sale_items", &["sale_id", "product_id"]),
    rw("sale_payments", &["sale_id", "payment_method_id"]),
    ro("payment_methods", &["active"]),
    rw("cash_registers", &["status", "store_id", "operator_id"]),
    rw("cash_movements", &["cash_register_id", "kind", "created_at"]),
    ro("returns", &["sale_id", "status"]),
    ro("quotes", &["status", "customer_id"]),
    ro("quote_items", &["quote_id", "product_id"]),
    ro("invoices", &["status", "sale_id"]),
    // Inventory
    rw("stock_movements", &["product_id", "warehouse_id", "kind", "created_at"]),
    ro("stock_levels", &["product_id", "warehouse_id"]),
    ro("warehouses", &["store_id"]),
    ro("stores", &[]),
    ro("purchase_orders", &["status", "supplier_id"]),
    ro("purchase_order_items", &["purchase_order_id", "product_id"]),
    // Finance
    ro("payables", &["status", "supplier_id", "due_date"]),
    ro("receivables", &["status", "customer_id", "due_date"]),
    ro("bank_accounts", &[]),
    ro("expense_categories", &[]),
];

impl CatalogEntry {
    pub fn descriptor(&self, remote: Arc<dyn RemoteApi>) -> EntityDescriptor {
        let descriptor = EntityDescriptor::new(self.name, remote);
        let descriptor = if self.offline_writable {
            descriptor.offline_writable()
        } else {
            descriptor
        };
        self.indexes
            .iter()
            .fold(descriptor, |d, field| d.index(*field))
    }
}

/// Build the retail registry, asking `remote_for` for each entity's remote.
pub fn retail_registry<F>(mut remote_for: F) -> Result<Registry>
where
    F: FnMut(&str) -> Arc<dyn RemoteApi>,
{
    let mut registry = Registry::new(CATALOG_VERSION);
    for entry in CATALOG {
        registry.register(entry.descriptor(remote_for(entry.name)))?;
    }
    Ok(registry)
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;

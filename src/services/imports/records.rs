//! Normalized records produced by validation and consumed by the importer.

use super::detect::ImportRecordKind;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedProductRecord {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub selling_price: Decimal,
    pub cost_price: Decimal,
    pub weight_kg: Option<Decimal>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedInventoryRecord {
    pub product_id: Uuid,
    pub location_id: Option<Uuid>,
    pub quantity: i32,
    pub reorder_level: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedOrderLineRecord {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub notes: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub status: String,
}

/// A validated record plus the CSV row it came from (header is row 1)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accepted<T> {
    pub row_number: usize,
    pub record: T,
}

/// Accepted rows for exactly one record kind
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptedRecords {
    Products(Vec<Accepted<NormalizedProductRecord>>),
    Inventory(Vec<Accepted<NormalizedInventoryRecord>>),
    Orders(Vec<Accepted<NormalizedOrderLineRecord>>),
}

impl AcceptedRecords {
    pub fn empty(kind: ImportRecordKind) -> Option<Self> {
        match kind {
            ImportRecordKind::Products => Some(Self::Products(Vec::new())),
            ImportRecordKind::Inventory => Some(Self::Inventory(Vec::new())),
            ImportRecordKind::Orders => Some(Self::Orders(Vec::new())),
            ImportRecordKind::Unknown => None,
        }
    }

    pub fn kind(&self) -> ImportRecordKind {
        match self {
            Self::Products(_) => ImportRecordKind::Products,
            Self::Inventory(_) => ImportRecordKind::Inventory,
            Self::Orders(_) => ImportRecordKind::Orders,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Products(rows) => rows.len(),
            Self::Inventory(rows) => rows.len(),
            Self::Orders(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lines sharing one `(customer_name, customer_email)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedOrder {
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub status: String,
    pub items: Vec<Accepted<NormalizedOrderLineRecord>>,
    /// `None` when the line totals overflow a `Decimal`
    pub subtotal: Option<Decimal>,
}

/// Groups order lines by exact customer pair, keeping first-appearance order.
///
/// The header status is taken from the group's first line.
pub fn consolidate_orders<F>(
    lines: Vec<Accepted<NormalizedOrderLineRecord>>,
    mut next_order_number: F,
) -> Vec<ConsolidatedOrder>
where
    F: FnMut() -> String,
{
    let mut groups: Vec<ConsolidatedOrder> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for line in lines {
        let key = (
            line.record.customer_name.clone(),
            line.record.customer_email.clone(),
        );

        match index.get(&key) {
            Some(&position) => {
                let group = &mut groups[position];
                group.subtotal = group
                    .subtotal
                    .and_then(|sum| sum.checked_add(line.record.total_price));
                group.items.push(line);
            }
            None => {
                index.insert(key, groups.len());
                groups.push(ConsolidatedOrder {
                    order_number: next_order_number(),
                    customer_name: line.record.customer_name.clone(),
                    customer_email: line.record.customer_email.clone(),
                    status: line.record.status.clone(),
                    subtotal: Some(line.record.total_price),
                    items: vec![line],
                });
            }
        }
    }

    groups
}

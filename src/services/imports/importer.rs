//! Persists accepted records: product batches, one inventory upsert, and one
//! header-plus-items pair per consolidated order. Batches and groups run
//! sequentially; a failure is recorded and the run moves on.

use super::records::{
    consolidate_orders, Accepted, AcceptedRecords, ConsolidatedOrder, NormalizedInventoryRecord,
    NormalizedOrderLineRecord, NormalizedProductRecord,
};
use super::result::PersistenceOutcome;
use super::store::{ImportStore, NewOrder};
use crate::config::{ImportConfig, OrphanedOrderPolicy};
use crate::errors::ServiceError;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

const ORDER_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ORDER_SUFFIX_LEN: usize = 5;

/// `ORD-<unix_millis>-<5 base36 chars, uppercased>`. Uniqueness is not re-checked.
pub fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| ORDER_SUFFIX_ALPHABET[rng.gen_range(0..ORDER_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!(
        "ORD-{}-{}",
        Utc::now().timestamp_millis(),
        suffix.to_uppercase()
    )
}

pub struct BatchImporter {
    store: Arc<dyn ImportStore>,
    config: ImportConfig,
}

impl BatchImporter {
    pub fn new(store: Arc<dyn ImportStore>, config: ImportConfig) -> Self {
        Self { store, config }
    }

    pub async fn import(&self, accepted: AcceptedRecords) -> PersistenceOutcome {
        match accepted {
            AcceptedRecords::Products(rows) => self.import_products(rows).await,
            AcceptedRecords::Inventory(rows) => self.import_inventory(rows).await,
            AcceptedRecords::Orders(rows) => self.import_orders(rows).await,
        }
    }

    async fn import_products(
        &self,
        rows: Vec<Accepted<NormalizedProductRecord>>,
    ) -> PersistenceOutcome {
        let mut outcome = PersistenceOutcome::default();
        let batch_size = self.config.product_batch_size.max(1);

        for (index, batch) in rows.chunks(batch_size).enumerate() {
            let batch_number = index + 1;
            let first = batch.first().map(|r| r.row_number).unwrap_or_default();
            let last = batch.last().map(|r| r.row_number).unwrap_or_default();
            let records = batch.iter().map(|r| r.record.clone()).collect();

            match self.store.insert_products(records).await {
                Ok(_) => outcome.successful_rows += batch.len(),
                Err(err) => {
                    let reason = if err.is_duplicate_key() {
                        "Some SKUs already exist".to_string()
                    } else {
                        err.detail()
                    };
                    warn!(batch_number, rows = batch.len(), error = %err, "Product batch failed");
                    outcome.failed_rows += batch.len();
                    outcome.errors.push(format!(
                        "Batch {} (rows {}-{}): {}",
                        batch_number, first, last, reason
                    ));
                }
            }
        }

        outcome
    }

    async fn import_inventory(
        &self,
        rows: Vec<Accepted<NormalizedInventoryRecord>>,
    ) -> PersistenceOutcome {
        let accepted = rows.len();
        let records = rows.into_iter().map(|r| r.record).collect();

        match self.store.upsert_inventory(records).await {
            Ok(affected) => {
                let successful_rows = (affected as usize).min(accepted);
                PersistenceOutcome {
                    successful_rows,
                    failed_rows: accepted - successful_rows,
                    errors: Vec::new(),
                }
            }
            Err(err) => {
                warn!(rows = accepted, error = %err, "Inventory upsert failed");
                PersistenceOutcome {
                    successful_rows: 0,
                    failed_rows: accepted,
                    errors: vec![format!(
                        "Failed to import inventory: {}",
                        err.public_detail()
                    )],
                }
            }
        }
    }

    async fn import_orders(
        &self,
        rows: Vec<Accepted<NormalizedOrderLineRecord>>,
    ) -> PersistenceOutcome {
        let orders = consolidate_orders(rows, generate_order_number);
        let mut outcome = PersistenceOutcome::default();
        info!(groups = orders.len(), "Consolidated order lines");

        for order in orders {
            match self.persist_order(&order).await {
                Ok(()) => outcome.successful_rows += 1,
                Err(messages) => {
                    outcome.failed_rows += 1;
                    outcome.errors.extend(messages);
                }
            }
        }

        outcome
    }

    async fn persist_order(&self, order: &ConsolidatedOrder) -> Result<(), Vec<String>> {
        let Some(subtotal) = order.subtotal else {
            warn!(order_number = %order.order_number, "Order subtotal overflowed");
            return Err(vec![format!(
                "Failed to create order for {}: Order subtotal is out of range",
                order.customer_name
            )]);
        };

        let header = NewOrder {
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            status: order.status.clone(),
            subtotal,
        };

        let order_id = self.store.insert_order(header).await.map_err(|err| {
            warn!(order_number = %order.order_number, error = %err, "Order header insert failed");
            vec![format!(
                "Failed to create order for {}: {}",
                order.customer_name,
                err.public_detail()
            )]
        })?;

        let items = order.items.iter().map(|i| i.record.clone()).collect();
        let Err(err) = self.store.insert_order_items(order_id, items).await else {
            return Ok(());
        };

        warn!(order_number = %order.order_number, error = %err, "Order items insert failed");
        let mut messages = vec![format!(
            "Failed to add items to order {} for {}: {}",
            order.order_number,
            order.customer_name,
            err.public_detail()
        )];

        if self.config.orphaned_order_policy == OrphanedOrderPolicy::Compensate {
            if let Err(cleanup) = self.remove_orphan(order, order_id).await {
                messages.push(cleanup);
            }
        }

        Err(messages)
    }

    async fn remove_orphan(
        &self,
        order: &ConsolidatedOrder,
        order_id: uuid::Uuid,
    ) -> Result<(), String> {
        self.store
            .delete_order(order_id)
            .await
            .map(|()| info!(order_number = %order.order_number, "Removed order without items"))
            .map_err(|err: ServiceError| {
                warn!(order_number = %order.order_number, error = %err, "Order cleanup failed");
                format!(
                    "Failed to remove incomplete order {}: {}",
                    order.order_number,
                    err.public_detail()
                )
            })
    }
}

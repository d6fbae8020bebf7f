//! Boundary between the import pipeline and the database.

use super::records::{NormalizedInventoryRecord, NormalizedOrderLineRecord, NormalizedProductRecord};
use crate::entities::{category, inventory, location, order, order_item, product};
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRef {
    pub id: Uuid,
    pub sku: String,
    pub selling_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRef {
    pub id: Uuid,
    pub name: String,
}

/// Order header to insert before its items
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub status: String,
    pub subtotal: Decimal,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn fetch_categories(&self) -> Result<Vec<CategoryRef>, ServiceError>;

    async fn fetch_products(&self) -> Result<Vec<ProductRef>, ServiceError>;

    /// Oldest first; the first entry is the default location
    async fn fetch_locations(&self) -> Result<Vec<LocationRef>, ServiceError>;

    /// Inserts all records in one statement and returns the inserted count
    async fn insert_products(
        &self,
        records: Vec<NormalizedProductRecord>,
    ) -> Result<u64, ServiceError>;

    /// Insert-or-update keyed on `(product_id, location_id)`; returns rows affected
    async fn upsert_inventory(
        &self,
        records: Vec<NormalizedInventoryRecord>,
    ) -> Result<u64, ServiceError>;

    /// Returns the new order id
    async fn insert_order(&self, order: NewOrder) -> Result<Uuid, ServiceError>;

    async fn insert_order_items(
        &self,
        order_id: Uuid,
        items: Vec<NormalizedOrderLineRecord>,
    ) -> Result<u64, ServiceError>;

    async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError>;
}

/// `ImportStore` over a sea-orm connection
#[derive(Clone)]
pub struct SeaOrmImportStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmImportStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn store_error(operation: &'static str) -> impl Fn(sea_orm::DbErr) -> ServiceError {
    move |e| {
        error!(operation, error = %e, "Import store call failed");
        ServiceError::from_db(e)
    }
}

#[async_trait]
impl ImportStore for SeaOrmImportStore {
    async fn fetch_categories(&self) -> Result<Vec<CategoryRef>, ServiceError> {
        let rows: Vec<(Uuid, String)> = category::Entity::find()
            .select_only()
            .columns([category::Column::Id, category::Column::Name])
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(store_error("fetch_categories"))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| CategoryRef { id, name })
            .collect())
    }

    async fn fetch_products(&self) -> Result<Vec<ProductRef>, ServiceError> {
        let rows: Vec<(Uuid, String, Decimal)> = product::Entity::find()
            .select_only()
            .columns([
                product::Column::Id,
                product::Column::Sku,
                product::Column::SellingPrice,
            ])
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(store_error("fetch_products"))?;

        Ok(rows
            .into_iter()
            .map(|(id, sku, selling_price)| ProductRef {
                id,
                sku,
                selling_price,
            })
            .collect())
    }

    async fn fetch_locations(&self) -> Result<Vec<LocationRef>, ServiceError> {
        let rows: Vec<(Uuid, String)> = location::Entity::find()
            .select_only()
            .columns([location::Column::Id, location::Column::Name])
            .order_by_asc(location::Column::CreatedAt)
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(store_error("fetch_locations"))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| LocationRef { id, name })
            .collect())
    }

    async fn insert_products(
        &self,
        records: Vec<NormalizedProductRecord>,
    ) -> Result<u64, ServiceError> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models = records.into_iter().map(|r| product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(r.sku),
            name: Set(r.name),
            description: Set(r.description),
            category_id: Set(r.category_id),
            selling_price: Set(r.selling_price),
            cost_price: Set(r.cost_price),
            weight_kg: Set(r.weight_kg),
            status: Set(r.status),
            created_at: Set(now),
            updated_at: Set(None),
        });

        let inserted = product::Entity::insert_many(models)
            .exec_without_returning(&*self.db)
            .await
            .map_err(store_error("insert_products"))?;
        debug!(inserted, "Inserted product batch");
        Ok(inserted)
    }

    async fn upsert_inventory(
        &self,
        records: Vec<NormalizedInventoryRecord>,
    ) -> Result<u64, ServiceError> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models = records.into_iter().map(|r| inventory::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(r.product_id),
            location_id: Set(r.location_id),
            quantity: Set(r.quantity),
            reorder_level: Set(r.reorder_level),
            updated_at: Set(now),
        });

        let affected = inventory::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([inventory::Column::ProductId, inventory::Column::LocationId])
                    .update_columns([
                        inventory::Column::Quantity,
                        inventory::Column::ReorderLevel,
                        inventory::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await
            .map_err(store_error("upsert_inventory"))?;
        debug!(affected, "Upserted inventory rows");
        Ok(affected)
    }

    async fn insert_order(&self, new_order: NewOrder) -> Result<Uuid, ServiceError> {
        let id = Uuid::new_v4();
        let model = order::ActiveModel {
            id: Set(id),
            order_number: Set(new_order.order_number),
            customer_name: Set(new_order.customer_name),
            customer_email: Set(new_order.customer_email),
            status: Set(new_order.status),
            subtotal: Set(new_order.subtotal),
            notes: Set(None),
            created_at: Set(Utc::now()),
        };

        order::Entity::insert(model)
            .exec_without_returning(&*self.db)
            .await
            .map_err(store_error("insert_order"))?;
        Ok(id)
    }

    async fn insert_order_items(
        &self,
        order_id: Uuid,
        items: Vec<NormalizedOrderLineRecord>,
    ) -> Result<u64, ServiceError> {
        if items.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models = items.into_iter().map(|item| order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            total_price: Set(item.total_price),
            notes: Set(item.notes),
            created_at: Set(now),
        });

        order_item::Entity::insert_many(models)
            .exec_without_returning(&*self.db)
            .await
            .map_err(store_error("insert_order_items"))
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        order::Entity::delete_by_id(order_id)
            .exec(&*self.db)
            .await
            .map_err(store_error("delete_order"))?;
        Ok(())
    }
}

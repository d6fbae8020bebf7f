//! Natural-key lookup tables built once per import.

use super::detect::ImportRecordKind;
use super::store::{ImportStore, ProductRef};
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, error};
use uuid::Uuid;

/// Resolved product as seen by the orders path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductLookup {
    pub id: Uuid,
    pub selling_price: Decimal,
}

/// Case-insensitive lookup maps read by the row validator
#[derive(Debug, Clone, Default)]
pub struct ReferenceLookups {
    categories: HashMap<String, Uuid>,
    products: HashMap<String, ProductLookup>,
    locations: HashMap<String, Uuid>,
    default_location: Option<Uuid>,
}

fn lookup_key(value: &str) -> String {
    value.trim().to_lowercase()
}

impl ReferenceLookups {
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = (S, Uuid)>,
        S: AsRef<str>,
    {
        for (name, id) in categories {
            self.categories.entry(lookup_key(name.as_ref())).or_insert(id);
        }
        self
    }

    pub fn with_products<I>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = ProductRef>,
    {
        for product in products {
            self.products
                .entry(lookup_key(&product.sku))
                .or_insert(ProductLookup {
                    id: product.id,
                    selling_price: product.selling_price,
                });
        }
        self
    }

    /// The first location becomes the default for rows without one
    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = (S, Uuid)>,
        S: AsRef<str>,
    {
        for (name, id) in locations {
            self.default_location.get_or_insert(id);
            self.locations.entry(lookup_key(name.as_ref())).or_insert(id);
        }
        self
    }

    pub fn category(&self, name: &str) -> Option<Uuid> {
        self.categories.get(&lookup_key(name)).copied()
    }

    pub fn product(&self, sku: &str) -> Option<ProductLookup> {
        self.products.get(&lookup_key(sku)).copied()
    }

    pub fn location(&self, name: &str) -> Option<Uuid> {
        self.locations.get(&lookup_key(name)).copied()
    }

    pub fn default_location(&self) -> Option<Uuid> {
        self.default_location
    }
}

/// Fetches only what `kind` needs. Any store failure aborts the import.
pub async fn resolve(
    store: &dyn ImportStore,
    kind: ImportRecordKind,
) -> Result<ReferenceLookups, ServiceError> {
    let lookups = ReferenceLookups::default();

    let lookups = match kind {
        ImportRecordKind::Products => {
            let categories = store.fetch_categories().await.map_err(log_failure)?;
            debug!(count = categories.len(), "Loaded category lookup");
            lookups.with_categories(categories.into_iter().map(|c| (c.name, c.id)))
        }
        ImportRecordKind::Inventory => {
            let products = store.fetch_products().await.map_err(log_failure)?;
            let locations = store.fetch_locations().await.map_err(log_failure)?;
            debug!(
                products = products.len(),
                locations = locations.len(),
                "Loaded inventory lookups"
            );
            lookups
                .with_products(products)
                .with_locations(locations.into_iter().map(|l| (l.name, l.id)))
        }
        ImportRecordKind::Orders => {
            let products = store.fetch_products().await.map_err(log_failure)?;
            debug!(count = products.len(), "Loaded product lookup");
            lookups.with_products(products)
        }
        ImportRecordKind::Unknown => lookups,
    };

    Ok(lookups)
}

fn log_failure(err: ServiceError) -> ServiceError {
    error!(error = %err, "Reference lookup failed");
    err
}

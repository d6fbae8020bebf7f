//! Downloadable CSV templates. Their headers must keep detecting as their kind.

use super::detect::ImportRecordKind;

pub const PRODUCTS_TEMPLATE: &str = "\
SKU,Product Name,Category,Brand,Selling Price,Cost Price,Weight (kg),Description,Stock Quantity,Reorder Level,Status
WID-001,Standard Widget,Hardware,Acme,49.99,20.00,0.5,Zinc plated widget,100,10,active
";

pub const INVENTORY_TEMPLATE: &str = "\
sku,location,quantity,reorder_level
WID-001,Main Warehouse,100,10
";

pub const ORDERS_TEMPLATE: &str = "\
customer_name,customer_email,product_sku,quantity,unit_price,status,notes
Jane Doe,jane@example.com,WID-001,2,49.99,pending,Gift wrap
";

pub fn template_for(kind: ImportRecordKind) -> Option<&'static str> {
    match kind {
        ImportRecordKind::Products => Some(PRODUCTS_TEMPLATE),
        ImportRecordKind::Inventory => Some(INVENTORY_TEMPLATE),
        ImportRecordKind::Orders => Some(ORDERS_TEMPLATE),
        ImportRecordKind::Unknown => None,
    }
}

/// File name offered for download
pub fn template_file_name(kind: ImportRecordKind) -> String {
    format!("{}_template.csv", kind)
}

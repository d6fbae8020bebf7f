// Bulk CSV import of products, inventory and orders
pub mod imports;

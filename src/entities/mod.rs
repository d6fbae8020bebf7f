//! Database entities backing the catalogue, stock, order and permission tables.

pub mod category;
pub mod inventory;
pub mod location;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user_permission;
pub mod user_profile;

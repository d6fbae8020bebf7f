use super::parser::parse_headers;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Record kind selected once per input
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ImportRecordKind {
    Products,
    Inventory,
    Orders,
    Unknown,
}

/// Classifies normalized headers. Products wins over Inventory since both carry `sku`.
pub fn detect_headers<S: AsRef<str>>(headers: &[S]) -> ImportRecordKind {
    let has = |name: &str| headers.iter().any(|h| h.as_ref() == name);

    if has("sku") && has("name") && has("selling_price") {
        ImportRecordKind::Products
    } else if has("sku") && has("quantity") && !has("customer_name") {
        ImportRecordKind::Inventory
    } else if has("customer_name") && has("customer_email") && has("product_sku") {
        ImportRecordKind::Orders
    } else {
        ImportRecordKind::Unknown
    }
}

/// Classifies raw CSV text by its header line. Unreadable or empty input is `Unknown`.
pub fn detect(text: &str) -> ImportRecordKind {
    match parse_headers(text) {
        Ok(headers) => detect_headers(&headers),
        Err(_) => ImportRecordKind::Unknown,
    }
}

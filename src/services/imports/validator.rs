//! Per-row validation. Each row either becomes a normalized record or yields
//! exactly one `Row <n>: <reason>` message; the first failing rule wins.

use super::detect::ImportRecordKind;
use super::parser::RawRow;
use super::records::{
    Accepted, AcceptedRecords, NormalizedInventoryRecord, NormalizedOrderLineRecord,
    NormalizedProductRecord,
};
use super::resolver::ReferenceLookups;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

const DEFAULT_PRODUCT_STATUS: &str = "active";
const DEFAULT_ORDER_STATUS: &str = "pending";

/// Outcome of validating every row of one input
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub accepted: AcceptedRecords,
    pub errors: Vec<String>,
}

/// Header occupies row 1, so data row `index` is reported as `index + 2`.
pub fn row_number(index: usize) -> usize {
    index + 2
}

/// Returns `None` for [`ImportRecordKind::Unknown`], which has no rules.
pub fn validate(
    rows: &[RawRow],
    kind: ImportRecordKind,
    lookups: &ReferenceLookups,
) -> Option<ValidationReport> {
    let mut errors = Vec::new();

    let accepted = match kind {
        ImportRecordKind::Products => AcceptedRecords::Products(collect(rows, &mut errors, |row| {
            validate_product(row, lookups)
        })),
        ImportRecordKind::Inventory => {
            AcceptedRecords::Inventory(collect(rows, &mut errors, |row| {
                validate_inventory(row, lookups)
            }))
        }
        ImportRecordKind::Orders => AcceptedRecords::Orders(collect(rows, &mut errors, |row| {
            validate_order_line(row, lookups)
        })),
        ImportRecordKind::Unknown => return None,
    };

    Some(ValidationReport { accepted, errors })
}

fn collect<T, F>(rows: &[RawRow], errors: &mut Vec<String>, mut check: F) -> Vec<Accepted<T>>
where
    F: FnMut(&RawRow) -> Result<T, String>,
{
    let mut accepted = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let row_number = row_number(index);
        match check(row) {
            Ok(record) => accepted.push(Accepted { row_number, record }),
            Err(reason) => errors.push(format!("Row {}: {}", row_number, reason)),
        }
    }
    accepted
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

fn non_negative_decimal(value: &str) -> Option<Decimal> {
    parse_decimal(value).filter(|d| !d.is_sign_negative() || d.is_zero())
}

fn optional_decimal(row: &RawRow, key: &str) -> Option<Decimal> {
    let raw = row.value(key)?;
    let parsed = non_negative_decimal(raw);
    if parsed.is_none() {
        debug!(column = key, value = raw, "Ignoring unparseable optional value");
    }
    parsed
}

fn optional_count(row: &RawRow, key: &str) -> Option<i32> {
    let raw = row.value(key)?;
    let parsed = raw.parse::<i32>().ok().filter(|n| *n >= 0);
    if parsed.is_none() {
        debug!(column = key, value = raw, "Ignoring unparseable optional value");
    }
    parsed
}

fn status_or(row: &RawRow, default: &str) -> String {
    row.value("status")
        .map(str::to_lowercase)
        .unwrap_or_else(|| default.to_string())
}

pub fn validate_product(
    row: &RawRow,
    lookups: &ReferenceLookups,
) -> Result<NormalizedProductRecord, String> {
    let sku = row.value("sku").ok_or("SKU is required")?;
    let name = row.value("name").ok_or("Product name is required")?;
    let selling_price =
        non_negative_decimal(row.get("selling_price")).ok_or("Invalid selling price")?;
    let cost_price = non_negative_decimal(row.get("cost_price")).ok_or("Invalid cost price")?;

    let category_id = match row.value("category") {
        Some(category) => Some(
            lookups
                .category(category)
                .ok_or_else(|| format!("Category \"{}\" not found", category))?,
        ),
        None => None,
    };

    Ok(NormalizedProductRecord {
        sku: sku.to_uppercase(),
        name: name.to_string(),
        description: row.value("description").map(str::to_string),
        category_id,
        selling_price,
        cost_price,
        weight_kg: optional_decimal(row, "weight_kg"),
        status: status_or(row, DEFAULT_PRODUCT_STATUS),
    })
}

pub fn validate_inventory(
    row: &RawRow,
    lookups: &ReferenceLookups,
) -> Result<NormalizedInventoryRecord, String> {
    let sku = row.value("sku").ok_or("SKU is required")?;
    let product = lookups
        .product(sku)
        .ok_or_else(|| format!("Product with SKU \"{}\" not found", sku))?;
    let quantity = row
        .get("quantity")
        .parse::<i32>()
        .ok()
        .filter(|q| *q >= 0)
        .ok_or("Invalid quantity")?;

    let location_id = match row.value("location") {
        Some(location) => Some(
            lookups
                .location(location)
                .ok_or_else(|| format!("Location \"{}\" not found", location))?,
        ),
        None => lookups.default_location(),
    };

    Ok(NormalizedInventoryRecord {
        product_id: product.id,
        location_id,
        quantity,
        reorder_level: optional_count(row, "reorder_level"),
    })
}

pub fn validate_order_line(
    row: &RawRow,
    lookups: &ReferenceLookups,
) -> Result<NormalizedOrderLineRecord, String> {
    let customer_name = row.value("customer_name").ok_or("Customer name is required")?;
    let customer_email = row
        .value("customer_email")
        .ok_or("Customer email is required")?;
    if !EMAIL_PATTERN.is_match(customer_email) {
        return Err("Invalid email format".to_string());
    }

    let sku = row.value("product_sku").ok_or("Product SKU is required")?;
    let product = lookups
        .product(sku)
        .ok_or_else(|| format!("Product with SKU \"{}\" not found", sku))?;
    let quantity = row
        .get("quantity")
        .parse::<i32>()
        .ok()
        .filter(|q| *q > 0)
        .ok_or("Invalid quantity")?;

    let unit_price = row
        .value("unit_price")
        .and_then(non_negative_decimal)
        .or_else(|| Some(product.selling_price).filter(|p| !p.is_sign_negative() || p.is_zero()))
        .ok_or("Invalid unit price")?;
    let total_price = unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or("Line total is out of range")?;

    Ok(NormalizedOrderLineRecord {
        product_id: product.id,
        quantity,
        unit_price,
        total_price,
        notes: row.value("notes").map(str::to_string),
        customer_name: customer_name.to_string(),
        customer_email: customer_email.to_string(),
        status: status_or(row, DEFAULT_ORDER_STATUS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::imports::parser::parse_csv;
    use crate::services::imports::store::ProductRef;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn lookups() -> ReferenceLookups {
        ReferenceLookups::default()
            .with_categories([("Tools", Uuid::new_v4())])
            .with_products([
                ProductRef {
                    id: Uuid::new_v4(),
                    sku: "WID-001".into(),
                    selling_price: dec!(49.99),
                },
                ProductRef {
                    id: Uuid::new_v4(),
                    sku: "BROKEN".into(),
                    selling_price: dec!(-1),
                },
            ])
            .with_locations([("Main", Uuid::new_v4())])
    }

    fn run(csv: &str, kind: ImportRecordKind) -> ValidationReport {
        let parsed = parse_csv(csv).unwrap();
        validate(&parsed.rows, kind, &lookups()).unwrap()
    }

    #[test]
    fn product_rows_normalize() {
        let report = run(
            "SKU,Product Name,Category,Selling Price,Cost Price,Weight (kg),Status\n\
             wid-002,Widget,tools,10.50,4,abc,DISCONTINUED\n",
            ImportRecordKind::Products,
        );
        assert!(report.errors.is_empty());
        assert_matches!(&report.accepted, AcceptedRecords::Products(rows) => {
            let record = &rows[0].record;
            assert_eq!(rows[0].row_number, 2);
            assert_eq!(record.sku, "WID-002");
            assert!(record.category_id.is_some());
            assert_eq!(record.selling_price, dec!(10.50));
            assert_eq!(record.weight_kg, None);
            assert_eq!(record.status, "discontinued");
        });
    }

    #[test]
    fn product_rules_short_circuit_in_order() {
        let report = run(
            "sku,name,selling_price,cost_price,category\n\
             ,,x,x,Nope\n\
             A,,x,x,Nope\n\
             A,Widget,-1,x,Nope\n\
             A,Widget,1,,Nope\n\
             A,Widget,1,1,Nope\n\
             A,Widget,1,1,\n",
            ImportRecordKind::Products,
        );
        assert_eq!(
            report.errors,
            vec![
                "Row 2: SKU is required",
                "Row 3: Product name is required",
                "Row 4: Invalid selling price",
                "Row 5: Invalid cost price",
                "Row 6: Category \"Nope\" not found",
            ]
        );
        assert_eq!(report.accepted.len(), 1);
    }

    #[test]
    fn inventory_rows_fall_back_to_default_location() {
        let lookups = lookups();
        let report = validate(
            &parse_csv("sku,location,quantity,reorder_level\nwid-001,,5,x\nWID-001,Back,1,\nNOPE,,1,\nWID-001,,-2,\n")
                .unwrap()
                .rows,
            ImportRecordKind::Inventory,
            &lookups,
        )
        .unwrap();

        assert_eq!(
            report.errors,
            vec![
                "Row 3: Location \"Back\" not found",
                "Row 4: Product with SKU \"NOPE\" not found",
                "Row 5: Invalid quantity",
            ]
        );
        assert_matches!(&report.accepted, AcceptedRecords::Inventory(rows) => {
            assert_eq!(rows[0].record.location_id, lookups.default_location());
            assert_eq!(rows[0].record.reorder_level, None);
        });
    }

    #[test]
    fn missing_unit_price_uses_selling_price() {
        let report = run(
            "customer_name,customer_email,product_sku,quantity\nAda,ada@example.com,WID-001,3\n",
            ImportRecordKind::Orders,
        );
        assert_matches!(&report.accepted, AcceptedRecords::Orders(rows) => {
            assert_eq!(rows[0].record.unit_price, dec!(49.99));
            assert_eq!(rows[0].record.total_price, dec!(149.97));
            assert_eq!(rows[0].record.status, "pending");
        });
    }

    #[test]
    fn order_rules() {
        let report = run(
            "customer_name,customer_email,product_sku,quantity,unit_price\n\
             ,a@b.co,WID-001,1,\n\
             Ada,,WID-001,1,\n\
             Ada,not-an-email,WID-001,1,\n\
             Ada,ada@example.com,,1,\n\
             Ada,ada@example.com,ZZZ,1,\n\
             Ada,ada@example.com,WID-001,0,\n\
             Ada,ada@example.com,BROKEN,1,\n\
             Ada,ada@example.com,BROKEN,1,2.5\n\
             Ada,ada@example.com,WID-001,2,oops\n",
            ImportRecordKind::Orders,
        );
        assert_eq!(
            report.errors,
            vec![
                "Row 2: Customer name is required",
                "Row 3: Customer email is required",
                "Row 4: Invalid email format",
                "Row 5: Product SKU is required",
                "Row 6: Product with SKU \"ZZZ\" not found",
                "Row 7: Invalid quantity",
                "Row 8: Invalid unit price",
            ]
        );
        assert_matches!(&report.accepted, AcceptedRecords::Orders(rows) => {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].record.unit_price, dec!(2.5));
            assert_eq!(rows[1].record.unit_price, dec!(49.99));
        });
    }

    #[test]
    fn oversized_line_total_rejects_the_row() {
        let report = run(
            "customer_name,customer_email,product_sku,quantity,unit_price\n\
             Ada,ada@example.com,WID-001,1000,79228162514264337593543950335\n\
             Ada,ada@example.com,WID-001,1,79228162514264337593543950335\n",
            ImportRecordKind::Orders,
        );
        assert_eq!(report.errors, vec!["Row 2: Line total is out of range"]);
        assert_matches!(&report.accepted, AcceptedRecords::Orders(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].row_number, 3);
            assert_eq!(rows[0].record.total_price, Decimal::MAX);
        });
    }

    #[test]
    fn unknown_kind_has_no_rules() {
        assert!(validate(&[], ImportRecordKind::Unknown, &lookups()).is_none());
    }
}

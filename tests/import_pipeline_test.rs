//! End-to-end import runs against a migrated SQLite database.

mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use stockroom_api::{
    config::{ImportConfig, OrphanedOrderPolicy},
    entities::{inventory, order, order_item, product},
    services::imports::{detect, ImportRecordKind},
};

#[test]
fn detection_follows_header_sets() {
    assert_eq!(
        detect("sku,name,selling_price,cost_price\n"),
        ImportRecordKind::Products
    );
    assert_eq!(detect("sku,quantity\n"), ImportRecordKind::Inventory);
    assert_eq!(
        detect("customer_name,customer_email,product_sku,quantity\n"),
        ImportRecordKind::Orders
    );
    assert_eq!(detect("foo,bar\n"), ImportRecordKind::Unknown);
    assert_eq!(detect(""), ImportRecordKind::Unknown);
}

#[tokio::test]
async fn products_import_reports_blank_sku_by_row_number() {
    let app = TestApp::new().await;
    app.seed_category("Hardware").await;
    let session = app.admin_session().await;

    let csv = "SKU,Product Name,Category,Selling Price,Cost Price\n\
               wid-100,Widget,hardware,12.50,4\n\
               wid-101,Gadget,,8,3\n\
               ,Orphan,,1,1\n";

    let result = app
        .state
        .imports
        .import_csv(&session, csv)
        .await
        .expect("import runs");

    assert!(result.success);
    assert_eq!(result.total_rows, 3);
    assert_eq!(result.successful_rows, 2);
    assert_eq!(result.failed_rows, 1);
    assert_eq!(result.errors, vec!["Row 4: SKU is required".to_string()]);
    assert_eq!(
        result.successful_rows + result.failed_rows,
        result.total_rows
    );

    let stored = product::Entity::find()
        .filter(product::Column::Sku.eq("WID-100"))
        .one(app.db())
        .await
        .expect("query products")
        .expect("WID-100 stored upper-cased");
    assert_eq!(stored.name, "Widget");
    assert!(stored.category_id.is_some());
    assert_eq!(stored.status, "active");
}

#[tokio::test]
async fn all_invalid_products_yield_one_error_per_row() {
    let app = TestApp::new().await;
    let session = app.admin_session().await;

    let csv = "sku,name,selling_price,cost_price\nA-1,,1,0\nA-2,,2,0\nA-3,,3,0\n";
    let result = app
        .state
        .imports
        .import_csv(&session, csv)
        .await
        .expect("import runs");

    assert!(!result.success);
    assert_eq!(result.successful_rows, 0);
    assert_eq!(result.failed_rows, result.total_rows);
    assert_eq!(result.errors.len(), 3);
    assert_eq!(result.errors[0], "Row 2: Product name is required");
    assert_eq!(product::Entity::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_sku_fails_the_whole_batch() {
    let app = TestApp::new().await;
    app.seed_product("WID-001", dec!(10)).await;
    let session = app.admin_session().await;

    let csv = "sku,name,selling_price,cost_price\nWID-001,Dup,1,0\nWID-002,Fresh,2,0\n";
    let result = app
        .state
        .imports
        .import_csv(&session, csv)
        .await
        .expect("import runs");

    assert!(!result.success);
    assert_eq!(result.successful_rows, 0);
    assert_eq!(result.failed_rows, 2);
    assert_eq!(
        result.errors,
        vec!["Batch 1 (rows 2-3): Some SKUs already exist".to_string()]
    );
    // The valid sibling was rolled back with its batch
    let fresh = product::Entity::find()
        .filter(product::Column::Sku.eq("WID-002"))
        .one(app.db())
        .await
        .unwrap();
    assert!(fresh.is_none());
}

#[tokio::test]
async fn batch_size_bounds_the_failure_unit() {
    let app = TestApp::with_import_config(ImportConfig {
        product_batch_size: 1,
        ..ImportConfig::default()
    })
    .await;
    app.seed_product("WID-001", dec!(10)).await;
    let session = app.admin_session().await;

    let csv = "sku,name,selling_price,cost_price\nWID-001,Dup,1,0\nWID-002,Fresh,2,0\n";
    let result = app
        .state
        .imports
        .import_csv(&session, csv)
        .await
        .expect("import runs");

    assert!(result.success);
    assert_eq!(result.successful_rows, 1);
    assert_eq!(result.failed_rows, 1);
    assert_eq!(
        result.errors,
        vec!["Batch 1 (rows 2-2): Some SKUs already exist".to_string()]
    );
}

#[tokio::test]
async fn inventory_upsert_updates_existing_rows_in_place() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("WID-001", dec!(10)).await;
    let location_id = app.seed_location("Main Warehouse").await;
    let session = app.admin_session().await;

    let first = app
        .state
        .imports
        .import_csv(&session, "sku,location,quantity,reorder_level\nwid-001,main warehouse,10,2\n")
        .await
        .expect("first import");
    assert!(first.success);
    assert_eq!(first.successful_rows, 1);

    let second = app
        .state
        .imports
        .import_csv(&session, "sku,location,quantity\nWID-001,Main Warehouse,25\n")
        .await
        .expect("second import");
    assert!(second.success);
    assert_eq!(second.successful_rows + second.failed_rows, second.total_rows);

    let rows = inventory::Entity::find()
        .filter(inventory::Column::ProductId.eq(product_id))
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].location_id, Some(location_id));
    assert_eq!(rows[0].quantity, 25);
}

#[tokio::test]
async fn inventory_without_location_uses_the_first_created() {
    let app = TestApp::new().await;
    app.seed_product("WID-001", dec!(10)).await;
    let main = app.seed_location("Main").await;
    let session = app.admin_session().await;

    let result = app
        .state
        .imports
        .import_csv(
            &session,
            "sku,quantity\nWID-001,4\nWID-404,1\nWID-001,-2\n",
        )
        .await
        .expect("import runs");

    assert_eq!(result.total_rows, 3);
    assert_eq!(result.successful_rows, 1);
    assert_eq!(result.failed_rows, 2);
    assert_eq!(
        result.errors,
        vec![
            "Row 3: Product with SKU \"WID-404\" not found".to_string(),
            "Row 4: Invalid quantity".to_string(),
        ]
    );

    let row = inventory::Entity::find()
        .one(app.db())
        .await
        .unwrap()
        .expect("inventory row");
    assert_eq!(row.location_id, Some(main));
    assert_eq!(row.quantity, 4);
}

#[tokio::test]
async fn order_lines_consolidate_per_customer() {
    let app = TestApp::new().await;
    app.seed_product("WID-001", dec!(49.99)).await;
    app.seed_product("WID-002", dec!(5)).await;
    let session = app.admin_session().await;

    let csv = "customer_name,customer_email,product_sku,quantity,unit_price\n\
               Jane Doe,jane@example.com,WID-001,3,\n\
               Bob Roe,bob@example.com,WID-002,1,10\n\
               Jane Doe,jane@example.com,WID-002,2,5\n\
               Jane Doe,jane@example.com,WID-001,1,40\n";

    let result = app
        .state
        .imports
        .import_csv(&session, csv)
        .await
        .expect("import runs");

    assert!(result.success);
    assert_eq!(result.total_rows, 4);
    // Groups, not lines
    assert_eq!(result.successful_rows, 2);
    assert_eq!(result.failed_rows, 0);
    assert!(result.errors.is_empty());

    let orders = order::Entity::find()
        .order_by_asc(order::Column::CustomerEmail)
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(orders.len(), 2);
    let jane = orders
        .iter()
        .find(|o| o.customer_email == "jane@example.com")
        .expect("jane's order");
    assert!(jane.order_number.starts_with("ORD-"));
    assert_ne!(orders[0].order_number, orders[1].order_number);
    assert_eq!(jane.status, "pending");
    assert_eq!(jane.subtotal.round_dp(2), dec!(199.97));

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(jane.id))
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(items.len(), 3);

    let fallback = items
        .iter()
        .find(|i| i.quantity == 3)
        .expect("line without unit price");
    assert_eq!(fallback.unit_price.round_dp(2), dec!(49.99));
    assert_eq!(fallback.total_price.round_dp(2), dec!(149.97));
}

#[tokio::test]
async fn invalid_order_lines_are_reported_before_persistence() {
    let app = TestApp::with_import_config(ImportConfig {
        orphaned_order_policy: OrphanedOrderPolicy::Compensate,
        ..ImportConfig::default()
    })
    .await;
    app.seed_product("WID-001", dec!(12)).await;
    let session = app.admin_session().await;

    let csv = "customer_name,customer_email,product_sku,quantity\n\
               Jane Doe,not-an-email,WID-001,1\n\
               Jane Doe,jane@example.com,WID-001,0\n\
               Jane Doe,jane@example.com,WID-001,2\n";

    let result = app
        .state
        .imports
        .import_csv(&session, csv)
        .await
        .expect("import runs");

    assert!(result.success);
    assert_eq!(result.successful_rows, 1);
    assert_eq!(result.failed_rows, 2);
    assert_eq!(
        result.errors,
        vec![
            "Row 2: Invalid email format".to_string(),
            "Row 3: Invalid quantity".to_string(),
        ]
    );
    assert_eq!(order::Entity::find().count(app.db()).await.unwrap(), 1);
}

#[tokio::test]
async fn unrecognized_headers_touch_nothing() {
    let app = TestApp::new().await;
    let session = app.admin_session().await;

    let result = app
        .state
        .imports
        .import_csv(&session, "foo,bar\n1,2\n3,4\n")
        .await
        .expect("import runs");

    assert!(!result.success);
    assert_eq!(result.total_rows, 2);
    assert_eq!(result.failed_rows, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Unable to detect CSV format"));
}

use super::*;
use transfer::{validate, Cell, DataRow, Dataset};

fn widget() -> NewProduct {
    NewProduct {
        name: "Widget".to_string(),
        category: "Tools".to_string(),
        quantity: 5,
    }
}

async fn staff(storage: &Storage, username: &str) -> StaffId {
    storage
        .create_staff(&NewStaff {
            username: username.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            ..NewStaff::default()
        })
        .await
        .expect("staff")
}

fn dataset(rows: &[(Option<i64>, &str, &str, Option<i64>)]) -> Dataset {
    Dataset::new(
        vec!["id".into(), "name".into(), "category".into(), "quantity".into()],
        rows.iter()
            .enumerate()
            .map(|(i, (id, name, category, quantity))| DataRow {
                line: i + 2,
                cells: vec![
                    id.map(Cell::Int).unwrap_or(Cell::Empty),
                    Cell::Text(name.to_string()),
                    Cell::Text(category.to_string()),
                    quantity.map(Cell::Int).unwrap_or(Cell::Empty),
                ],
            })
            .collect(),
    )
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("inventory.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn creates_and_reads_back_product() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let before = storage.dashboard_counts().await.expect("counts");

    let id = storage.create_product(&widget()).await.expect("create");
    let stored = storage.get_product(id).await.expect("get").expect("exists");

    assert_eq!(stored, widget().with_id(id));
    let after = storage.dashboard_counts().await.expect("counts");
    assert_eq!(after.product_count, before.product_count + 1);
}

#[tokio::test]
async fn negative_quantity_violates_check_constraint() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut product = widget();
    product.quantity = -1;
    assert!(storage.create_product(&product).await.is_err());
}

#[tokio::test]
async fn filters_products_by_category() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.create_product(&widget()).await.expect("create");
    storage
        .create_product(&NewProduct {
            name: "Pen".to_string(),
            category: "Stationery".to_string(),
            quantity: 10,
        })
        .await
        .expect("create");

    let tools = storage.list_products_in(Some("Tools")).await.expect("list");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "Widget");
    assert_eq!(
        storage.list_categories().await.expect("categories"),
        ["Stationery", "Tools"]
    );
}

#[tokio::test]
async fn update_and_delete_report_missing_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let keep = storage.create_product(&widget()).await.expect("create");
    let doomed = storage.create_product(&widget()).await.expect("create");

    let mut changed = widget();
    changed.quantity = 42;
    assert!(storage.update_product(keep, &changed).await.expect("update"));
    assert!(!storage
        .update_product(ProductId(999), &changed)
        .await
        .expect("update"));

    assert!(storage.delete_product(doomed).await.expect("delete"));
    assert!(!storage.delete_product(doomed).await.expect("delete again"));

    let remaining = storage.list_products_in(None).await.expect("list");
    assert_eq!(remaining, vec![changed.with_id(keep)]);
}

#[tokio::test]
async fn orders_are_attributed_and_cascade_with_product() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = staff(&storage, "alice").await;
    let product = storage.create_product(&widget()).await.expect("product");

    let order = storage
        .create_order(
            alice,
            &NewOrder {
                product_id: product,
                order_quantity: 3,
            },
        )
        .await
        .expect("order");

    let orders = storage.list_orders(None, None).await.expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, order);
    assert_eq!(orders[0].staff_username, "alice");
    assert_eq!(orders[0].product_name, "Widget");

    let bob = staff(&storage, "bob").await;
    assert!(storage
        .list_orders(Some(bob), None)
        .await
        .expect("orders")
        .is_empty());
    assert_eq!(
        storage.list_orders(Some(alice), Some(5)).await.expect("orders").len(),
        1
    );

    let staff_list = storage.list_staff().await.expect("staff");
    assert_eq!(staff_list[0].order_count, 1);

    storage.delete_product(product).await.expect("delete");
    assert!(storage.list_orders(None, None).await.expect("orders").is_empty());
}

#[tokio::test]
async fn order_for_unknown_product_is_rejected() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = staff(&storage, "alice").await;
    let result = storage
        .create_order(
            alice,
            &NewOrder {
                product_id: ProductId(77),
                order_quantity: 1,
            },
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn credentials_lookup_by_username() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = staff(&storage, "bob").await;

    let creds = storage
        .credentials_for_username("bob")
        .await
        .expect("lookup")
        .expect("exists");
    assert_eq!(creds.staff.id, id);
    assert!(creds.staff.is_active);
    assert_eq!(creds.password_hash, "not-a-real-hash");

    assert!(storage
        .credentials_for_username("nobody")
        .await
        .expect("lookup")
        .is_none());

    assert!(storage.set_staff_active(id, false).await.expect("deactivate"));
    let staff = storage.get_staff(id).await.expect("get").expect("exists");
    assert!(!staff.is_active);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    staff(&storage, "carol").await;
    let again = storage
        .create_staff(&NewStaff {
            username: "carol".to_string(),
            password_hash: "x".to_string(),
            ..NewStaff::default()
        })
        .await;
    assert!(again.is_err());
}

#[tokio::test]
async fn id_keyed_batch_updates_inserts_and_keeps_explicit_ids() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let existing = storage.create_product(&widget()).await.expect("create");

    let batch = validate(
        &dataset(&[
            (Some(existing.0), "Widget", "Hardware", Some(1)),
            (Some(40), "Clamp", "Tools", Some(2)),
            (None, "Drill", "Tools", Some(3)),
        ]),
        MatchKey::Id,
    )
    .expect("valid");

    let summary = storage.apply_product_batch(&batch).await.expect("commit");
    assert_eq!(summary, ImportSummary { inserted: 2, updated: 1 });

    let products = storage.list_products_in(None).await.expect("list");
    assert_eq!(products.len(), 3);
    assert_eq!(products[0].category, "Hardware");
    assert_eq!(products[1].id, ProductId(40));
    assert_eq!(products[2].id, ProductId(41));
}

#[tokio::test]
async fn idless_row_never_takes_an_id_claimed_later_in_the_batch() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let batch = validate(
        &dataset(&[
            (None, "Alpha", "X", Some(1)),
            (Some(1), "Beta", "X", Some(2)),
        ]),
        MatchKey::Id,
    )
    .expect("valid");

    let summary = storage.apply_product_batch(&batch).await.expect("commit");
    assert_eq!(summary, ImportSummary { inserted: 2, updated: 0 });

    let products = storage.list_products_in(None).await.expect("list");
    assert_eq!(
        products
            .iter()
            .map(|p| (p.id, p.name.as_str()))
            .collect::<Vec<_>>(),
        [(ProductId(1), "Beta"), (ProductId(2), "Alpha")]
    );
}

#[tokio::test]
async fn name_keyed_batch_matches_lowest_id() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage.create_product(&widget()).await.expect("create");
    let second = storage.create_product(&widget()).await.expect("create");

    let batch = validate(
        &dataset(&[(Some(second.0), "Widget", "Tools", Some(9))]),
        MatchKey::Name,
    )
    .expect("valid");
    let summary = storage.apply_product_batch(&batch).await.expect("commit");
    assert_eq!(summary.updated, 1);

    assert_eq!(
        storage.get_product(first).await.expect("get").expect("exists").quantity,
        9
    );
    assert_eq!(
        storage.get_product(second).await.expect("get").expect("exists").quantity,
        5
    );
}

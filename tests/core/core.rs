use catalog::core::broker::{DbBroker, read_events};
use catalog::core::config::{CatalogConfig, load_config};
use catalog::core::db;
use catalog::core::error::CatalogError;
use catalog::core::rpc::{ApiRequest, dispatch, handle_envelope};
use catalog::core::store::Store;
use catalog::plugins::{products, seed};
use std::fs;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    db::initialize_catalog_db(&store).unwrap();
    (tmp, store)
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = tempdir().unwrap();
    assert_eq!(load_config(tmp.path()).unwrap(), CatalogConfig::default());
}

#[test]
fn test_config_file_overrides_database_and_audit() {
    let tmp = tempdir().unwrap();
    fs::write(
        tmp.path().join("catalog.toml"),
        "actor = \"tester\"\n[database]\nfile = \"shop.db\"\n[audit]\nenabled = false\n",
    )
    .unwrap();

    let store = Store::open(tmp.path()).unwrap();
    assert_eq!(store.config.actor, "tester");
    assert_eq!(store.db_path(), tmp.path().join("shop.db"));
    assert!(store.audit_log_path().is_none());

    db::initialize_catalog_db(&store).unwrap();
    assert!(tmp.path().join("shop.db").exists());
    assert!(!tmp.path().join("broker.events.jsonl").exists());
}

#[test]
fn test_malformed_config_is_rejected() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("catalog.toml"), "[database\nfile = 1").unwrap();
    assert!(matches!(
        Store::open(tmp.path()).unwrap_err(),
        CatalogError::ConfigError(_)
    ));
}

#[test]
fn test_broker_records_success_and_error() {
    let (_tmp, store) = test_store();
    let broker = DbBroker::new(&store);

    broker.with_conn("audit.ok", |_| Ok(())).unwrap();
    let _ = broker.with_tx("audit.fail", |tx| {
        tx.execute("INSERT INTO tags(tag_name) VALUES('rolled back')", [])?;
        Err::<(), _>(CatalogError::ValidationError("stop".into()))
    });

    let events = read_events(&store.audit_log_path().unwrap()).unwrap();
    let ok = events.iter().find(|e| e.op == "audit.ok").unwrap();
    let fail = events.iter().find(|e| e.op == "audit.fail").unwrap();
    assert_eq!(ok.status, "success");
    assert_eq!(fail.status, "error");
    assert_eq!(ok.actor, "catalog");
    assert!(ulid::Ulid::from_string(&ok.event_id).is_ok());

    let tags: i64 = broker
        .with_conn("audit.count", |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?)
        })
        .unwrap();
    assert_eq!(tags, 0);
}

#[test]
fn test_dispatch_routing_errors() {
    let (_tmp, store) = test_store();

    let unknown = dispatch(&store, &ApiRequest::new("GET", "/api/orders", None));
    assert_eq!(unknown.status, 404);

    let not_allowed = dispatch(&store, &ApiRequest::new("PATCH", "/api/products/1", None));
    assert_eq!(not_allowed.status, 405);

    let bad_id = dispatch(&store, &ApiRequest::new("GET", "/api/products/abc", None));
    assert_eq!(bad_id.status, 400);
    assert_eq!(bad_id.body["code"], "validation_error");

    let lower = dispatch(&store, &ApiRequest::new("get", "/api/products", None));
    assert_eq!(lower.status, 200);
    assert_eq!(lower.body, serde_json::json!([]));
}

#[test]
fn test_envelope_round_trip() {
    let (_tmp, store) = test_store();

    let envelope = handle_envelope(
        &store,
        r#"{"id": "req-7", "method": "POST", "path": "/api/tags", "body": {"tag_name": "blue"}}"#,
    );
    assert_eq!(envelope["id"], "req-7");
    assert_eq!(envelope["status"], 200);
    assert_eq!(envelope["body"]["tag_name"], "blue");

    let broken = handle_envelope(&store, "{not json");
    assert_eq!(broken["status"], 400);
    assert_eq!(broken["body"]["code"], "invalid_json");
}

#[test]
fn test_seed_populates_empty_store_once() {
    let (_tmp, store) = test_store();
    let summary = seed::seed_catalog(&store).unwrap();
    assert_eq!(summary.categories, 5);
    assert_eq!(summary.tags, 8);
    assert_eq!(summary.products, 5);
    assert_eq!(summary.product_tags, 12);

    let listed = products::list_products(&store).unwrap();
    let tee = listed
        .iter()
        .find(|p| p.product.product_name == "Plain T-Shirt")
        .unwrap();
    assert_eq!(tee.category.as_ref().unwrap().category_name, "Shirts");
    let tee_tags: Vec<&str> = tee.tags.iter().map(|t| t.tag_name.as_str()).collect();
    assert_eq!(tee_tags, vec!["white", "gold", "pop culture"]);

    assert!(matches!(
        seed::seed_catalog(&store).unwrap_err(),
        CatalogError::ValidationError(_)
    ));
}

fn catalog_rows(store: &Store) -> i64 {
    let conn = db::db_connect(&store.db_path().to_string_lossy(), 5).unwrap();
    conn.query_row(
        "SELECT (SELECT COUNT(*) FROM categories)
              + (SELECT COUNT(*) FROM tags)
              + (SELECT COUNT(*) FROM products)
              + (SELECT COUNT(*) FROM product_tags)",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_failed_seed_leaves_store_empty_and_retryable() {
    let (_tmp, store) = test_store();
    let conn = db::db_connect(&store.db_path().to_string_lossy(), 5).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_shorts BEFORE INSERT ON products
         WHEN NEW.product_name = 'Cargo Shorts' BEGIN SELECT RAISE(ABORT, 'no shorts'); END;",
    )
    .unwrap();

    assert!(matches!(
        seed::seed_catalog(&store).unwrap_err(),
        CatalogError::PersistenceError(_)
    ));
    assert_eq!(catalog_rows(&store), 0);

    conn.execute_batch("DROP TRIGGER reject_shorts;").unwrap();
    assert_eq!(seed::seed_catalog(&store).unwrap().products, 5);
}

#[test]
fn test_concurrent_seeds_populate_once() {
    let (_tmp, store) = test_store();
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || seed::seed_catalog(&store))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(CatalogError::ValidationError(_)))));
    assert_eq!(products::list_products(&store).unwrap().len(), 5);
}

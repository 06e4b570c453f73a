use catalog::core::db;
use catalog::core::error::CatalogError;
use catalog::core::gateway::{AssociationGateway, SqliteGateway};
use catalog::core::model::{Association, ProductId, TagId};
use catalog::core::rpc::{ApiRequest, dispatch};
use catalog::core::store::Store;
use catalog::plugins::products::{
    ProductInput, ProductPatch, create_product, delete_product, get_product, list_products,
    update_product,
};
use catalog::plugins::{categories, tags};
use serde_json::json;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    db::initialize_catalog_db(&store).unwrap();
    (tmp, store)
}

fn make_tags(store: &Store, n: usize) -> Vec<TagId> {
    (0..n)
        .map(|i| tags::create_tag(store, &format!("tag-{}", i)).unwrap().id)
        .collect()
}

fn input(name: &str, tags: Vec<TagId>) -> ProductInput {
    ProductInput {
        product_name: name.to_string(),
        price: 9.5,
        stock: 3,
        category_id: None,
        tags,
    }
}

fn associations(store: &Store, product_id: ProductId) -> Vec<Association> {
    let conn = db::db_connect(&store.db_path().to_string_lossy(), 5).unwrap();
    SqliteGateway::new(&conn).find_associations(product_id).unwrap()
}

fn tag_ids(store: &Store, product_id: ProductId) -> Vec<TagId> {
    let mut ids: Vec<TagId> = associations(store, product_id)
        .into_iter()
        .map(|a| a.tag_id)
        .collect();
    ids.sort();
    ids
}

fn tags_patch(tags: &[TagId]) -> ProductPatch {
    ProductPatch {
        tags: Some(tags.to_vec()),
        ..ProductPatch::default()
    }
}

#[test]
fn test_update_replaces_only_changed_tags() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 4);
    let created = create_product(&store, &input("Shirt", vec![t[0], t[1], t[2]])).unwrap();
    let pid = created.product.id;

    let before = associations(&store, pid);
    let row_of = |tag: TagId| before.iter().find(|a| a.tag_id == tag).unwrap().id;

    let updated = update_product(&store, pid, &tags_patch(&[t[1], t[2], t[3]])).unwrap();
    let outcome = updated.tags.unwrap();
    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.removed_row_ids, vec![row_of(t[0])]);
    assert_eq!(outcome.added.len(), 1);
    assert_eq!(outcome.added[0].tag_id, t[3]);

    let after = associations(&store, pid);
    for kept in [t[1], t[2]] {
        assert!(after.iter().any(|a| a.tag_id == kept && a.id == row_of(kept)));
    }
    assert_eq!(tag_ids(&store, pid), vec![t[1], t[2], t[3]]);

    let names: Vec<TagId> = updated.product.tags.iter().map(|tag| tag.id).collect();
    assert_eq!(names, vec![t[1], t[2], t[3]]);
}

#[test]
fn test_create_collapses_duplicate_tags() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 2);
    let created = create_product(&store, &input("Hat", vec![t[0], t[1], t[0]])).unwrap();
    assert_eq!(created.product_tags.len(), 2);
    assert_eq!(tag_ids(&store, created.product.id), vec![t[0], t[1]]);
}

#[test]
fn test_reconcile_same_set_twice_changes_nothing() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 3);
    let pid = create_product(&store, &input("Record", vec![t[0]])).unwrap().product.id;

    update_product(&store, pid, &tags_patch(&[t[0], t[2]])).unwrap();
    let rows = associations(&store, pid);

    let second = update_product(&store, pid, &tags_patch(&[t[2], t[0], t[2]])).unwrap();
    let outcome = second.tags.unwrap();
    assert_eq!(outcome.removed, 0);
    assert!(outcome.added.is_empty());
    assert_eq!(associations(&store, pid), rows);
}

#[test]
fn test_empty_tag_list_detaches_everything() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 3);
    let pid = create_product(&store, &input("Shorts", t.clone())).unwrap().product.id;

    let outcome = update_product(&store, pid, &tags_patch(&[])).unwrap().tags.unwrap();
    assert_eq!(outcome.removed, 3);
    assert!(outcome.added.is_empty());
    assert!(associations(&store, pid).is_empty());
}

#[test]
fn test_update_without_tags_leaves_associations() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 2);
    let pid = create_product(&store, &input("Sneakers", t.clone())).unwrap().product.id;

    let patch = ProductPatch::from_json(&json!({ "price": 90.0, "stock": 25 })).unwrap();
    let updated = update_product(&store, pid, &patch).unwrap();
    assert!(updated.tags.is_none());
    assert_eq!(updated.product.product.price, 90.0);
    assert_eq!(updated.product.product.stock, 25);
    assert_eq!(tag_ids(&store, pid), t);
}

#[test]
fn test_string_and_number_tag_ids_are_the_same_tag() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 2);
    let pid = create_product(&store, &input("Vinyl", t.clone())).unwrap().product.id;

    let body = json!({ "tags": [t[0].0.to_string(), t[1].0] });
    let outcome = update_product(&store, pid, &ProductPatch::from_json(&body).unwrap())
        .unwrap()
        .tags
        .unwrap();
    assert_eq!(outcome.removed, 0);
    assert!(outcome.added.is_empty());
}

#[test]
fn test_unknown_tag_rolls_back_scalar_update() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 2);
    let pid = create_product(&store, &input("Cap", vec![t[0]])).unwrap().product.id;

    let patch = ProductPatch::from_json(&json!({
        "product_name": "Renamed",
        "tags": [t[1].0, 9999]
    }))
    .unwrap();
    let err = update_product(&store, pid, &patch).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    let product = get_product(&store, pid).unwrap();
    assert_eq!(product.product.product_name, "Cap");
    assert_eq!(tag_ids(&store, pid), vec![t[0]]);
}

#[test]
fn test_failed_insert_rolls_back_delete() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 3);
    let pid = create_product(&store, &input("Jacket", vec![t[0], t[1]])).unwrap().product.id;
    let before = associations(&store, pid);

    let conn = db::db_connect(&store.db_path().to_string_lossy(), 5).unwrap();
    conn.execute_batch(&format!(
        "CREATE TRIGGER reject_tag BEFORE INSERT ON product_tags
         WHEN NEW.tag_id = {} BEGIN SELECT RAISE(ABORT, 'insert rejected'); END;",
        t[2].0
    ))
    .unwrap();

    let patch = ProductPatch::from_json(&json!({ "stock": 0, "tags": [t[1].0, t[2].0] })).unwrap();
    let err = update_product(&store, pid, &patch).unwrap_err();
    assert!(matches!(err, CatalogError::PersistenceError(_)));
    assert_eq!(err.status(), 500);

    assert_eq!(associations(&store, pid), before);
    assert_eq!(get_product(&store, pid).unwrap().product.stock, 3);
}

#[test]
fn test_update_missing_product_is_not_found() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 1);
    let err = update_product(&store, 42, &tags_patch(&t)).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    let err = update_product(&store, 42, &ProductPatch::default()).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}

#[test]
fn test_create_with_unknown_category_creates_nothing() {
    let (_tmp, store) = test_store();
    let mut bad = input("Orphan", Vec::new());
    bad.category_id = Some(77);
    let err = create_product(&store, &bad).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
    assert!(list_products(&store).unwrap().is_empty());
}

#[test]
fn test_delete_cascades_associations_and_reports_missing() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 2);
    let pid = create_product(&store, &input("Socks", t)).unwrap().product.id;

    assert_eq!(delete_product(&store, pid).unwrap(), 1);
    assert!(associations(&store, pid).is_empty());

    let err = delete_product(&store, pid).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
    assert!(matches!(
        get_product(&store, pid).unwrap_err(),
        CatalogError::NotFound(_)
    ));
}

#[test]
fn test_list_eager_loads_category_and_tags() {
    let (_tmp, store) = test_store();
    let shirts = categories::create_category(&store, "Shirts").unwrap();
    let t = make_tags(&store, 2);

    let mut with_category = input("Tee", vec![t[1]]);
    with_category.category_id = Some(shirts.id);
    create_product(&store, &with_category).unwrap();
    create_product(&store, &input("Loose", Vec::new())).unwrap();

    let listed = list_products(&store).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].category.as_ref().unwrap().category_name, "Shirts");
    assert_eq!(listed[0].tags.len(), 1);
    assert_eq!(listed[0].tags[0].tag_name, "tag-1");
    assert!(listed[1].category.is_none());
    assert!(listed[1].tags.is_empty());
}

#[test]
fn test_request_surface_product_lifecycle() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 4);

    let plain = dispatch(
        &store,
        &ApiRequest::new(
            "POST",
            "/api/products",
            Some(json!({ "product_name": "Plain", "price": 1.5 })),
        ),
    );
    assert_eq!(plain.status, 200);
    assert_eq!(plain.body["product_name"], "Plain");
    assert_eq!(plain.body["stock"], 10);
    assert!(plain.body.get("product_tags").is_none());

    let tagged = dispatch(
        &store,
        &ApiRequest::new(
            "POST",
            "/api/products",
            Some(json!({
                "product_name": "Tagged",
                "price": 2,
                "tags": [t[0].0, t[1].0, t[2].0, t[0].0]
            })),
        ),
    );
    assert_eq!(tagged.status, 200);
    assert_eq!(tagged.body["product_tags"].as_array().unwrap().len(), 3);
    let pid = tagged.body["product"]["id"].as_i64().unwrap();

    let updated = dispatch(
        &store,
        &ApiRequest::new(
            "PUT",
            &format!("/api/products/{}", pid),
            Some(json!({ "tags": [t[1].0, t[2].0, t[3].0] })),
        ),
    );
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body["tags"]["removed"], 1);
    assert_eq!(updated.body["product"]["tags"].as_array().unwrap().len(), 3);

    let bad = dispatch(
        &store,
        &ApiRequest::new(
            "PUT",
            &format!("/api/products/{}", pid),
            Some(json!({ "tags": "nope" })),
        ),
    );
    assert_eq!(bad.status, 400);

    let gone = dispatch(&store, &ApiRequest::new("DELETE", "/api/products/9999", None));
    assert_eq!(gone.status, 404);

    let deleted = dispatch(
        &store,
        &ApiRequest::new("DELETE", &format!("/api/products/{}", pid), None),
    );
    assert_eq!(deleted.status, 200);
    assert_eq!(deleted.body["deleted"], 1);

    let missing = dispatch(
        &store,
        &ApiRequest::new("GET", &format!("/api/products/{}", pid), None),
    );
    assert_eq!(missing.status, 404);
}

#[test]
fn test_concurrent_updates_never_mix_tag_sets() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 6);
    let pid = create_product(&store, &input("Contended", vec![t[0]])).unwrap().product.id;

    let desired_sets: Vec<Vec<TagId>> = vec![
        vec![t[0], t[1]],
        vec![t[2], t[3]],
        vec![t[4], t[5], t[0]],
        vec![t[1], t[3], t[5]],
    ];

    let handles: Vec<_> = desired_sets
        .iter()
        .cloned()
        .map(|set| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    update_product(&store, pid, &tags_patch(&set)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let final_set = tag_ids(&store, pid);
    assert!(desired_sets.iter().any(|set| {
        let mut sorted = set.clone();
        sorted.sort();
        sorted == final_set
    }));
}

/// Rows past SQLite's 32766 bound-variable limit.
const BEYOND_VARIABLE_LIMIT: i64 = 33_000;

fn bulk_insert(store: &Store, sql: &str) {
    let conn = db::db_connect(&store.db_path().to_string_lossy(), 5).unwrap();
    conn.execute(sql, [BEYOND_VARIABLE_LIMIT]).unwrap();
}

#[test]
fn test_list_returns_every_product_in_a_large_catalog() {
    let (_tmp, store) = test_store();
    let t = make_tags(&store, 1);
    bulk_insert(
        &store,
        "INSERT INTO products(product_name, price, stock)
         WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?1)
         SELECT 'bulk-' || n, 1.0, 1 FROM seq",
    );
    let last = create_product(&store, &input("Tagged", vec![t[0]])).unwrap().product.id;

    let listed = list_products(&store).unwrap();
    assert_eq!(listed.len() as i64, BEYOND_VARIABLE_LIMIT + 1);
    assert!(listed[..listed.len() - 1].iter().all(|p| p.tags.is_empty()));
    assert_eq!(listed.last().unwrap().product.id, last);
    assert_eq!(listed.last().unwrap().tags.len(), 1);

    let response = dispatch(&store, &ApiRequest::new("GET", "/api/products", None));
    assert_eq!(response.status, 200);
}

#[test]
fn test_large_tag_sets_attach_and_detach() {
    let (_tmp, store) = test_store();
    bulk_insert(
        &store,
        "INSERT INTO tags(tag_name)
         WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?1)
         SELECT 'tag-' || n FROM seq",
    );
    let all: Vec<TagId> = (1..=BEYOND_VARIABLE_LIMIT).map(TagId).collect();

    let created = create_product(&store, &input("Everything", all.clone())).unwrap();
    assert_eq!(created.product_tags.len() as i64, BEYOND_VARIABLE_LIMIT);
    let pid = created.product.id;
    assert_eq!(get_product(&store, pid).unwrap().tags.len() as i64, BEYOND_VARIABLE_LIMIT);

    let mut with_unknown = all.clone();
    with_unknown.push(TagId(BEYOND_VARIABLE_LIMIT + 1));
    let err = update_product(&store, pid, &tags_patch(&with_unknown)).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
    assert_eq!(associations(&store, pid).len() as i64, BEYOND_VARIABLE_LIMIT);

    let outcome = update_product(&store, pid, &tags_patch(&[])).unwrap().tags.unwrap();
    assert_eq!(outcome.removed as i64, BEYOND_VARIABLE_LIMIT);
    assert!(outcome.added.is_empty());
    assert!(associations(&store, pid).is_empty());
}

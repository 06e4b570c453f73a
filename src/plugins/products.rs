use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::gateway::{ProductChanges, SqliteGateway};
use crate::core::model::{CategoryId, Product, ProductDetail, ProductId, ProductTag, TagId, tag_set};
use crate::core::reconcile::{self, ReconcileOutcome};
use crate::core::store::Store;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;

pub const DEFAULT_STOCK: i64 = 10;

#[derive(Parser, Debug)]
#[clap(name = "product", about = "Manage products and their tag associations.")]
pub struct ProductCli {
    #[clap(subcommand)]
    pub command: ProductCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProductCommand {
    /// List all products with their category and tags.
    List,
    /// Get a product by ID.
    Get {
        #[clap(long)]
        id: ProductId,
    },
    /// Create a product, optionally attaching tags.
    Create {
        /// Product name (positional argument)
        #[clap(value_name = "NAME")]
        name: String,
        #[clap(long)]
        price: f64,
        #[clap(long, default_value_t = DEFAULT_STOCK)]
        stock: i64,
        #[clap(long)]
        category: Option<CategoryId>,
        /// Comma-separated tag ids.
        #[clap(long, default_value = "")]
        tags: String,
    },
    /// Update product fields; `--tags` replaces the tag set.
    Update {
        #[clap(long)]
        id: ProductId,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        price: Option<f64>,
        #[clap(long)]
        stock: Option<i64>,
        #[clap(long, conflicts_with = "clear_category")]
        category: Option<CategoryId>,
        /// Detach the product from its category.
        #[clap(long)]
        clear_category: bool,
        /// Comma-separated tag ids; an empty string removes every tag.
        #[clap(long)]
        tags: Option<String>,
    },
    /// Delete a product by ID.
    Delete {
        #[clap(long)]
        id: ProductId,
    },
}

/// Validated create body.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub product_name: String,
    pub price: f64,
    pub stock: i64,
    pub category_id: Option<CategoryId>,
    /// Requested tags, in request order; duplicates are allowed here and collapse later.
    pub tags: Vec<TagId>,
}

/// Validated update body. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub changes: ProductChanges,
    /// `Some` replaces the product's tag set, `None` leaves it alone.
    pub tags: Option<Vec<TagId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedProduct {
    pub product: Product,
    pub product_tags: Vec<ProductTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedProduct {
    pub product: ProductDetail,
    /// Present only when the request carried a tag list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<ReconcileOutcome>,
}

// --- Request body parsing ---

fn body_object(body: &JsonValue) -> Result<&Map<String, JsonValue>, error::CatalogError> {
    body.as_object().ok_or_else(|| {
        error::CatalogError::ValidationError("Request body must be a JSON object".to_string())
    })
}

/// Treats an explicit `null` like an absent field.
fn field<'a>(obj: &'a Map<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
    obj.get(key).filter(|v| !v.is_null())
}

fn parse_name(value: &JsonValue, key: &str) -> Result<String, error::CatalogError> {
    match value.as_str().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(error::CatalogError::ValidationError(format!(
            "'{}' must be a non-empty string",
            key
        ))),
    }
}

fn parse_price(value: &JsonValue) -> Result<f64, error::CatalogError> {
    let price = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match price {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(error::CatalogError::ValidationError(format!(
            "'price' must be a non-negative decimal, got {}",
            value
        ))),
    }
}

fn parse_non_negative_int(value: &JsonValue, key: &str) -> Result<i64, error::CatalogError> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v >= 0 => Ok(v),
        _ => Err(error::CatalogError::ValidationError(format!(
            "'{}' must be a non-negative integer, got {}",
            key, value
        ))),
    }
}

fn parse_id(value: &JsonValue, key: &str) -> Result<i64, error::CatalogError> {
    match parse_non_negative_int(value, key)? {
        0 => Err(error::CatalogError::ValidationError(format!(
            "'{}' must be a positive integer",
            key
        ))),
        id => Ok(id),
    }
}

/// Parse a `tags` field into typed ids. Anything but an array of integer-like values is
/// rejected here, before the reconciler sees it.
pub fn parse_tags(value: &JsonValue) -> Result<Vec<TagId>, error::CatalogError> {
    let items = value.as_array().ok_or_else(|| {
        error::CatalogError::ValidationError("'tags' must be an array of tag ids".to_string())
    })?;
    items.iter().map(TagId::from_json).collect()
}

/// Parse a comma-separated CLI tag list (`"1, 2,3"`).
pub fn parse_tag_list(raw: &str) -> Result<Vec<TagId>, error::CatalogError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| TagId::from_json(&JsonValue::String(s.to_string())))
        .collect()
}

impl ProductInput {
    pub fn from_json(body: &JsonValue) -> Result<Self, error::CatalogError> {
        let obj = body_object(body)?;
        let product_name = match field(obj, "product_name") {
            Some(v) => parse_name(v, "product_name")?,
            None => {
                return Err(error::CatalogError::ValidationError(
                    "'product_name' is required".to_string(),
                ));
            }
        };
        let price = match field(obj, "price") {
            Some(v) => parse_price(v)?,
            None => {
                return Err(error::CatalogError::ValidationError(
                    "'price' is required".to_string(),
                ));
            }
        };
        let stock = match field(obj, "stock") {
            Some(v) => parse_non_negative_int(v, "stock")?,
            None => DEFAULT_STOCK,
        };
        let category_id = field(obj, "category_id")
            .map(|v| parse_id(v, "category_id"))
            .transpose()?;
        let tags = match field(obj, "tags") {
            Some(v) => parse_tags(v)?,
            None => Vec::new(),
        };

        Ok(Self {
            product_name,
            price,
            stock,
            category_id,
            tags,
        })
    }
}

impl ProductPatch {
    pub fn from_json(body: &JsonValue) -> Result<Self, error::CatalogError> {
        let obj = body_object(body)?;
        let mut changes = ProductChanges::default();
        if let Some(v) = field(obj, "product_name") {
            changes.product_name = Some(parse_name(v, "product_name")?);
        }
        if let Some(v) = field(obj, "price") {
            changes.price = Some(parse_price(v)?);
        }
        if let Some(v) = field(obj, "stock") {
            changes.stock = Some(parse_non_negative_int(v, "stock")?);
        }
        // An explicit null detaches the category; absence leaves it alone.
        match obj.get("category_id") {
            Some(JsonValue::Null) => changes.category_id = Some(None),
            Some(v) => changes.category_id = Some(Some(parse_id(v, "category_id")?)),
            None => {}
        }
        let tags = field(obj, "tags").map(parse_tags).transpose()?;

        Ok(Self { changes, tags })
    }
}

// --- Referential checks (inside the caller's transaction) ---

fn ensure_category(
    gateway: &SqliteGateway<'_>,
    category_id: Option<CategoryId>,
) -> Result<(), error::CatalogError> {
    if let Some(id) = category_id {
        if gateway.find_category(id)?.is_none() {
            return Err(error::CatalogError::NotFound(format!(
                "Category '{}' not found",
                id
            )));
        }
    }
    Ok(())
}

fn ensure_tags(
    gateway: &SqliteGateway<'_>,
    tags: &BTreeSet<TagId>,
) -> Result<(), error::CatalogError> {
    let missing = gateway.missing_tags(tags)?;
    if missing.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = missing.iter().map(|t| t.to_string()).collect();
    Err(error::CatalogError::NotFound(format!(
        "Tag(s) not found: {}",
        ids.join(", ")
    )))
}

// --- Operations ---

pub fn list_products(store: &Store) -> Result<Vec<ProductDetail>, error::CatalogError> {
    let broker = DbBroker::new(store);
    broker.with_conn("product.list", |conn| {
        SqliteGateway::new(conn).list_product_details()
    })
}

pub fn get_product(store: &Store, id: ProductId) -> Result<ProductDetail, error::CatalogError> {
    let broker = DbBroker::new(store);
    broker.with_conn("product.get", |conn| {
        SqliteGateway::new(conn)
            .find_product_detail(id)?
            .ok_or_else(|| error::CatalogError::NotFound(format!("Product '{}' not found", id)))
    })
}

/// Insert a product and attach its initial tags in one transaction.
pub fn create_product(
    store: &Store,
    input: &ProductInput,
) -> Result<CreatedProduct, error::CatalogError> {
    let broker = DbBroker::new(store);
    broker.with_tx("product.create", |tx| {
        insert_product_with_tags(&SqliteGateway::new(tx), input)
    })
}

/// Creation body shared with seeding; runs inside the caller's transaction.
pub(crate) fn insert_product_with_tags(
    gateway: &SqliteGateway<'_>,
    input: &ProductInput,
) -> Result<CreatedProduct, error::CatalogError> {
    ensure_category(gateway, input.category_id)?;
    let tags = tag_set(input.tags.iter().copied());
    ensure_tags(gateway, &tags)?;

    let product = gateway.insert_product(
        &input.product_name,
        input.price,
        input.stock,
        input.category_id,
    )?;
    let outcome = reconcile::attach_tags(gateway, product.id, tags)?;

    Ok(CreatedProduct {
        product,
        product_tags: outcome.added,
    })
}

/// Update scalars and, when `patch.tags` is given, reconcile the tag set. Everything
/// runs in one transaction: a failure anywhere leaves the product and its tags as they
/// were.
pub fn update_product(
    store: &Store,
    id: ProductId,
    patch: &ProductPatch,
) -> Result<UpdatedProduct, error::CatalogError> {
    let broker = DbBroker::new(store);
    broker.with_tx("product.update", |tx| {
        let gateway = SqliteGateway::new(tx);
        if let Some(category_id) = patch.changes.category_id {
            ensure_category(&gateway, category_id)?;
        }

        if gateway.update_product(id, &patch.changes)? == 0 {
            return Err(error::CatalogError::NotFound(format!(
                "Product '{}' not found",
                id
            )));
        }

        let outcome = match &patch.tags {
            Some(tags) => {
                let desired = tag_set(tags.iter().copied());
                ensure_tags(&gateway, &desired)?;
                Some(reconcile::reconcile(&gateway, id, desired)?)
            }
            None => None,
        };

        let product = gateway.find_product_detail(id)?.ok_or_else(|| {
            error::CatalogError::NotFound(format!("Product '{}' not found", id))
        })?;
        Ok(UpdatedProduct {
            product,
            tags: outcome,
        })
    })
}

/// Delete a product; its join rows go with it. Missing ids are `NotFound`.
pub fn delete_product(store: &Store, id: ProductId) -> Result<usize, error::CatalogError> {
    let broker = DbBroker::new(store);
    broker.with_conn("product.delete", |conn| {
        match SqliteGateway::new(conn).delete_product(id)? {
            0 => Err(error::CatalogError::NotFound(format!(
                "There is no product with id '{}'",
                id
            ))),
            n => Ok(n),
        }
    })
}

pub fn run_product_cli(store: &Store, cli: ProductCli) -> Result<(), error::CatalogError> {
    let output = match cli.command {
        ProductCommand::List => serde_json::to_value(list_products(store)?)?,
        ProductCommand::Get { id } => serde_json::to_value(get_product(store, id)?)?,
        ProductCommand::Create {
            name,
            price,
            stock,
            category,
            tags,
        } => {
            let input = ProductInput::from_json(&serde_json::json!({
                "product_name": name,
                "price": price,
                "stock": stock,
                "category_id": category,
                "tags": parse_tag_list(&tags)?,
            }))?;
            serde_json::to_value(create_product(store, &input)?)?
        }
        ProductCommand::Update {
            id,
            name,
            price,
            stock,
            category,
            clear_category,
            tags,
        } => {
            let mut body = serde_json::json!({
                "product_name": name,
                "price": price,
                "stock": stock,
            });
            if clear_category {
                body["category_id"] = JsonValue::Null;
            } else if let Some(category) = category {
                body["category_id"] = category.into();
            }
            if let Some(tags) = tags {
                body["tags"] = serde_json::to_value(parse_tag_list(&tags)?)?;
            }
            let patch = ProductPatch::from_json(&body)?;
            serde_json::to_value(update_product(store, id, &patch)?)?
        }
        ProductCommand::Delete { id } => {
            serde_json::json!({ "deleted": delete_product(store, id)? })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "product",
        "version": "0.1.0",
        "description": "Products with category reference and reconciled tag associations",
        "commands": [
            { "name": "list", "parameters": [] },
            { "name": "get", "parameters": ["id"] },
            { "name": "create", "parameters": ["name", "price", "stock", "category", "tags"] },
            { "name": "update", "parameters": ["id", "name", "price", "stock", "category", "clear_category", "tags"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "routes": [
            "GET /api/products",
            "GET /api/products/{id}",
            "POST /api/products",
            "PUT /api/products/{id}",
            "DELETE /api/products/{id}"
        ],
        "storage": ["catalog.db"]
    })
}

//! Catalog request surface.
//!
//! A request is a verb, a path under `/api`, and an optional JSON body; the response is a
//! status code and a JSON body. `dispatch` routes one request to one resource operation
//! and is the only place that turns a `CatalogError` into a status code.
//!
//! # Routes
//!
//! | Verb | Path | Operation |
//! |---|---|---|
//! | GET | `/api/products` | list products with category and tags |
//! | GET | `/api/products/{id}` | one product with category and tags |
//! | POST | `/api/products` | create, attaching `tags` if given |
//! | PUT | `/api/products/{id}` | update scalars, reconcile `tags` if given |
//! | DELETE | `/api/products/{id}` | delete |
//!
//! `/api/categories` and `/api/tags` expose the same five verbs.

use crate::core::error::CatalogError;
use crate::core::model::TagId;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::{categories, products, tags};
use colored::Colorize;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

/// Request envelope for the `rpc` command and in-process callers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub body: Option<JsonValue>,
    /// Request ID for correlation
    #[serde(default = "default_request_id")]
    pub id: String,
}

pub fn default_request_id() -> String {
    time::new_event_id()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: JsonValue,
}

impl ApiResponse {
    pub fn ok(body: JsonValue) -> Self {
        Self { status: 200, body }
    }

    /// Client errors carry their message. Server errors carry a fixed message; the
    /// underlying detail goes to stderr only.
    pub fn from_error(err: &CatalogError) -> Self {
        let status = err.status();
        let message = if status >= 500 {
            eprintln!("{} {}", "internal error:".bright_red(), err);
            "Internal error while accessing the catalog store".to_string()
        } else {
            err.to_string()
        };
        Self {
            status,
            body: serde_json::json!({
                "code": err.code(),
                "message": message,
            }),
        }
    }

    fn status_only(status: u16, message: String) -> Self {
        Self {
            status,
            body: serde_json::json!({ "message": message }),
        }
    }
}

impl ApiRequest {
    pub fn new(method: &str, path: &str, body: Option<JsonValue>) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            body,
            id: default_request_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Products,
    Categories,
    Tags,
}

fn route_re() -> &'static Regex {
    static ROUTE: OnceLock<Regex> = OnceLock::new();
    ROUTE.get_or_init(|| {
        Regex::new(r"^/api/(products|categories|tags)(?:/([^/]+))?/?$").expect("static route regex")
    })
}

/// Split `path` into a resource and an optional raw id segment.
fn match_route(path: &str) -> Option<(Resource, Option<&str>)> {
    let path = path.split('?').next().unwrap_or(path);
    let caps = route_re().captures(path)?;
    let resource = match caps.get(1)?.as_str() {
        "products" => Resource::Products,
        "categories" => Resource::Categories,
        _ => Resource::Tags,
    };
    Some((resource, caps.get(2).map(|m| m.as_str())))
}

fn parse_path_id(raw: &str) -> Result<i64, CatalogError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CatalogError::ValidationError(format!(
            "Invalid id '{}' in path",
            raw
        ))),
    }
}

fn require_body(request: &ApiRequest) -> Result<&JsonValue, CatalogError> {
    request.body.as_ref().ok_or_else(|| {
        CatalogError::ValidationError(format!("{} {} requires a JSON body", request.method, request.path))
    })
}

/// Route one request. Never fails: every error becomes a status code and body.
pub fn dispatch(store: &Store, request: &ApiRequest) -> ApiResponse {
    let Some((resource, raw_id)) = match_route(&request.path) else {
        return ApiResponse::status_only(404, format!("No route for {}", request.path));
    };
    let method = request.method.to_ascii_uppercase();

    let result = match raw_id {
        None => match method.as_str() {
            "GET" => list(store, resource),
            "POST" => require_body(request).and_then(|body| create(store, resource, body)),
            _ => {
                return ApiResponse::status_only(
                    405,
                    format!("{} not allowed on {}", method, request.path),
                );
            }
        },
        Some(raw) => {
            let id = match parse_path_id(raw) {
                Ok(id) => id,
                Err(e) => return ApiResponse::from_error(&e),
            };
            match method.as_str() {
                "GET" => get(store, resource, id),
                "PUT" => require_body(request).and_then(|body| update(store, resource, id, body)),
                "DELETE" => delete(store, resource, id),
                _ => {
                    return ApiResponse::status_only(
                        405,
                        format!("{} not allowed on {}", method, request.path),
                    );
                }
            }
        }
    };

    match result {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => ApiResponse::from_error(&e),
    }
}

fn list(store: &Store, resource: Resource) -> Result<JsonValue, CatalogError> {
    Ok(match resource {
        Resource::Products => serde_json::to_value(products::list_products(store)?)?,
        Resource::Categories => serde_json::to_value(categories::list_categories(store)?)?,
        Resource::Tags => serde_json::to_value(tags::list_tags(store)?)?,
    })
}

fn get(store: &Store, resource: Resource, id: i64) -> Result<JsonValue, CatalogError> {
    Ok(match resource {
        Resource::Products => serde_json::to_value(products::get_product(store, id)?)?,
        Resource::Categories => serde_json::to_value(categories::get_category(store, id)?)?,
        Resource::Tags => serde_json::to_value(tags::get_tag(store, TagId(id))?)?,
    })
}

fn create(store: &Store, resource: Resource, body: &JsonValue) -> Result<JsonValue, CatalogError> {
    Ok(match resource {
        Resource::Products => {
            let input = products::ProductInput::from_json(body)?;
            let created = products::create_product(store, &input)?;
            // Without tags the body is just the created product.
            if created.product_tags.is_empty() {
                serde_json::to_value(created.product)?
            } else {
                serde_json::to_value(created)?
            }
        }
        Resource::Categories => {
            let name = categories::parse_category_name(body)?;
            serde_json::to_value(categories::create_category(store, &name)?)?
        }
        Resource::Tags => {
            let name = tags::parse_tag_name(body)?;
            serde_json::to_value(tags::create_tag(store, &name)?)?
        }
    })
}

fn update(
    store: &Store,
    resource: Resource,
    id: i64,
    body: &JsonValue,
) -> Result<JsonValue, CatalogError> {
    Ok(match resource {
        Resource::Products => {
            let patch = products::ProductPatch::from_json(body)?;
            serde_json::to_value(products::update_product(store, id, &patch)?)?
        }
        Resource::Categories => {
            let name = categories::parse_category_name(body)?;
            serde_json::to_value(categories::rename_category(store, id, &name)?)?
        }
        Resource::Tags => {
            let name = tags::parse_tag_name(body)?;
            serde_json::to_value(tags::rename_tag(store, TagId(id), &name)?)?
        }
    })
}

fn delete(store: &Store, resource: Resource, id: i64) -> Result<JsonValue, CatalogError> {
    let deleted = match resource {
        Resource::Products => products::delete_product(store, id)?,
        Resource::Categories => categories::delete_category(store, id)?,
        Resource::Tags => tags::delete_tag(store, TagId(id))?,
    };
    Ok(serde_json::json!({ "deleted": deleted }))
}

/// Handle one JSON request envelope and return the response envelope.
pub fn handle_envelope(store: &Store, raw: &str) -> JsonValue {
    match serde_json::from_str::<ApiRequest>(raw) {
        Ok(request) => {
            let response = dispatch(store, &request);
            time::response_envelope(&request.id, response.status, response.body)
        }
        Err(e) => {
            let err = CatalogError::from(e);
            let response = ApiResponse::from_error(&err);
            time::response_envelope(&default_request_id(), response.status, response.body)
        }
    }
}

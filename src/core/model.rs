//! Entity types shared by the gateway, the reconciler, and the handlers.

use crate::core::error::CatalogError;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::fmt;

pub type ProductId = i64;
pub type CategoryId = i64;
/// Row id of a `product_tags` join row.
pub type RowId = i64;

/// Tag identity, normalized to an integer before any comparison.
///
/// Request bodies may carry tag ids as JSON numbers or numeric strings; both forms
/// collapse to the same `TagId`, so `"4"` and `4` never differ in a set difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i64);

impl TagId {
    pub fn from_json(value: &JsonValue) -> Result<Self, CatalogError> {
        let parsed = match value {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(id) if id > 0 => Ok(TagId(id)),
            _ => Err(CatalogError::ValidationError(format!(
                "Invalid tag id {}: expected a positive integer",
                value
            ))),
        }
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for TagId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for TagId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(TagId)
    }
}

/// Collapse an ordered tag list into a set; duplicates are idempotent.
pub fn tag_set<I>(ids: I) -> BTreeSet<TagId>
where
    I: IntoIterator<Item = TagId>,
{
    ids.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub category_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub product_name: String,
    pub price: f64,
    pub stock: i64,
    pub category_id: Option<CategoryId>,
}

/// A persisted `product_tags` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTag {
    pub id: RowId,
    pub product_id: ProductId,
    pub tag_id: TagId,
}

/// Current association of one product, as read back by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub id: RowId,
    pub tag_id: TagId,
}

/// A join row to be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAssociation {
    pub product_id: ProductId,
    pub tag_id: TagId,
}

/// Product eager-loaded with its category and tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
}

/// Category eager-loaded with the products that reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<Product>,
}

/// Tag eager-loaded with the products associated to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDetail {
    #[serde(flatten)]
    pub tag: Tag,
    pub products: Vec<Product>,
}

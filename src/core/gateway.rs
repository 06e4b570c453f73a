//! Persistence gateway over the catalog SQLite database.
//!
//! [`AssociationGateway`] is the narrow seam the reconciler depends on: read the current
//! join rows of a product, bulk-insert rows, bulk-delete rows by id. [`SqliteGateway`]
//! implements it over any borrowed connection (a `Transaction` derefs to one), and also
//! carries the point lookups and eager loads the resource handlers need.

use crate::core::error::CatalogError;
use crate::core::model::{
    Association, Category, CategoryDetail, CategoryId, NewAssociation, Product, ProductDetail,
    ProductId, ProductTag, RowId, Tag, TagDetail, TagId,
};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::{BTreeMap, BTreeSet};

/// Upper bound on bound variables per `IN (...)` statement; SQLite caps a statement at
/// 32766 variables.
const IN_LIST_CHUNK: usize = 500;

/// The join-table primitives the tag reconciler requires. No update-in-place primitive
/// exists: reassociation is always delete + insert.
pub trait AssociationGateway {
    /// All join rows of `product_id`, ordered by row id.
    fn find_associations(&self, product_id: ProductId) -> Result<Vec<Association>, CatalogError>;

    /// Insert one join row per entry; returns the persisted rows in input order.
    fn bulk_insert_associations(
        &self,
        rows: &[NewAssociation],
    ) -> Result<Vec<ProductTag>, CatalogError>;

    /// Delete join rows by row id; returns the number of rows removed.
    fn bulk_delete_associations(&self, row_ids: &[RowId]) -> Result<usize, CatalogError>;
}

pub struct SqliteGateway<'c> {
    conn: &'c Connection,
}

/// Update payload for product scalars. `None` leaves a column untouched; the outer
/// `Option` of `category_id` distinguishes "not given" from "set to null".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub product_name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub category_id: Option<Option<CategoryId>>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.product_name.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category_id.is_none()
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        product_name: row.get(1)?,
        price: row.get(2)?,
        stock: row.get(3)?,
        category_id: row.get(4)?,
    })
}

const PRODUCT_COLUMNS: &str = "p.id, p.product_name, p.price, p.stock, p.category_id";

impl<'c> SqliteGateway<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // --- Products ---

    pub fn insert_product(
        &self,
        product_name: &str,
        price: f64,
        stock: i64,
        category_id: Option<CategoryId>,
    ) -> Result<Product, CatalogError> {
        self.conn.execute(
            "INSERT INTO products(product_name, price, stock, category_id) VALUES(?1, ?2, ?3, ?4)",
            params![product_name, price, stock, category_id],
        )?;
        Ok(Product {
            id: self.conn.last_insert_rowid(),
            product_name: product_name.to_string(),
            price,
            stock,
            category_id,
        })
    }

    /// Apply scalar changes; returns the number of rows matched (0 or 1).
    pub fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<usize, CatalogError> {
        if changes.is_empty() {
            return Ok(usize::from(self.find_product(id)?.is_some()));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(name) = &changes.product_name {
            sets.push("product_name = ?");
            values.push(name.clone().into());
        }
        if let Some(price) = changes.price {
            sets.push("price = ?");
            values.push(price.into());
        }
        if let Some(stock) = changes.stock {
            sets.push("stock = ?");
            values.push(stock.into());
        }
        if let Some(category_id) = changes.category_id {
            sets.push("category_id = ?");
            values.push(category_id.into());
        }
        values.push(id.into());

        let sql = format!("UPDATE products SET {} WHERE id = ?", sets.join(", "));
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }

    pub fn delete_product(&self, id: ProductId) -> Result<usize, CatalogError> {
        Ok(self
            .conn
            .execute("DELETE FROM products WHERE id = ?1", params![id])?)
    }

    pub fn find_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let sql = format!("SELECT {} FROM products p WHERE p.id = ?1", PRODUCT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], product_from_row)
            .optional()?)
    }

    /// All products with category and tags, ordered by id.
    pub fn list_product_details(&self) -> Result<Vec<ProductDetail>, CatalogError> {
        self.load_product_details(None)
    }

    pub fn find_product_detail(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductDetail>, CatalogError> {
        Ok(self.load_product_details(Some(id))?.into_iter().next())
    }

    fn load_product_details(
        &self,
        only: Option<ProductId>,
    ) -> Result<Vec<ProductDetail>, CatalogError> {
        let sql = format!(
            "SELECT {}, c.id, c.category_name
             FROM products p LEFT JOIN categories c ON c.id = p.category_id
             WHERE ?1 IS NULL OR p.id = ?1
             ORDER BY p.id",
            PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![only], |row| {
            let product = product_from_row(row)?;
            let category = match row.get::<_, Option<CategoryId>>(5)? {
                Some(id) => Some(Category {
                    id,
                    category_name: row.get(6)?,
                }),
                None => None,
            };
            Ok(ProductDetail {
                product,
                category,
                tags: Vec::new(),
            })
        })?;

        let mut details = Vec::new();
        for r in rows {
            details.push(r?);
        }

        let mut tags_by_product = self.tags_for_products(only)?;
        for detail in &mut details {
            if let Some(tags) = tags_by_product.remove(&detail.product.id) {
                detail.tags = tags;
            }
        }
        Ok(details)
    }

    /// Tags grouped by product, filtered by the same predicate as the product query.
    fn tags_for_products(
        &self,
        only: Option<ProductId>,
    ) -> Result<BTreeMap<ProductId, Vec<Tag>>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT pt.product_id, t.id, t.tag_name
             FROM product_tags pt JOIN tags t ON t.id = pt.tag_id
             WHERE ?1 IS NULL OR pt.product_id = ?1
             ORDER BY pt.product_id, t.id",
        )?;
        let rows = stmt.query_map(params![only], |row| {
            Ok((
                row.get::<_, ProductId>(0)?,
                Tag {
                    id: row.get(1)?,
                    tag_name: row.get(2)?,
                },
            ))
        })?;
        let mut grouped: BTreeMap<ProductId, Vec<Tag>> = BTreeMap::new();
        for r in rows {
            let (product_id, tag) = r?;
            grouped.entry(product_id).or_default().push(tag);
        }
        Ok(grouped)
    }

    /// Tag ids from `ids` that have no row in `tags`.
    pub fn missing_tags(&self, ids: &BTreeSet<TagId>) -> Result<Vec<TagId>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids_vec: Vec<TagId> = ids.iter().copied().collect();
        let mut present = BTreeSet::new();
        for chunk in ids_vec.chunks(IN_LIST_CHUNK) {
            let sql = format!(
                "SELECT id FROM tags WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, TagId>(0))?;
            for r in rows {
                present.insert(r?);
            }
        }
        Ok(ids.difference(&present).copied().collect())
    }

    // --- Categories ---

    pub fn insert_category(&self, category_name: &str) -> Result<Category, CatalogError> {
        self.conn.execute(
            "INSERT INTO categories(category_name) VALUES(?1)",
            params![category_name],
        )?;
        Ok(Category {
            id: self.conn.last_insert_rowid(),
            category_name: category_name.to_string(),
        })
    }

    pub fn rename_category(&self, id: CategoryId, category_name: &str) -> Result<usize, CatalogError> {
        Ok(self.conn.execute(
            "UPDATE categories SET category_name = ?1 WHERE id = ?2",
            params![category_name, id],
        )?)
    }

    pub fn delete_category(&self, id: CategoryId) -> Result<usize, CatalogError> {
        Ok(self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?)
    }

    pub fn find_category(&self, id: CategoryId) -> Result<Option<Category>, CatalogError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, category_name FROM categories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        category_name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_category_details(
        &self,
        only: Option<CategoryId>,
    ) -> Result<Vec<CategoryDetail>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, category_name FROM categories
             WHERE ?1 IS NULL OR id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![only], |row| {
            Ok(Category {
                id: row.get(0)?,
                category_name: row.get(1)?,
            })
        })?;
        let mut categories = Vec::new();
        for r in rows {
            categories.push(r?);
        }

        let sql = format!(
            "SELECT {} FROM products p
             WHERE p.category_id IS NOT NULL AND (?1 IS NULL OR p.category_id = ?1)
             ORDER BY p.id",
            PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![only], product_from_row)?;
        let mut by_category: BTreeMap<CategoryId, Vec<Product>> = BTreeMap::new();
        for r in rows {
            let product = r?;
            if let Some(category_id) = product.category_id {
                by_category.entry(category_id).or_default().push(product);
            }
        }

        Ok(categories
            .into_iter()
            .map(|category| CategoryDetail {
                products: by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }

    // --- Tags ---

    pub fn insert_tag(&self, tag_name: &str) -> Result<Tag, CatalogError> {
        self.conn
            .execute("INSERT INTO tags(tag_name) VALUES(?1)", params![tag_name])?;
        Ok(Tag {
            id: TagId(self.conn.last_insert_rowid()),
            tag_name: tag_name.to_string(),
        })
    }

    pub fn rename_tag(&self, id: TagId, tag_name: &str) -> Result<usize, CatalogError> {
        Ok(self.conn.execute(
            "UPDATE tags SET tag_name = ?1 WHERE id = ?2",
            params![tag_name, id],
        )?)
    }

    pub fn delete_tag(&self, id: TagId) -> Result<usize, CatalogError> {
        Ok(self
            .conn
            .execute("DELETE FROM tags WHERE id = ?1", params![id])?)
    }

    pub fn list_tag_details(&self, only: Option<TagId>) -> Result<Vec<TagDetail>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, tag_name FROM tags WHERE ?1 IS NULL OR id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![only], |row| {
            Ok(Tag {
                id: row.get(0)?,
                tag_name: row.get(1)?,
            })
        })?;
        let mut tags = Vec::new();
        for r in rows {
            tags.push(r?);
        }

        let sql = format!(
            "SELECT pt.tag_id, {} FROM product_tags pt JOIN products p ON p.id = pt.product_id
             WHERE ?1 IS NULL OR pt.tag_id = ?1
             ORDER BY pt.tag_id, p.id",
            PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![only], |row| {
            Ok((
                row.get::<_, TagId>(0)?,
                Product {
                    id: row.get(1)?,
                    product_name: row.get(2)?,
                    price: row.get(3)?,
                    stock: row.get(4)?,
                    category_id: row.get(5)?,
                },
            ))
        })?;
        let mut by_tag: BTreeMap<TagId, Vec<Product>> = BTreeMap::new();
        for r in rows {
            let (tag_id, product) = r?;
            by_tag.entry(tag_id).or_default().push(product);
        }

        Ok(tags
            .into_iter()
            .map(|tag| TagDetail {
                products: by_tag.remove(&tag.id).unwrap_or_default(),
                tag,
            })
            .collect())
    }
}

impl AssociationGateway for SqliteGateway<'_> {
    fn find_associations(&self, product_id: ProductId) -> Result<Vec<Association>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, tag_id FROM product_tags WHERE product_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![product_id], |row| {
            Ok(Association {
                id: row.get(0)?,
                tag_id: row.get(1)?,
            })
        })?;
        let mut associations = Vec::new();
        for r in rows {
            associations.push(r?);
        }
        Ok(associations)
    }

    fn bulk_insert_associations(
        &self,
        rows: &[NewAssociation],
    ) -> Result<Vec<ProductTag>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO product_tags(product_id, tag_id) VALUES(?1, ?2)")?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let id = stmt.insert(params![row.product_id, row.tag_id])?;
            inserted.push(ProductTag {
                id,
                product_id: row.product_id,
                tag_id: row.tag_id,
            });
        }
        Ok(inserted)
    }

    fn bulk_delete_associations(&self, row_ids: &[RowId]) -> Result<usize, CatalogError> {
        if row_ids.is_empty() {
            return Ok(0);
        }
        let mut removed = 0;
        for chunk in row_ids.chunks(IN_LIST_CHUNK) {
            let sql = format!(
                "DELETE FROM product_tags WHERE id IN ({})",
                placeholders(chunk.len())
            );
            removed += self
                .conn
                .prepare_cached(&sql)?
                .execute(params_from_iter(chunk.iter()))?;
        }
        Ok(removed)
    }
}

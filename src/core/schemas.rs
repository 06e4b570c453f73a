//! Centralized database schema definitions for the catalog store.
//!
//! One SQLite database holds four tables: categories, tags, products, and the
//! product_tags join table.

pub const CATALOG_DB_NAME: &str = "catalog.db";

pub const CATALOG_DB_SCHEMA_CATEGORIES: &str = "
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_name TEXT NOT NULL
    )
";

pub const CATALOG_DB_SCHEMA_TAGS: &str = "
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tag_name TEXT NOT NULL
    )
";

pub const CATALOG_DB_SCHEMA_PRODUCTS: &str = "
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_name TEXT NOT NULL,
        price REAL NOT NULL CHECK (price >= 0),
        stock INTEGER NOT NULL DEFAULT 10 CHECK (stock >= 0),
        category_id INTEGER,
        FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
    )
";

// (product_id, tag_id) is unique: one row means the association exists.
pub const CATALOG_DB_SCHEMA_PRODUCT_TAGS: &str = "
    CREATE TABLE IF NOT EXISTS product_tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        UNIQUE(product_id, tag_id),
        FOREIGN KEY(product_id) REFERENCES products(id) ON DELETE CASCADE,
        FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
    )
";

pub const CATALOG_DB_INDEX_PRODUCTS_CATEGORY: &str =
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)";
pub const CATALOG_DB_INDEX_PRODUCT_TAGS_TAG: &str =
    "CREATE INDEX IF NOT EXISTS idx_product_tags_tag ON product_tags(tag_id)";

/// All schema statements in dependency order.
pub const CATALOG_DB_SCHEMA: [&str; 6] = [
    CATALOG_DB_SCHEMA_CATEGORIES,
    CATALOG_DB_SCHEMA_TAGS,
    CATALOG_DB_SCHEMA_PRODUCTS,
    CATALOG_DB_SCHEMA_PRODUCT_TAGS,
    CATALOG_DB_INDEX_PRODUCTS_CATEGORY,
    CATALOG_DB_INDEX_PRODUCT_TAGS_TAG,
];

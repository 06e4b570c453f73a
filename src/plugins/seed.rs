//! Demo data for a fresh store.
//!
//! Rows are created through the same gateway calls the request surface uses, so seeded
//! products get their tags via the creation-time attach path.

use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::gateway::SqliteGateway;
use crate::core::model::TagId;
use crate::core::store::Store;
use crate::plugins::products;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const CATEGORIES: [&str; 5] = ["Shirts", "Shorts", "Music", "Hats", "Shoes"];

const TAGS: [&str; 8] = [
    "rock music",
    "pop music",
    "blue",
    "red",
    "green",
    "white",
    "gold",
    "pop culture",
];

struct SeedProduct {
    name: &'static str,
    price: f64,
    stock: i64,
    /// Index into `CATEGORIES`.
    category: usize,
    /// Indices into `TAGS`.
    tags: &'static [usize],
}

const PRODUCTS: [SeedProduct; 5] = [
    SeedProduct {
        name: "Plain T-Shirt",
        price: 14.99,
        stock: 14,
        category: 0,
        tags: &[5, 6, 7],
    },
    SeedProduct {
        name: "Running Sneakers",
        price: 90.0,
        stock: 25,
        category: 4,
        tags: &[5],
    },
    SeedProduct {
        name: "Branded Baseball Hat",
        price: 22.99,
        stock: 12,
        category: 3,
        tags: &[0, 2, 3, 4],
    },
    SeedProduct {
        name: "Top 40 Music Compilation Vinyl Record",
        price: 12.99,
        stock: 50,
        category: 2,
        tags: &[0, 1, 7],
    },
    SeedProduct {
        name: "Cargo Shorts",
        price: 29.99,
        stock: 22,
        category: 1,
        tags: &[2],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub categories: usize,
    pub tags: usize,
    pub products: usize,
    pub product_tags: usize,
}

fn is_empty_store(conn: &Connection) -> Result<bool, error::CatalogError> {
    let rows: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM categories)
              + (SELECT COUNT(*) FROM tags)
              + (SELECT COUNT(*) FROM products)",
        [],
        |row| row.get(0),
    )?;
    Ok(rows == 0)
}

/// Populate an empty store with demo categories, tags and products.
///
/// The emptiness check and every insert share one immediate transaction: a failure
/// leaves the store empty, and concurrent seeds cannot both pass the check.
pub fn seed_catalog(store: &Store) -> Result<SeedSummary, error::CatalogError> {
    DbBroker::new(store).with_tx("catalog.seed", |tx| {
        if !is_empty_store(tx)? {
            return Err(error::CatalogError::ValidationError(
                "Store already holds catalog data; seed only runs on an empty store".to_string(),
            ));
        }
        let gateway = SqliteGateway::new(tx);

        let mut category_ids = Vec::with_capacity(CATEGORIES.len());
        for name in CATEGORIES {
            category_ids.push(gateway.insert_category(name)?.id);
        }

        let mut tag_ids: Vec<TagId> = Vec::with_capacity(TAGS.len());
        for name in TAGS {
            tag_ids.push(gateway.insert_tag(name)?.id);
        }

        let mut product_tags = 0;
        for seed in &PRODUCTS {
            let input = products::ProductInput {
                product_name: seed.name.to_string(),
                price: seed.price,
                stock: seed.stock,
                category_id: Some(category_ids[seed.category]),
                tags: seed.tags.iter().map(|&i| tag_ids[i]).collect(),
            };
            product_tags += products::insert_product_with_tags(&gateway, &input)?
                .product_tags
                .len();
        }

        Ok(SeedSummary {
            categories: category_ids.len(),
            tags: tag_ids.len(),
            products: PRODUCTS.len(),
            product_tags,
        })
    })
}

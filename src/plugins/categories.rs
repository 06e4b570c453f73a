use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::gateway::SqliteGateway;
use crate::core::model::{Category, CategoryDetail, CategoryId};
use crate::core::store::Store;
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;

#[derive(Parser, Debug)]
#[clap(name = "category", about = "Manage product categories.")]
pub struct CategoryCli {
    #[clap(subcommand)]
    pub command: CategoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// List categories with their products.
    List,
    /// Get a category by ID.
    Get {
        #[clap(long)]
        id: CategoryId,
    },
    /// Create a category.
    Create {
        #[clap(value_name = "NAME")]
        name: String,
    },
    /// Rename a category.
    Update {
        #[clap(long)]
        id: CategoryId,
        #[clap(long)]
        name: String,
    },
    /// Delete a category; its products keep existing without one.
    Delete {
        #[clap(long)]
        id: CategoryId,
    },
}

/// Extract a required, non-empty `category_name` from a request body.
pub fn parse_category_name(body: &JsonValue) -> Result<String, error::CatalogError> {
    match body.get("category_name").and_then(JsonValue::as_str).map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(error::CatalogError::ValidationError(
            "'category_name' must be a non-empty string".to_string(),
        )),
    }
}

fn not_found(id: CategoryId) -> error::CatalogError {
    error::CatalogError::NotFound(format!("Category '{}' not found", id))
}

pub fn list_categories(store: &Store) -> Result<Vec<CategoryDetail>, error::CatalogError> {
    DbBroker::new(store).with_conn("category.list", |conn| {
        SqliteGateway::new(conn).list_category_details(None)
    })
}

pub fn get_category(store: &Store, id: CategoryId) -> Result<CategoryDetail, error::CatalogError> {
    DbBroker::new(store).with_conn("category.get", |conn| {
        SqliteGateway::new(conn)
            .list_category_details(Some(id))?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(id))
    })
}

pub fn create_category(store: &Store, name: &str) -> Result<Category, error::CatalogError> {
    DbBroker::new(store).with_conn("category.create", |conn| {
        SqliteGateway::new(conn).insert_category(name)
    })
}

pub fn rename_category(
    store: &Store,
    id: CategoryId,
    name: &str,
) -> Result<Category, error::CatalogError> {
    DbBroker::new(store).with_conn("category.update", |conn| {
        match SqliteGateway::new(conn).rename_category(id, name)? {
            0 => Err(not_found(id)),
            _ => Ok(Category {
                id,
                category_name: name.to_string(),
            }),
        }
    })
}

pub fn delete_category(store: &Store, id: CategoryId) -> Result<usize, error::CatalogError> {
    DbBroker::new(store).with_conn("category.delete", |conn| {
        match SqliteGateway::new(conn).delete_category(id)? {
            0 => Err(not_found(id)),
            n => Ok(n),
        }
    })
}

pub fn run_category_cli(store: &Store, cli: CategoryCli) -> Result<(), error::CatalogError> {
    let output = match cli.command {
        CategoryCommand::List => serde_json::to_value(list_categories(store)?)?,
        CategoryCommand::Get { id } => serde_json::to_value(get_category(store, id)?)?,
        CategoryCommand::Create { name } => {
            let name = parse_category_name(&serde_json::json!({ "category_name": name }))?;
            serde_json::to_value(create_category(store, &name)?)?
        }
        CategoryCommand::Update { id, name } => {
            let name = parse_category_name(&serde_json::json!({ "category_name": name }))?;
            serde_json::to_value(rename_category(store, id, &name)?)?
        }
        CategoryCommand::Delete { id } => {
            serde_json::json!({ "deleted": delete_category(store, id)? })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "category",
        "version": "0.1.0",
        "description": "Product categories (one category per product)",
        "commands": [
            { "name": "list", "parameters": [] },
            { "name": "get", "parameters": ["id"] },
            { "name": "create", "parameters": ["name"] },
            { "name": "update", "parameters": ["id", "name"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["catalog.db"]
    })
}

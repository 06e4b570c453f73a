use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::gateway::SqliteGateway;
use crate::core::model::{Tag, TagDetail, TagId};
use crate::core::store::Store;
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;

#[derive(Parser, Debug)]
#[clap(name = "tag", about = "Manage tags.")]
pub struct TagCli {
    #[clap(subcommand)]
    pub command: TagCommand,
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// List tags with their products.
    List,
    /// Get a tag by ID.
    Get {
        #[clap(long)]
        id: i64,
    },
    /// Create a tag.
    Create {
        #[clap(value_name = "NAME")]
        name: String,
    },
    /// Rename a tag.
    Update {
        #[clap(long)]
        id: i64,
        #[clap(long)]
        name: String,
    },
    /// Delete a tag and every association to it.
    Delete {
        #[clap(long)]
        id: i64,
    },
}

pub fn parse_tag_name(body: &JsonValue) -> Result<String, error::CatalogError> {
    match body.get("tag_name").and_then(JsonValue::as_str).map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(error::CatalogError::ValidationError(
            "'tag_name' must be a non-empty string".to_string(),
        )),
    }
}

fn not_found(id: TagId) -> error::CatalogError {
    error::CatalogError::NotFound(format!("Tag '{}' not found", id))
}

pub fn list_tags(store: &Store) -> Result<Vec<TagDetail>, error::CatalogError> {
    DbBroker::new(store).with_conn("tag.list", |conn| {
        SqliteGateway::new(conn).list_tag_details(None)
    })
}

pub fn get_tag(store: &Store, id: TagId) -> Result<TagDetail, error::CatalogError> {
    DbBroker::new(store).with_conn("tag.get", |conn| {
        SqliteGateway::new(conn)
            .list_tag_details(Some(id))?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(id))
    })
}

pub fn create_tag(store: &Store, name: &str) -> Result<Tag, error::CatalogError> {
    DbBroker::new(store).with_conn("tag.create", |conn| SqliteGateway::new(conn).insert_tag(name))
}

pub fn rename_tag(store: &Store, id: TagId, name: &str) -> Result<Tag, error::CatalogError> {
    DbBroker::new(store).with_conn("tag.update", |conn| {
        match SqliteGateway::new(conn).rename_tag(id, name)? {
            0 => Err(not_found(id)),
            _ => Ok(Tag {
                id,
                tag_name: name.to_string(),
            }),
        }
    })
}

pub fn delete_tag(store: &Store, id: TagId) -> Result<usize, error::CatalogError> {
    DbBroker::new(store).with_conn("tag.delete", |conn| {
        match SqliteGateway::new(conn).delete_tag(id)? {
            0 => Err(not_found(id)),
            n => Ok(n),
        }
    })
}

pub fn run_tag_cli(store: &Store, cli: TagCli) -> Result<(), error::CatalogError> {
    let output = match cli.command {
        TagCommand::List => serde_json::to_value(list_tags(store)?)?,
        TagCommand::Get { id } => serde_json::to_value(get_tag(store, TagId(id))?)?,
        TagCommand::Create { name } => {
            let name = parse_tag_name(&serde_json::json!({ "tag_name": name }))?;
            serde_json::to_value(create_tag(store, &name)?)?
        }
        TagCommand::Update { id, name } => {
            let name = parse_tag_name(&serde_json::json!({ "tag_name": name }))?;
            serde_json::to_value(rename_tag(store, TagId(id), &name)?)?
        }
        TagCommand::Delete { id } => {
            serde_json::json!({ "deleted": delete_tag(store, TagId(id))? })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "tag",
        "version": "0.1.0",
        "description": "Tags linked to products through product_tags",
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

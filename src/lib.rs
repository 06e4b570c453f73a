//! Catalog: a local-first product catalog store.
//!
//! Products belong to at most one category and carry any number of tags through the
//! `product_tags` join table. Every state access goes through the `DbBroker`, which opens
//! a connection per call and records an audit event.
//!
//! # Tag reconciliation
//!
//! Updating a product with a `tags` list does not rewrite its associations wholesale.
//! [`crate::core::reconcile`] diffs the persisted join rows against the desired set and applies
//! only the missing inserts and stale deletes, inside the same transaction as the scalar
//! update, so a failure leaves the product exactly as it was.
//!
//! # Examples
//!
//! ```bash
//! catalog init
//! catalog seed
//! catalog request GET /api/products
//! catalog request PUT /api/products/1 --body '{"tags": [2, 3, 4]}'
//! catalog product update --id 1 --tags 2,3,4
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: store, broker, gateway, reconciler, request surface
//! - [`plugins`]: product, category, and tag handlers plus seed data

pub mod core;
pub mod plugins;

mod cli;

use crate::cli::{AuditCli, Cli, Command, RequestCli, RpcCli};
use crate::core::{broker, db, error, rpc, store::Store};
use crate::plugins::{categories, products, seed, tags};

use clap::Parser;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub fn run() -> Result<(), error::CatalogError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => println!("v{}", env!("CARGO_PKG_VERSION")),
        Command::Capabilities => {
            let report = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "subsystems": [
                    products::schema(),
                    categories::schema(),
                    tags::schema(),
                    broker::schema(),
                ],
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Init => {
            let store = open_store(cli.root)?;
            println!(
                "{} Catalog database initialized at {}",
                "✓".bright_green(),
                store.db_path().display()
            );
        }
        Command::Seed => {
            let summary = seed::seed_catalog(&open_store(cli.root)?)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Request(req) => run_request(&open_store(cli.root)?, req)?,
        Command::Rpc(rpc_cli) => run_rpc(&open_store(cli.root)?, rpc_cli)?,
        Command::Product(product_cli) => {
            products::run_product_cli(&open_store(cli.root)?, product_cli)?
        }
        Command::Category(category_cli) => {
            categories::run_category_cli(&open_store(cli.root)?, category_cli)?
        }
        Command::Tag(tag_cli) => tags::run_tag_cli(&open_store(cli.root)?, tag_cli)?,
        Command::Audit(audit_cli) => run_audit(&open_store(cli.root)?, audit_cli)?,
    }
    Ok(())
}

/// Opens the store and makes sure the schema exists.
fn open_store(root_flag: Option<PathBuf>) -> Result<Store, error::CatalogError> {
    let root = crate::core::store::resolve_root(root_flag);
    let store = Store::open(&root)?;
    db::initialize_catalog_db(&store)?;
    Ok(store)
}

fn run_request(store: &Store, req: RequestCli) -> Result<(), error::CatalogError> {
    let body = req
        .body
        .as_deref()
        .map(|raw| serde_json::from_str::<serde_json::Value>(raw))
        .transpose()?;
    let request = rpc::ApiRequest::new(&req.method, &req.path, body);
    let response = rpc::dispatch(store, &request);

    let status = response.status.to_string();
    let status = match response.status {
        200..=299 => status.bright_green(),
        400..=499 => status.bright_yellow(),
        _ => status.bright_red(),
    };
    eprintln!("{} {} {}", status, request.method.to_ascii_uppercase(), request.path);
    println!("{}", serde_json::to_string_pretty(&response.body)?);

    if response.status >= 400 {
        return Err(error::CatalogError::RequestFailed(response.status));
    }
    Ok(())
}

fn run_rpc(store: &Store, rpc_cli: RpcCli) -> Result<(), error::CatalogError> {
    if rpc_cli.stdin {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout().lock();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope = rpc::handle_envelope(store, &line);
            writeln!(stdout, "{}", serde_json::to_string(&envelope)?)?;
        }
        return Ok(());
    }

    let raw = rpc_cli.request.ok_or_else(|| {
        error::CatalogError::ValidationError("rpc requires --request or --stdin".to_string())
    })?;
    let envelope = rpc::handle_envelope(store, &raw);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn run_audit(store: &Store, audit_cli: AuditCli) -> Result<(), error::CatalogError> {
    let Some(path) = store.audit_log_path() else {
        eprintln!("{} audit log is disabled in catalog.toml", "▸".bright_yellow());
        return Ok(());
    };
    let events = broker::read_events(&path)?;
    let skip = audit_cli
        .limit
        .map(|n| events.len().saturating_sub(n))
        .unwrap_or(0);
    for event in events.iter().skip(skip) {
        let status = if event.status == "success" {
            event.status.bright_green()
        } else {
            event.status.bright_red()
        };
        println!("{} {:<18} {} {}", event.ts, event.op, status, event.event_id);
    }
    Ok(())
}

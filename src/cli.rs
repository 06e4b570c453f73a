//! CLI struct definitions for the catalog command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use crate::plugins::{categories, products, tags};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "catalog",
    version = env!("CARGO_PKG_VERSION"),
    about = "Local-first product catalog: products, categories, and tags backed by SQLite."
)]
pub(crate) struct Cli {
    /// Store root directory (defaults to $CATALOG_HOME, then ./.catalog).
    #[clap(long, global = true)]
    pub root: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RequestCli {
    /// HTTP verb: GET, POST, PUT or DELETE.
    #[clap(value_name = "METHOD")]
    pub method: String,
    /// Path under /api, e.g. /api/products/3.
    #[clap(value_name = "PATH")]
    pub path: String,
    /// JSON request body.
    #[clap(long)]
    pub body: Option<String>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RpcCli {
    /// One JSON request envelope: {"method", "path", "body"}.
    #[clap(long)]
    pub request: Option<String>,
    /// Read newline-delimited request envelopes from stdin.
    #[clap(long)]
    pub stdin: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct AuditCli {
    /// Show only the most recent N events.
    #[clap(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print the catalog version
    Version,

    /// Create the store directory and database schema
    Init,

    /// Fill an empty store with demo categories, tags and products
    Seed,

    /// Send one request through the resource handlers
    Request(RequestCli),

    /// JSON request/response envelopes for scripted callers
    Rpc(RpcCli),

    /// Products and their tag associations
    Product(products::ProductCli),

    /// Product categories
    Category(categories::CategoryCli),

    /// Tags
    Tag(tags::TagCli),

    /// Show the broker audit log
    Audit(AuditCli),

    /// Describe every command group and route
    Capabilities,
}

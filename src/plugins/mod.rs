//! Resource handlers for the catalog.
//!
//! Each module owns one resource: its clap subcommands, request-body validation, and the
//! operations the request surface dispatches to.

pub mod categories;
pub mod products;
pub mod seed;
pub mod tags;

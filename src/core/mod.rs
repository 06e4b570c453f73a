//! Core modules for the catalog store.
//!
//! Persistence, configuration, the tag reconciler, and the request surface live here;
//! resource-specific handlers live in `plugins`.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod model;
pub mod reconcile;
pub mod rpc;
pub mod schemas;
pub mod store;
pub mod time;

use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use rusqlite::Connection;
use std::time::Duration;

pub fn db_connect(db_path: &str, busy_timeout_secs: u64) -> Result<Connection, error::CatalogError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(busy_timeout_secs))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

pub fn initialize_catalog_db(store: &Store) -> Result<(), error::CatalogError> {
    let broker = DbBroker::new(store);
    broker.with_conn("catalog.init", |conn| {
        for stmt in schemas::CATALOG_DB_SCHEMA {
            conn.execute_batch(stmt)?;
        }
        Ok(())
    })
}

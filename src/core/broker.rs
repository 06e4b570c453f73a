use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The DB Broker is the single entry point for state access.
///
/// Every call opens its own connection, so concurrent requests never share one and no
/// in-process lock sits between them. Writers that need a consistent read-modify-write
/// go through [`DbBroker::with_tx`], which holds SQLite's write lock for the whole unit
/// of work. Each brokered operation is recorded in the audit log.
pub struct DbBroker {
    db_path: PathBuf,
    busy_timeout_secs: u64,
    actor: String,
    audit_log_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(store: &Store) -> Self {
        Self {
            db_path: store.db_path(),
            busy_timeout_secs: store.config.database.busy_timeout_secs,
            actor: store.config.actor.clone(),
            audit_log_path: store.audit_log_path(),
        }
    }

    /// Execute a closure with a fresh connection to the catalog DB.
    pub fn with_conn<F, R>(&self, op_name: &str, f: F) -> Result<R, error::CatalogError>
    where
        F: FnOnce(&Connection) -> Result<R, error::CatalogError>,
    {
        let conn = self.connect()?;
        let result = f(&conn);
        self.record(op_name, &result);
        result
    }

    /// Execute a closure inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// Commits when the closure returns `Ok`; any `Err` (from the closure or from the
    /// commit) rolls the whole unit of work back.
    pub fn with_tx<F, R>(&self, op_name: &str, f: F) -> Result<R, error::CatalogError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, error::CatalogError>,
    {
        let mut conn = self.connect()?;
        let result = run_in_tx(&mut conn, f);
        self.record(op_name, &result);
        result
    }

    fn connect(&self) -> Result<Connection, error::CatalogError> {
        db::db_connect(&self.db_path.to_string_lossy(), self.busy_timeout_secs)
    }

    fn record<R>(&self, op_name: &str, result: &Result<R, error::CatalogError>) {
        let status = if result.is_ok() { "success" } else { "error" };
        // The mutation outcome stands on its own; a lost audit line must not flip it.
        if let Err(e) = self.log_event(op_name, status) {
            eprintln!("warning: audit log write failed for {}: {}", op_name, e);
        }
    }

    fn log_event(&self, op: &str, status: &str) -> Result<(), error::CatalogError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let Some(audit_log_path) = &self.audit_log_path else {
            return Ok(());
        };

        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: self.actor.clone(),
            op: op.to_string(),
            db_id: self
                .db_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(audit_log_path)
            .map_err(error::CatalogError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev)?).map_err(error::CatalogError::IoError)?;
        Ok(())
    }
}

fn run_in_tx<F, R>(conn: &mut Connection, f: F) -> Result<R, error::CatalogError>
where
    F: FnOnce(&Transaction<'_>) -> Result<R, error::CatalogError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Dropping an uncommitted transaction rolls it back.
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Read every recorded broker event, oldest first.
pub fn read_events(path: &Path) -> Result<Vec<BrokerEvent>, error::CatalogError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(error::CatalogError::IoError)?;
    let mut events = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "broker",
        "version": "0.1.0",
        "description": "State access broker with audit log",
        "commands": [
            { "name": "audit", "description": "Show the mutation audit log" }
        ],
        "storage": ["broker.events.jsonl"]
    })
}

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{EscrowError, EscrowResult};

pub struct DbManager {
    conn: Arc<Mutex<Connection>>,
}

impl DbManager {
    pub fn new(db_path: &str) -> EscrowResult<Self> {
        // ensure directory exists
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EscrowError::StoreUnavailable(e.to_string()))?;
        }

        // open SQLite connection
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        manager.init_schema()?;

        tracing::info!("Opened escrow ledger at {}", db_path);
        Ok(manager)
    }

    fn init_schema(&self) -> EscrowResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                coin TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                tx_hash TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions (user_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS disputes (
                id TEXT PRIMARY KEY,
                tx_id TEXT NOT NULL REFERENCES transactions(id),
                reason TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'open',
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn get_conn(&self) -> EscrowResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EscrowError::StoreUnavailable(format!("Failed to lock connection: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_schema_creation_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested/escrow.db");
        let db_path = db_path.to_str().unwrap();

        DbManager::new(db_path).unwrap();
        let db = DbManager::new(db_path).unwrap();

        let conn = db.get_conn().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('transactions', 'disputes')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("escrow.db");
        let db = DbManager::new(db_path.to_str().unwrap()).unwrap();

        let conn = db.get_conn().unwrap();
        let result = conn.execute(
            "INSERT INTO disputes (id, tx_id, reason, created_at) VALUES ('d1', 'missing', '', 0)",
            [],
        );
        assert!(result.is_err());
    }
}

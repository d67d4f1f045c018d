use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EscrowError, EscrowResult};
use crate::models::{
    CurrencyCode, Dispute, DisputeStatus, EscrowRole, Transaction, TransactionStatus,
};
use crate::storage::DbManager;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, role, coin, wallet_address, tx_hash, status, timestamp";
const DISPUTE_COLUMNS: &str = "id, tx_id, reason, status, created_at";

/// Durable record of escrow transactions and disputes.
///
/// Records are only ever inserted or updated. Every read-modify-write runs in
/// a single SQLite transaction while the connection lock is held.
pub struct LedgerStore {
    db_manager: Arc<DbManager>,
}

impl LedgerStore {
    pub fn new(db_manager: Arc<DbManager>) -> Self {
        Self { db_manager }
    }

    pub fn create_transaction(
        &self,
        user_id: &str,
        role: EscrowRole,
        coin: CurrencyCode,
        wallet_address: &str,
    ) -> EscrowResult<Transaction> {
        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            role,
            coin,
            wallet_address: wallet_address.to_string(),
            tx_hash: None,
            status: TransactionStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
        };

        let conn = self.db_manager.get_conn()?;
        conn.execute(
            "INSERT INTO transactions (id, user_id, role, coin, wallet_address, tx_hash, status, timestamp)
             VALUES (?, ?, ?, ?, ?, NULL, ?, ?)",
            params![
                tx.id,
                tx.user_id,
                tx.role.as_str(),
                tx.coin.as_str(),
                tx.wallet_address,
                tx.status.as_str(),
                tx.created_at,
            ],
        )?;

        tracing::info!(
            "Created transaction {} for user {} ({} {})",
            tx.id, tx.user_id, tx.role, tx.coin
        );
        Ok(tx)
    }

    pub fn get_transaction(&self, transaction_id: &str) -> EscrowResult<Transaction> {
        let conn = self.db_manager.get_conn()?;
        load_transaction(&conn, transaction_id)?
            .ok_or_else(|| EscrowError::transaction_not_found(transaction_id))
    }

    /// Newest first.
    pub fn transactions_for_user(&self, user_id: &str) -> EscrowResult<Vec<Transaction>> {
        let conn = self.db_manager.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY timestamp DESC, rowid DESC",
            TRANSACTION_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![user_id], transaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().collect()
    }

    /// Records the reported chain hash and moves the record to
    /// awaiting_confirmation. Re-submitting the same hash is a no-op.
    pub fn attach_tx_hash(&self, transaction_id: &str, tx_hash: &str) -> EscrowResult<Transaction> {
        let mut conn = self.db_manager.get_conn()?;
        let db_tx = conn.transaction()?;

        let mut tx = load_transaction(&db_tx, transaction_id)?
            .ok_or_else(|| EscrowError::transaction_not_found(transaction_id))?;

        if let Some(existing) = tx.tx_hash.clone() {
            if existing != tx_hash {
                return Err(EscrowError::AlreadyAttached {
                    transaction_id: transaction_id.to_string(),
                    existing,
                });
            }
            return Ok(tx);
        }

        let next = TransactionStatus::AwaitingConfirmation;
        if !tx.status.can_transition_to(next) {
            return Err(EscrowError::InvalidTransition {
                from: tx.status,
                to: next,
            });
        }

        db_tx.execute(
            "UPDATE transactions SET tx_hash = ?, status = ? WHERE id = ?",
            params![tx_hash, next.as_str(), transaction_id],
        )?;
        db_tx.commit()?;

        tx.tx_hash = Some(tx_hash.to_string());
        tx.status = next;

        tracing::info!("Attached tx hash {} to transaction {}", tx_hash, transaction_id);
        Ok(tx)
    }

    pub fn mark_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> EscrowResult<Transaction> {
        let mut conn = self.db_manager.get_conn()?;
        let db_tx = conn.transaction()?;

        let mut tx = load_transaction(&db_tx, transaction_id)?
            .ok_or_else(|| EscrowError::transaction_not_found(transaction_id))?;

        if !tx.status.can_transition_to(status) {
            return Err(EscrowError::InvalidTransition {
                from: tx.status,
                to: status,
            });
        }

        db_tx.execute(
            "UPDATE transactions SET status = ? WHERE id = ?",
            params![status.as_str(), transaction_id],
        )?;
        db_tx.commit()?;

        tracing::info!("Transaction {}: {} -> {}", transaction_id, tx.status, status);
        tx.status = status;
        Ok(tx)
    }

    /// Returns the new dispute together with the transaction it concerns,
    /// both read under the same lock.
    pub fn create_dispute(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> EscrowResult<(Dispute, Transaction)> {
        let mut conn = self.db_manager.get_conn()?;
        let db_tx = conn.transaction()?;

        let tx = load_transaction(&db_tx, transaction_id)?
            .ok_or_else(|| EscrowError::transaction_not_found(transaction_id))?;

        let dispute = Dispute {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.to_string(),
            reason: reason.to_string(),
            status: DisputeStatus::Open,
            created_at: chrono::Utc::now().timestamp(),
        };

        db_tx.execute(
            "INSERT INTO disputes (id, tx_id, reason, status, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                dispute.id,
                dispute.transaction_id,
                dispute.reason,
                dispute.status.as_str(),
                dispute.created_at,
            ],
        )?;
        db_tx.commit()?;

        tracing::info!("Opened dispute {} on transaction {}", dispute.id, transaction_id);
        Ok((dispute, tx))
    }

    pub fn get_dispute(&self, dispute_id: &str) -> EscrowResult<Dispute> {
        let conn = self.db_manager.get_conn()?;
        load_dispute(&conn, dispute_id)?.ok_or_else(|| EscrowError::dispute_not_found(dispute_id))
    }

    pub fn disputes_for_transaction(&self, transaction_id: &str) -> EscrowResult<Vec<Dispute>> {
        let conn = self.db_manager.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM disputes WHERE tx_id = ? ORDER BY created_at, rowid",
            DISPUTE_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![transaction_id], dispute_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().collect()
    }

    /// Idempotent: resolving an already resolved dispute succeeds.
    pub fn resolve_dispute(&self, dispute_id: &str) -> EscrowResult<Dispute> {
        let mut conn = self.db_manager.get_conn()?;
        let db_tx = conn.transaction()?;

        let mut dispute = load_dispute(&db_tx, dispute_id)?
            .ok_or_else(|| EscrowError::dispute_not_found(dispute_id))?;

        if dispute.status == DisputeStatus::Resolved {
            return Ok(dispute);
        }

        db_tx.execute(
            "UPDATE disputes SET status = ? WHERE id = ?",
            params![DisputeStatus::Resolved.as_str(), dispute_id],
        )?;
        db_tx.commit()?;

        tracing::info!("Resolved dispute {}", dispute_id);
        dispute.status = DisputeStatus::Resolved;
        Ok(dispute)
    }
}

fn load_transaction(conn: &Connection, id: &str) -> EscrowResult<Option<Transaction>> {
    conn.query_row(
        &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
        params![id],
        transaction_from_row,
    )
    .optional()?
    .transpose()
}

fn load_dispute(conn: &Connection, id: &str) -> EscrowResult<Option<Dispute>> {
    conn.query_row(
        &format!("SELECT {} FROM disputes WHERE id = ?", DISPUTE_COLUMNS),
        params![id],
        dispute_from_row,
    )
    .optional()?
    .transpose()
}

// Enum columns are parsed outside of rusqlite so a bad value surfaces as a
// store error instead of a row-mapping panic.
fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<EscrowResult<Transaction>> {
    let role: String = row.get(2)?;
    let coin: String = row.get(3)?;
    let status: String = row.get(6)?;

    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let wallet_address: String = row.get(4)?;
    let tx_hash: Option<String> = row.get(5)?;
    let created_at: i64 = row.get(7)?;

    let parsed = role
        .parse::<EscrowRole>()
        .map_err(|_| EscrowError::StoreUnavailable(format!("corrupt role: {}", role)))
        .and_then(|role| {
            let coin = coin
                .parse::<CurrencyCode>()
                .map_err(|_| EscrowError::StoreUnavailable(format!("corrupt coin: {}", coin)))?;
            Ok(Transaction {
                id,
                user_id,
                role,
                coin,
                wallet_address,
                tx_hash,
                status: status.parse()?,
                created_at,
            })
        });

    Ok(parsed)
}

fn dispute_from_row(row: &Row<'_>) -> rusqlite::Result<EscrowResult<Dispute>> {
    let status: String = row.get(3)?;
    let id: String = row.get(0)?;
    let transaction_id: String = row.get(1)?;
    let reason: String = row.get(2)?;
    let created_at: i64 = row.get(4)?;

    Ok(status.parse().map(|status| Dispute {
        id,
        transaction_id,
        reason,
        status,
        created_at,
    }))
}

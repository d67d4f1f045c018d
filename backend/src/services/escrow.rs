use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{EscrowError, EscrowResult};
use crate::models::{
    CurrencyCode, Dispute, EscrowRole, Transaction, TransactionStatus, VerificationOutcome,
};
use crate::services::chain_verifier::{is_valid_tx_hash, ChainVerifier};
use crate::services::notifier::OperatorNotifier;
use crate::services::wallet_pool::WalletPool;
use crate::storage::LedgerStore;

#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStatus {
    pub coin: CurrencyCode,
    pub pool_size: usize,
    pub cursor: usize,
}

/// Drives one escrow session from coin selection to confirmation or dispute.
///
/// This is the only caller of `WalletPool::next_address` and the only
/// writer of ledger records.
pub struct EscrowService {
    wallet_pool: Arc<WalletPool>,
    ledger: Arc<LedgerStore>,
    verifier: Arc<dyn ChainVerifier>,
    notifier: Arc<dyn OperatorNotifier>,
    verify_cooldown: Duration,
    last_attempts: Mutex<HashMap<String, Instant>>,
}

impl EscrowService {
    pub fn new(
        wallet_pool: Arc<WalletPool>,
        ledger: Arc<LedgerStore>,
        verifier: Arc<dyn ChainVerifier>,
        notifier: Arc<dyn OperatorNotifier>,
        verify_cooldown: Duration,
    ) -> Self {
        Self {
            wallet_pool,
            ledger,
            verifier,
            notifier,
            verify_cooldown,
            last_attempts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn begin_escrow(
        &self,
        user_id: &str,
        coin: CurrencyCode,
        role: EscrowRole,
    ) -> EscrowResult<Transaction> {
        let wallet_address = self.wallet_pool.next_address(coin)?;
        let tx = self
            .ledger
            .create_transaction(user_id, role, coin, &wallet_address)?;

        self.notify_operator(&format!(
            "{} {} opened escrow {}. {} deposit wallet: {}",
            capitalize(role.as_str()),
            user_id,
            tx.id,
            coin,
            wallet_address
        ))
        .await;

        Ok(tx)
    }

    /// Attaches the reported hash and asks the indexer about it once.
    ///
    /// Pending and VerificationFailed leave the record awaiting confirmation,
    /// so the user can submit the same hash again later.
    pub async fn submit_tx_hash(
        &self,
        transaction_id: &str,
        tx_hash: &str,
    ) -> EscrowResult<VerificationOutcome> {
        let tx_hash = tx_hash.trim();
        if tx_hash.is_empty() {
            return Err(EscrowError::EmptyTxHash);
        }
        if !is_valid_tx_hash(tx_hash) {
            return Err(EscrowError::InvalidInput(format!(
                "transaction hash must be hex: {}",
                tx_hash
            )));
        }

        let tx = self.ledger.attach_tx_hash(transaction_id, tx_hash)?;
        match tx.status {
            TransactionStatus::Confirmed => return Ok(VerificationOutcome::Confirmed),
            // closed by the operator, the indexer can no longer change it
            TransactionStatus::Failed => {
                return Err(EscrowError::InvalidTransition {
                    from: TransactionStatus::Failed,
                    to: TransactionStatus::Confirmed,
                })
            }
            TransactionStatus::Pending | TransactionStatus::AwaitingConfirmation => {}
        }

        self.check_cooldown(transaction_id)?;

        let outcome = self.verifier.check_status(tx.coin, tx_hash).await;

        if outcome == VerificationOutcome::Confirmed {
            match self.ledger.mark_status(transaction_id, TransactionStatus::Confirmed) {
                Ok(_) => {}
                // a concurrent submission confirmed it first
                Err(EscrowError::InvalidTransition {
                    from: TransactionStatus::Confirmed,
                    ..
                }) => {}
                Err(e) => return Err(e),
            }
            self.last_attempts.lock().remove(transaction_id);
        }

        tracing::info!(
            "Verification of transaction {} ({} {}) -> {:?}",
            transaction_id, tx.coin, tx_hash, outcome
        );
        Ok(outcome)
    }

    pub async fn raise_dispute(&self, transaction_id: &str, reason: &str) -> EscrowResult<Dispute> {
        let (dispute, tx) = self.ledger.create_dispute(transaction_id, reason.trim())?;

        let reason_text = if dispute.reason.is_empty() {
            "no reason given"
        } else {
            dispute.reason.as_str()
        };
        self.notify_operator(&format!(
            "DISPUTE {} raised by user {} on escrow {} ({} to {}): {}",
            dispute.id, tx.user_id, tx.id, tx.coin, tx.wallet_address, reason_text
        ))
        .await;

        Ok(dispute)
    }

    /// Operator action.
    pub fn resolve_dispute(&self, dispute_id: &str) -> EscrowResult<Dispute> {
        self.ledger.resolve_dispute(dispute_id)
    }

    /// Operator action; the only way a record reaches `failed`.
    pub fn fail_transaction(&self, transaction_id: &str) -> EscrowResult<Transaction> {
        let tx = self
            .ledger
            .mark_status(transaction_id, TransactionStatus::Failed)?;
        self.last_attempts.lock().remove(transaction_id);
        Ok(tx)
    }

    pub fn transaction(&self, transaction_id: &str) -> EscrowResult<Transaction> {
        self.ledger.get_transaction(transaction_id)
    }

    pub fn history(&self, user_id: &str) -> EscrowResult<Vec<Transaction>> {
        self.ledger.transactions_for_user(user_id)
    }

    pub fn pool_status(&self, coin: CurrencyCode) -> EscrowResult<PoolStatus> {
        Ok(PoolStatus {
            coin,
            pool_size: self.wallet_pool.sequence_length(coin)?,
            cursor: self.wallet_pool.cursor(coin)?,
        })
    }

    fn check_cooldown(&self, transaction_id: &str) -> EscrowResult<()> {
        if self.verify_cooldown.is_zero() {
            return Ok(());
        }

        let mut attempts = self.last_attempts.lock();
        let now = Instant::now();
        attempts.retain(|_, last| now.duration_since(*last) < self.verify_cooldown);
        if let Some(last) = attempts.get(transaction_id) {
            let elapsed = now.duration_since(*last);
            if elapsed < self.verify_cooldown {
                let remaining = self.verify_cooldown - elapsed;
                return Err(EscrowError::RateLimited {
                    retry_after_secs: remaining.as_secs().max(1),
                });
            }
        }
        attempts.insert(transaction_id.to_string(), now);
        Ok(())
    }

    async fn notify_operator(&self, text: &str) {
        if let Err(e) = self.notifier.notify(text).await {
            tracing::warn!("Failed to notify operator: {}", e);
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

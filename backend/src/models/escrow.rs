use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EscrowError;
use crate::models::CurrencyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowRole {
    Buyer,
    Seller,
}

impl EscrowRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowRole::Buyer => "buyer",
            EscrowRole::Seller => "seller",
        }
    }
}

impl fmt::Display for EscrowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscrowRole {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(EscrowRole::Buyer),
            "seller" => Ok(EscrowRole::Seller),
            other => Err(EscrowError::InvalidInput(format!("unknown role: {}", other))),
        }
    }
}

/// Lifecycle of a deposit attempt.
///
/// pending -> awaiting_confirmation -> {confirmed, failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::AwaitingConfirmation => "awaiting_confirmation",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::AwaitingConfirmation)
                | (TransactionStatus::AwaitingConfirmation, TransactionStatus::Confirmed)
                | (TransactionStatus::AwaitingConfirmation, TransactionStatus::Failed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "awaiting_confirmation" => Ok(TransactionStatus::AwaitingConfirmation),
            "confirmed" => Ok(TransactionStatus::Confirmed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(EscrowError::StoreUnavailable(format!(
                "corrupt transaction status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub role: EscrowRole,
    pub coin: CurrencyCode,
    pub wallet_address: String,
    pub tx_hash: Option<String>,
    pub status: TransactionStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Resolved,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for DisputeStatus {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(DisputeStatus::Open),
            "resolved" => Ok(DisputeStatus::Resolved),
            other => Err(EscrowError::StoreUnavailable(format!(
                "corrupt dispute status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub transaction_id: String,
    pub reason: String,
    pub status: DisputeStatus,
    pub created_at: i64,
}

/// Result of a single indexer lookup.
///
/// `VerificationFailed` means the indexer could not be asked or gave an
/// unusable answer; it says nothing about the deposit itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Confirmed,
    Pending,
    VerificationFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_forward_transitions_are_allowed() {
        use TransactionStatus::*;
        let all = [Pending, AwaitingConfirmation, Confirmed, Failed];
        let allowed = [
            (Pending, AwaitingConfirmation),
            (AwaitingConfirmation, Confirmed),
            (AwaitingConfirmation, Failed),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::AwaitingConfirmation,
            TransactionStatus::Confirmed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>().unwrap(), status);
        }
        assert!("settled".parse::<TransactionStatus>().is_err());
    }
}

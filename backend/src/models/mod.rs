pub mod currency;
pub mod escrow;

pub use currency::CurrencyCode;
pub use escrow::{
    Dispute, DisputeStatus, EscrowRole, Transaction, TransactionStatus, VerificationOutcome,
};

pub mod chain_verifier;
pub mod escrow;
pub mod notifier;
pub mod wallet_pool;

pub use chain_verifier::{ChainVerifier, ExplorerVerifier};
pub use escrow::EscrowService;
pub use notifier::{LogNotifier, OperatorNotifier, TelegramNotifier};
pub use wallet_pool::WalletPool;

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{EscrowError, EscrowResult};
use crate::models::CurrencyCode;
use crate::services::chain_verifier::{IndexerConfig, IndexerKind};

const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_VERIFY_COOLDOWN_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: String,
    pub port: u16,
    pub bot_token: Option<String>,
    pub admin_chat_id: Option<String>,
    pub admin_api_token: Option<String>,
    pub wallet_pool: HashMap<CurrencyCode, Vec<String>>,
    pub indexers: HashMap<CurrencyCode, IndexerConfig>,
    pub verify_timeout: Duration,
    pub verify_cooldown: Duration,
}

impl AppConfig {
    pub fn from_env() -> EscrowResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> EscrowResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| EscrowError::InvalidConfig(format!("PORT must be a number, got {}", port)))?,
            None => 3000,
        };

        let mut wallet_pool = HashMap::new();
        for coin in CurrencyCode::ALL {
            if let Some(list) = get(&format!("WALLETS_{}", coin)) {
                wallet_pool.insert(coin, parse_address_list(&list));
            }
        }
        if wallet_pool.is_empty() {
            return Err(EscrowError::InvalidConfig(
                "no wallet pool configured, set WALLETS_<COIN>".to_string(),
            ));
        }

        let etherscan_key = get("ETHERSCAN_API_KEY");
        let tronscan_key = get("TRONSCAN_API_KEY");
        let mut indexers = HashMap::new();
        for coin in CurrencyCode::ALL {
            let (default_kind, default_url) = default_indexer(coin);

            let kind = match get(&format!("INDEXER_{}_KIND", coin)) {
                Some(kind) => kind
                    .parse::<IndexerKind>()
                    .map_err(|e| EscrowError::InvalidConfig(e.to_string()))?,
                None => default_kind,
            };
            let base_url = get(&format!("INDEXER_{}_URL", coin)).unwrap_or_else(|| default_url.to_string());
            let api_key = get(&format!("INDEXER_{}_API_KEY", coin)).or_else(|| match kind {
                IndexerKind::Etherscan => etherscan_key.clone(),
                IndexerKind::Tron => tronscan_key.clone(),
                IndexerKind::Esplora => None,
            });

            indexers.insert(coin, IndexerConfig { kind, base_url, api_key });
        }

        let verify_timeout = parse_secs(
            get("VERIFY_TIMEOUT_SECS"),
            DEFAULT_VERIFY_TIMEOUT_SECS,
            "VERIFY_TIMEOUT_SECS",
        )?;
        if verify_timeout == 0 {
            return Err(EscrowError::InvalidConfig(
                "VERIFY_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            data_dir: get("DATA_DIR").unwrap_or_else(|| "./data".to_string()),
            port,
            bot_token: get("BOT_TOKEN"),
            admin_chat_id: get("ADMIN_ID"),
            admin_api_token: get("ADMIN_API_TOKEN"),
            wallet_pool,
            indexers,
            verify_timeout: Duration::from_secs(verify_timeout),
            verify_cooldown: Duration::from_secs(parse_secs(
                get("VERIFY_COOLDOWN_SECS"),
                DEFAULT_VERIFY_COOLDOWN_SECS,
                "VERIFY_COOLDOWN_SECS",
            )?),
        })
    }

    pub fn db_path(&self) -> String {
        format!("{}/escrow.db", self.data_dir)
    }
}

fn default_indexer(coin: CurrencyCode) -> (IndexerKind, &'static str) {
    match coin {
        CurrencyCode::Btc => (IndexerKind::Esplora, "https://blockstream.info/api"),
        CurrencyCode::Ltc => (IndexerKind::Esplora, "https://litecoinspace.org/api"),
        CurrencyCode::Eth => (IndexerKind::Etherscan, "https://api.etherscan.io/api"),
        // the pool holds TRC20 addresses
        CurrencyCode::Usdt => (IndexerKind::Tron, "https://apilist.tronscanapi.com/api"),
    }
}

fn parse_address_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_secs(value: Option<String>, default: u64, key: &str) -> EscrowResult<u64> {
    match value {
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| EscrowError::InvalidConfig(format!("{} must be a number of seconds, got {}", key, v))),
        None => Ok(default),
    }
}

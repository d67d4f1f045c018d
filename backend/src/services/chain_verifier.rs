use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{CurrencyCode, VerificationOutcome};

/// Looks up whether a reported chain transaction has been accepted.
#[async_trait]
pub trait ChainVerifier: Send + Sync {
    async fn check_status(&self, coin: CurrencyCode, tx_hash: &str) -> VerificationOutcome;
}

/// Response shape spoken by an indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerKind {
    /// `?module=transaction&action=gettxreceiptstatus` style explorers.
    Etherscan,
    /// Esplora REST (`/tx/{txid}/status`).
    Esplora,
    /// TronScan `transaction-info?hash=` (TRC20 deposits).
    Tron,
}

impl FromStr for IndexerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "etherscan" => Ok(IndexerKind::Etherscan),
            "esplora" => Ok(IndexerKind::Esplora),
            "tron" | "tronscan" => Ok(IndexerKind::Tron),
            other => Err(anyhow!("unknown indexer kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    pub kind: IndexerKind,
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Chain verifier backed by public block explorer HTTP APIs.
pub struct ExplorerVerifier {
    http_client: reqwest::Client,
    indexers: HashMap<CurrencyCode, IndexerConfig>,
    timeout: Duration,
}

impl ExplorerVerifier {
    pub fn new(indexers: HashMap<CurrencyCode, IndexerConfig>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            indexers,
            timeout,
        })
    }

    async fn query(&self, indexer: &IndexerConfig, tx_hash: &str) -> Result<VerificationOutcome> {
        let request = match indexer.kind {
            IndexerKind::Etherscan => self.http_client.get(&indexer.base_url).query(&[
                ("module", "transaction"),
                ("action", "gettxreceiptstatus"),
                ("txhash", tx_hash),
                ("apikey", indexer.api_key.as_deref().unwrap_or_default()),
            ]),
            IndexerKind::Esplora => {
                let url = format!("{}/tx/{}/status", indexer.base_url.trim_end_matches('/'), tx_hash);
                self.http_client.get(&url)
            }
            IndexerKind::Tron => {
                let url = format!("{}/transaction-info", indexer.base_url.trim_end_matches('/'));
                let request = self.http_client.get(&url).query(&[("hash", tx_hash)]);
                match indexer.api_key.as_deref() {
                    Some(key) => request.header("TRON-PRO-API-KEY", key),
                    None => request,
                }
            }
        };

        let response = request.send().await?.error_for_status()?;
        let body: Value = response.json().await?;

        match indexer.kind {
            IndexerKind::Etherscan => parse_etherscan_status(&body),
            IndexerKind::Esplora => parse_esplora_status(&body),
            IndexerKind::Tron => parse_tronscan_status(&body),
        }
    }
}

#[async_trait]
impl ChainVerifier for ExplorerVerifier {
    async fn check_status(&self, coin: CurrencyCode, tx_hash: &str) -> VerificationOutcome {
        if !is_valid_tx_hash(tx_hash) {
            tracing::warn!("Refusing to query {} indexer with malformed hash {:?}", coin, tx_hash);
            return VerificationOutcome::VerificationFailed;
        }

        let Some(indexer) = self.indexers.get(&coin) else {
            tracing::warn!("No indexer configured for {}", coin);
            return VerificationOutcome::VerificationFailed;
        };

        tracing::debug!("Checking {} tx {} via {}", coin, tx_hash, indexer.base_url);

        match tokio::time::timeout(self.timeout, self.query(indexer, tx_hash)).await {
            Ok(Ok(outcome)) => {
                tracing::info!("Indexer reports {} tx {} as {:?}", coin, tx_hash, outcome);
                outcome
            }
            Ok(Err(e)) => {
                tracing::warn!("Verification of {} tx {} failed: {}", coin, tx_hash, e);
                VerificationOutcome::VerificationFailed
            }
            Err(_) => {
                tracing::warn!(
                    "Verification of {} tx {} timed out after {:?}",
                    coin, tx_hash, self.timeout
                );
                VerificationOutcome::VerificationFailed
            }
        }
    }
}

/// Hex transaction id, optionally `0x`-prefixed. Anything else would end up
/// in an indexer URL path unescaped.
pub fn is_valid_tx_hash(tx_hash: &str) -> bool {
    let digits = tx_hash
        .strip_prefix("0x")
        .or_else(|| tx_hash.strip_prefix("0X"))
        .unwrap_or(tx_hash);
    !digits.is_empty() && digits.len() <= 128 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

// {"status":"1","message":"OK","result":{"status":"1"}}
pub fn parse_etherscan_status(body: &Value) -> Result<VerificationOutcome> {
    let status = body
        .get("result")
        .and_then(|result| result.get("status"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("unexpected indexer response: {}", body))?;

    Ok(match status {
        "1" => VerificationOutcome::Confirmed,
        _ => VerificationOutcome::Pending,
    })
}

// {"confirmed":true,"block_height":...,"block_hash":"...","block_time":...}
pub fn parse_esplora_status(body: &Value) -> Result<VerificationOutcome> {
    let confirmed = body
        .get("confirmed")
        .and_then(Value::as_bool)
        .ok_or_else(|| anyhow!("unexpected indexer response: {}", body))?;

    Ok(if confirmed {
        VerificationOutcome::Confirmed
    } else {
        VerificationOutcome::Pending
    })
}

// {"hash":"...","confirmed":true,"contractRet":"SUCCESS",...}; unknown hashes come back as {}
pub fn parse_tronscan_status(body: &Value) -> Result<VerificationOutcome> {
    let contract_ret = body
        .get("contractRet")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("unexpected indexer response: {}", body))?;
    let confirmed = body.get("confirmed").and_then(Value::as_bool).unwrap_or(false);

    Ok(if contract_ret == "SUCCESS" && confirmed {
        VerificationOutcome::Confirmed
    } else {
        VerificationOutcome::Pending
    })
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EscrowError;

/// Currencies the escrow desk accepts deposits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    Btc,
    Eth,
    Usdt,
    Ltc,
}

impl CurrencyCode {
    pub const ALL: [CurrencyCode; 4] = [
        CurrencyCode::Btc,
        CurrencyCode::Eth,
        CurrencyCode::Usdt,
        CurrencyCode::Ltc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyCode::Btc => "BTC",
            CurrencyCode::Eth => "ETH",
            CurrencyCode::Usdt => "USDT",
            CurrencyCode::Ltc => "LTC",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Ok(CurrencyCode::Btc),
            "ETH" => Ok(CurrencyCode::Eth),
            "USDT" => Ok(CurrencyCode::Usdt),
            "LTC" => Ok(CurrencyCode::Ltc),
            _ => Err(EscrowError::UnsupportedCurrency(s.to_string())),
        }
    }
}

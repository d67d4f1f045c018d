use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{EscrowError, EscrowResult};
use crate::models::CurrencyCode;

/// Receiving addresses for one currency plus its rotation cursor.
struct AddressRing {
    addresses: Vec<String>,
    cursor: Mutex<usize>,
}

/// Per-currency round-robin over the configured deposit addresses.
///
/// Each currency has its own lock, so draws for BTC never wait on draws for
/// ETH. Contents are fixed at construction.
pub struct WalletPool {
    rings: HashMap<CurrencyCode, AddressRing>,
}

impl WalletPool {
    pub fn new(pool: HashMap<CurrencyCode, Vec<String>>) -> EscrowResult<Self> {
        let mut rings = HashMap::with_capacity(pool.len());

        for (coin, addresses) in pool {
            if addresses.is_empty() {
                return Err(EscrowError::InvalidConfig(format!(
                    "wallet pool for {} is empty",
                    coin
                )));
            }

            tracing::info!("Loaded {} deposit addresses for {}", addresses.len(), coin);
            rings.insert(
                coin,
                AddressRing {
                    addresses,
                    cursor: Mutex::new(0),
                },
            );
        }

        Ok(Self { rings })
    }

    /// Hands out the address under the cursor and advances it by one.
    pub fn next_address(&self, coin: CurrencyCode) -> EscrowResult<String> {
        let ring = self.ring(coin)?;

        let mut cursor = ring.cursor.lock();
        let address = ring.addresses[*cursor].clone();
        *cursor = (*cursor + 1) % ring.addresses.len();

        Ok(address)
    }

    pub fn sequence_length(&self, coin: CurrencyCode) -> EscrowResult<usize> {
        Ok(self.ring(coin)?.addresses.len())
    }

    pub fn cursor(&self, coin: CurrencyCode) -> EscrowResult<usize> {
        Ok(*self.ring(coin)?.cursor.lock())
    }

    pub fn currencies(&self) -> Vec<CurrencyCode> {
        let mut coins: Vec<_> = self.rings.keys().copied().collect();
        coins.sort();
        coins
    }

    fn ring(&self, coin: CurrencyCode) -> EscrowResult<&AddressRing> {
        self.rings
            .get(&coin)
            .ok_or_else(|| EscrowError::UnsupportedCurrency(coin.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn btc_addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("bc1q-test-{}", i)).collect()
    }

    fn pool_with(coin: CurrencyCode, addresses: Vec<String>) -> WalletPool {
        WalletPool::new(HashMap::from([(coin, addresses)])).unwrap()
    }

    #[test]
    fn test_draws_follow_configured_order_and_wrap() {
        let addresses = btc_addresses(5);
        let pool = pool_with(CurrencyCode::Btc, addresses.clone());

        let drawn: Vec<_> = (0..5)
            .map(|_| pool.next_address(CurrencyCode::Btc).unwrap())
            .collect();
        assert_eq!(drawn, addresses);

        assert_eq!(pool.cursor(CurrencyCode::Btc).unwrap(), 0);
        assert_eq!(pool.next_address(CurrencyCode::Btc).unwrap(), drawn[0]);
        assert_eq!(pool.cursor(CurrencyCode::Btc).unwrap(), 1);
    }

    #[test]
    fn test_currencies_rotate_independently() {
        let pool = WalletPool::new(HashMap::from([
            (CurrencyCode::Btc, btc_addresses(3)),
            (CurrencyCode::Eth, vec!["0xa".to_string(), "0xb".to_string()]),
        ]))
        .unwrap();

        pool.next_address(CurrencyCode::Btc).unwrap();
        pool.next_address(CurrencyCode::Btc).unwrap();
        assert_eq!(pool.next_address(CurrencyCode::Eth).unwrap(), "0xa");
        assert_eq!(pool.cursor(CurrencyCode::Btc).unwrap(), 2);
        assert_eq!(pool.sequence_length(CurrencyCode::Eth).unwrap(), 2);
        assert_eq!(pool.currencies(), vec![CurrencyCode::Btc, CurrencyCode::Eth]);
    }

    #[test]
    fn test_unconfigured_currency_is_rejected() {
        let pool = pool_with(CurrencyCode::Btc, btc_addresses(2));

        assert!(matches!(
            pool.next_address(CurrencyCode::Ltc),
            Err(EscrowError::UnsupportedCurrency(_))
        ));
        assert!(matches!(
            pool.sequence_length(CurrencyCode::Ltc),
            Err(EscrowError::UnsupportedCurrency(_))
        ));
    }

    #[test]
    fn test_empty_sequence_is_a_config_error() {
        let result = WalletPool::new(HashMap::from([(CurrencyCode::Usdt, Vec::new())]));
        assert!(matches!(result, Err(EscrowError::InvalidConfig(_))));
    }

    #[test]
    fn test_concurrent_draws_complete_full_cycles() {
        const POOL_SIZE: usize = 5;
        const THREADS: usize = 8;
        const CYCLES_PER_THREAD: usize = 25;

        let pool = Arc::new(pool_with(CurrencyCode::Btc, btc_addresses(POOL_SIZE)));
        let log = Arc::new(Mutex::new(Vec::new()));

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                let pool = pool.clone();
                let log = log.clone();
                scope.spawn(move || {
                    for _ in 0..POOL_SIZE * CYCLES_PER_THREAD {
                        // record under the same lock order the draw happened in
                        let mut log = log.lock();
                        log.push(pool.next_address(CurrencyCode::Btc).unwrap());
                    }
                });
            }
        });

        let log = log.lock();
        assert_eq!(log.len(), THREADS * POOL_SIZE * CYCLES_PER_THREAD);
        for cycle in log.chunks(POOL_SIZE) {
            let distinct: HashSet<_> = cycle.iter().collect();
            assert_eq!(distinct.len(), POOL_SIZE);
        }
    }

    #[test]
    fn test_concurrent_draws_hand_out_each_address_equally() {
        const POOL_SIZE: usize = 4;
        const DRAWS_PER_THREAD: usize = 100;
        const THREADS: usize = 6;

        let pool = Arc::new(pool_with(CurrencyCode::Btc, btc_addresses(POOL_SIZE)));

        let drawn: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let pool = pool.clone();
                    scope.spawn(move || {
                        (0..DRAWS_PER_THREAD)
                            .map(|_| pool.next_address(CurrencyCode::Btc).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        let mut counts: HashMap<String, usize> = HashMap::new();
        for address in drawn {
            *counts.entry(address).or_default() += 1;
        }
        assert_eq!(counts.len(), POOL_SIZE);
        for count in counts.values() {
            assert_eq!(*count, THREADS * DRAWS_PER_THREAD / POOL_SIZE);
        }
        assert_eq!(pool.cursor(CurrencyCode::Btc).unwrap(), 0);
    }
}

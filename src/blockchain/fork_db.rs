//! ForkDB - REVM read-only database serving upstream state at a pinned block
//!
//! Sits underneath a `CacheDB`, which keeps every fetched value and every
//! simulated write, so this layer never caches on its own.
use std::sync::Arc;
use ethers::prelude::*;
use revm::primitives::{
    AccountInfo, Address as RevmAddress, Bytecode, Bytes as RevmBytes,
    B256, U256 as RevmU256, KECCAK_EMPTY,
};
use revm::db::DatabaseRef;
use crate::blockchain::BlockchainClient;
use crate::utils::{FeeForkError, Result};

/// Upstream state as of one block height
pub struct ForkDB {
    /// RPC client for fetching chain state
    client: Arc<BlockchainClient>,

    /// Height every query is pinned to
    height: u64,

    /// Runtime handle for executing async RPC calls synchronously
    runtime_handle: tokio::runtime::Handle,
}

impl ForkDB {
    /// Create a database pinned at `height`.
    ///
    /// Must be called inside a tokio runtime. Lookups block on that runtime,
    /// so EVM execution over this database has to run in `block_in_place`.
    pub fn new(client: Arc<BlockchainClient>, height: u64) -> Result<Self> {
        let runtime_handle = tokio::runtime::Handle::try_current()
            .map_err(|_| FeeForkError::SimulationError(
                "No tokio runtime found. ForkDB requires async runtime.".into()
            ))?;

        Ok(Self {
            client,
            height,
            runtime_handle,
        })
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    fn block_id(&self) -> Option<BlockId> {
        Some(BlockId::Number(BlockNumber::Number(self.height.into())))
    }

    /// Fetch account info from RPC (blocking call)
    fn fetch_account(&self, address: RevmAddress) -> Result<AccountInfo> {
        let eth_address = to_ethers_address(address);
        let block = self.block_id();
        let provider = &self.client.provider;

        let (balance, nonce, code) = self.runtime_handle.block_on(async {
            tokio::try_join!(
                provider.get_balance(eth_address, block),
                provider.get_transaction_count(eth_address, block),
                provider.get_code(eth_address, block),
            )
        })?;

        let (code_hash, bytecode) = if code.is_empty() {
            (KECCAK_EMPTY, None)
        } else {
            let bytecode = Bytecode::new_raw(RevmBytes::from(code.to_vec()));
            (bytecode.hash_slow(), Some(bytecode))
        };

        Ok(AccountInfo {
            balance: RevmU256::from_limbs(balance.0),
            nonce: nonce.as_u64(),
            code_hash,
            code: bytecode,
        })
    }
}

impl DatabaseRef for ForkDB {
    type Error = FeeForkError;

    fn basic(&self, address: RevmAddress) -> Result<Option<AccountInfo>> {
        tracing::debug!("Fetching account {:?} at block {}", address, self.height);
        self.fetch_account(address).map(Some)
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytecode> {
        // Code always arrives together with its account in `basic`, and the
        // cache above keeps it, so a miss here means unknown code.
        if code_hash != KECCAK_EMPTY {
            tracing::warn!("Code hash {:?} not found in cache", code_hash);
        }
        Ok(Bytecode::new())
    }

    fn storage(&self, address: RevmAddress, index: RevmU256) -> Result<RevmU256> {
        tracing::trace!("Fetching storage {:?}[{:?}] at block {}", address, index, self.height);

        let slot = H256::from(index.to_be_bytes::<32>());
        let value = self.runtime_handle.block_on(
            self.client.provider.get_storage_at(to_ethers_address(address), slot, self.block_id())
        )?;

        Ok(RevmU256::from_be_bytes(value.0))
    }

    fn block_hash(&self, number: RevmU256) -> Result<B256> {
        let block_number = number.to::<u64>();

        let block = self.runtime_handle.block_on(
            self.client.provider.get_block(block_number)
        )?;

        let hash = block
            .and_then(|b| b.hash)
            .unwrap_or_default();

        Ok(B256::from_slice(hash.as_bytes()))
    }
}

/// Convert ethers Address to REVM Address
pub fn to_revm_address(addr: Address) -> RevmAddress {
    RevmAddress::from_slice(addr.as_bytes())
}

/// Convert REVM Address to ethers Address
pub fn to_ethers_address(addr: RevmAddress) -> Address {
    Address::from_slice(addr.as_slice())
}

/// Convert ethers U256 to REVM U256
pub fn to_revm_u256(value: U256) -> RevmU256 {
    RevmU256::from_limbs(value.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_conversion() {
        let pair: Address = "0x50497E7181eB9e8CcD70a9c44FB997742149482a".parse().unwrap();
        let revm = to_revm_address(pair);

        assert_eq!(revm.as_slice(), pair.as_bytes());
        assert_eq!(to_ethers_address(revm), pair);
    }

    #[test]
    fn test_is_a_cache_backing_store() {
        fn backing<DB: DatabaseRef<Error = FeeForkError>>() {}
        backing::<ForkDB>();

        // Usable as the read-through layer of a session.
        fn session_over<DB: DatabaseRef>(_: Option<crate::blockchain::ForkSession<DB>>)
        where
            DB::Error: std::fmt::Debug,
        {
        }
        session_over::<ForkDB>(None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stalled_fetch_fails_inside_evm_context() {
        use crate::blockchain::client::{http_provider, tests::silent_node};
        use std::time::{Duration, Instant};

        let (url, node) = silent_node().await;
        let provider = http_provider(&url, Some(Duration::from_millis(200))).unwrap();
        let client = Arc::new(BlockchainClient::with_provider(provider, &url, 592));
        let db = ForkDB::new(client, 990).unwrap();

        // Same path the EVM takes: a synchronous lookup on a worker thread.
        let started = Instant::now();
        let result = tokio::task::block_in_place(|| db.basic(RevmAddress::ZERO));

        assert!(matches!(result, Err(FeeForkError::RpcError(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        node.abort();
    }

    #[test]
    fn test_u256_conversion() {
        let value = U256::from_dec_str("262144000000000000000000").unwrap();
        assert_eq!(to_revm_u256(value).to_string(), "262144000000000000000000");
    }
}

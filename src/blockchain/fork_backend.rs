//! Simulation backend over a REVM fork of an upstream chain.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use async_trait::async_trait;
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::types::{Address, U256};
use crate::blockchain::{BlockchainClient, ForkDB, ForkSession};
use crate::contracts::erc20::{BalanceOfCall, TransferCall};
use crate::contracts::SwapBackCall;
use crate::core::SimulationBackend;
use crate::models::Impersonated;
use crate::utils::{FeeForkError, Result};

pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ForkOptions {
    /// Gas limit for every simulated transaction
    pub gas_limit: u64,
    /// Call used for the sell leg
    pub swap_back: SwapBackCall,
    /// Bound for each upstream HTTP request, including state fetched mid-execution
    pub request_timeout: Option<Duration>,
}

impl Default for ForkOptions {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            swap_back: SwapBackCall::default(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// Forked chain the fee estimator runs against.
///
/// Needs a multi-threaded tokio runtime: state is fetched lazily from the
/// upstream node while the EVM executes.
pub struct ForkBackend {
    client: RwLock<Arc<BlockchainClient>>,
    session: Mutex<ForkSession<ForkDB>>,
    options: ForkOptions,
}

impl ForkBackend {
    /// Connect to `rpc_url` and fork at `height`.
    pub async fn connect(rpc_url: &str, height: u64, options: ForkOptions) -> Result<Self> {
        let client = Arc::new(BlockchainClient::with_timeout(rpc_url, options.request_timeout).await?);
        let session = Self::open_session(client.clone(), height, options.gas_limit).await?;

        tracing::info!(
            "🍴 Forked {} at block {}",
            client.chain_name(),
            height
        );

        Ok(Self {
            client: RwLock::new(client),
            session: Mutex::new(session),
            options,
        })
    }

    async fn open_session(
        client: Arc<BlockchainClient>,
        height: u64,
        gas_limit: u64,
    ) -> Result<ForkSession<ForkDB>> {
        let block = client.block_context(height).await?;
        let chain_id = client.chain_id();
        let db = ForkDB::new(client, height)?;
        Ok(ForkSession::new(db, block, chain_id, gas_limit))
    }

    /// Height the current session is forked at
    pub fn fork_height(&self) -> Result<u64> {
        let session = self.session.lock().map_err(|_| poisoned())?;
        Ok(session.block().number)
    }

    pub fn client(&self) -> Result<Arc<BlockchainClient>> {
        let client = self.client.read().map_err(|_| poisoned())?;
        Ok(client.clone())
    }

    /// Run `f` on the session. Upstream lookups block, so leave the async
    /// worker for the duration.
    fn with_session<T>(&self, f: impl FnOnce(&mut ForkSession<ForkDB>) -> Result<T>) -> Result<T> {
        tokio::task::block_in_place(|| {
            let mut session = self.session.lock().map_err(|_| poisoned())?;
            f(&mut session)
        })
    }
}

fn poisoned() -> FeeForkError {
    FeeForkError::SimulationError("Fork session lock poisoned".into())
}

#[async_trait]
impl SimulationBackend for ForkBackend {
    fn name(&self) -> &'static str {
        "revm-fork"
    }

    async fn impersonate(&self, address: Address) -> Result<Impersonated> {
        // REVM accepts any caller once EIP-3607 is off.
        tracing::debug!("Impersonating {:?}", address);
        Ok(Impersonated::new(address))
    }

    async fn set_native_balance(&self, address: Address, amount: U256) -> Result<()> {
        self.with_session(|session| session.set_balance(address, amount))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let calldata = BalanceOfCall { account: owner }.encode();
        let output = self.with_session(|session| session.call(owner, token, calldata))?;

        U256::decode(&output).map_err(|e| {
            FeeForkError::SimulationError(format!("balanceOf({:?}) on {:?} returned garbage: {}", owner, token, e))
        })
    }

    async fn transfer_token(
        &self,
        token: Address,
        signer: &Impersonated,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let calldata = TransferCall { to, amount }.encode();
        let output = self.with_session(|session| session.send(signer.address(), token, calldata))?;

        // Tokens without a return value are fine; an explicit `false` is not.
        if !output.is_empty() && matches!(bool::decode(&output), Ok(false)) {
            return Err(FeeForkError::Reverted("transfer returned false".into()));
        }
        Ok(())
    }

    async fn swap_back(
        &self,
        token: Address,
        signer: &Impersonated,
        target: Address,
        amount: U256,
    ) -> Result<()> {
        let calldata = self.options.swap_back.encode(target, amount);
        self.with_session(|session| session.send(signer.address(), token, calldata))?;
        Ok(())
    }

    async fn chain_height(&self) -> Result<u64> {
        self.client()?.block_number().await
    }

    async fn recreate_session(&self, fork_url: &str, height: u64) -> Result<()> {
        let mut client = self.client()?;
        if client.url() != fork_url {
            client = Arc::new(BlockchainClient::with_timeout(fork_url, self.options.request_timeout).await?);
        }

        let fresh = Self::open_session(client.clone(), height, self.options.gas_limit).await?;

        *self.session.lock().map_err(|_| poisoned())? = fresh;
        *self.client.write().map_err(|_| poisoned())? = client;

        tracing::debug!("Session recreated at block {}", height);
        Ok(())
    }
}

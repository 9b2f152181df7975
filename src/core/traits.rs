use async_trait::async_trait;
use ethers::types::{Address, U256};
use crate::models::{FeeResult, Impersonated};
use crate::utils::{FeeForkError, Result};

/// Core abstraction: a mutable forked chain the estimator can drive.
///
/// Every call may suspend; callers serialize access through
/// [`SessionLock`](super::SessionLock).
#[async_trait]
pub trait SimulationBackend: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &'static str;

    /// Obtain the capability to sign as `address`
    async fn impersonate(&self, address: Address) -> Result<Impersonated>;

    /// Overwrite the native-currency balance of `address`
    async fn set_native_balance(&self, address: Address, amount: U256) -> Result<()>;

    /// `token.balanceOf(owner)`
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    /// `token.transfer(to, amount)` sent by `signer`; fails on revert
    async fn transfer_token(
        &self,
        token: Address,
        signer: &Impersonated,
        to: Address,
        amount: U256,
    ) -> Result<()>;

    /// Sell `amount` back toward `target`, sent by `signer`; fails on revert
    async fn swap_back(
        &self,
        token: Address,
        signer: &Impersonated,
        target: Address,
        amount: U256,
    ) -> Result<()>;

    /// Height of the live upstream chain
    async fn chain_height(&self) -> Result<u64>;

    /// Discard the session and fork `fork_url` again at `height`
    async fn recreate_session(&self, fork_url: &str, height: u64) -> Result<()>;
}

/// Where the coordinator writes a finished result.
#[async_trait]
pub trait ResponseSink: Send {
    async fn send_fee(&mut self, result: &FeeResult) -> Result<()>;
}

#[async_trait]
impl ResponseSink for tokio::sync::mpsc::UnboundedSender<FeeResult> {
    async fn send_fee(&mut self, result: &FeeResult) -> Result<()> {
        self.send(*result).map_err(|_| {
            FeeForkError::from(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "response receiver dropped",
            ))
        })
    }
}

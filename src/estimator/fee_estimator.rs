//! Buy/sell tax measurement against a simulation backend.

use std::time::Duration;
use ethers::types::U256;
use crate::core::SimulationBackend;
use crate::models::{
    Estimate, EstimateFailure, FeeRequest, FeeResult, Impersonated, Stage, TaxBreakdown,
};
use crate::utils::{bounded, FeeForkError};
use super::tax::{loss_percent, probe_amount};

/// Native balance given to both parties before simulating (20^18 wei).
pub fn default_funding_balance() -> U256 {
    U256::from(20u64).pow(U256::from(18u64))
}

#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Native balance set on sender and receiver as gas headroom
    pub funding_balance: U256,
    /// Upper bound for every single backend call
    pub call_timeout: Option<Duration>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            funding_balance: default_funding_balance(),
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Drives one buy and one sell through the backend and reports the larger tax.
///
/// The caller must hold the session lock for the whole call.
#[derive(Debug, Clone, Default)]
pub struct FeeEstimator {
    config: EstimatorConfig,
}

impl FeeEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate the fee. Never fails: any problem yields the sentinel.
    pub async fn estimate<B>(&self, backend: &B, request: &FeeRequest) -> FeeResult
    where
        B: SimulationBackend + ?Sized,
    {
        let estimate = self.simulate(backend, request).await;
        let result = FeeResult::from_estimate(&estimate);

        match &estimate {
            Ok(breakdown) => tracing::info!(
                "{} fee calculated for {:?} in {:?} (buy {}%, sell {}%)",
                result.fee,
                request.token,
                request.sender,
                breakdown.buy_fee,
                breakdown.sell_fee
            ),
            Err(failure) => tracing::warn!(
                "fee not calculated for {:?} in {:?}: {}",
                request.token,
                request.sender,
                failure
            ),
        }

        result
    }

    /// Run the simulation and keep the reason for any failure.
    pub async fn simulate<B>(&self, backend: &B, request: &FeeRequest) -> Estimate
    where
        B: SimulationBackend + ?Sized,
    {
        let sender = self
            .prepare(backend, request)
            .await
            .map_err(EstimateFailure::Setup)?;
        self.measure(backend, request, &sender).await
    }

    /// Impersonate the sender and fund both parties, all at once.
    async fn prepare<B>(&self, backend: &B, request: &FeeRequest) -> Result<Impersonated, FeeForkError>
    where
        B: SimulationBackend + ?Sized,
    {
        let limit = self.config.call_timeout;
        let funding = self.config.funding_balance;

        let (sender, _, _) = tokio::try_join!(
            bounded("impersonate", limit, backend.impersonate(request.sender)),
            bounded(
                "set_native_balance",
                limit,
                backend.set_native_balance(request.sender, funding)
            ),
            bounded(
                "set_native_balance",
                limit,
                backend.set_native_balance(request.receiver, funding)
            ),
        )?;

        Ok(sender)
    }

    async fn measure<B>(&self, backend: &B, request: &FeeRequest, sender: &Impersonated) -> Estimate
    where
        B: SimulationBackend + ?Sized,
    {
        let limit = self.config.call_timeout;
        let token = request.token;
        let fail = |stage: Stage| move |source: FeeForkError| EstimateFailure::Simulation { stage, source };

        let (pool_balance, prev_receiver) = tokio::try_join!(
            bounded("balance_of", limit, backend.token_balance(token, request.sender)),
            bounded("balance_of", limit, backend.token_balance(token, request.receiver)),
        )
        .map_err(fail(Stage::Probe))?;

        // Buy: the sender hands 1% of its holding to the receiver.
        let buy_amount = probe_amount(pool_balance);
        if buy_amount.is_zero() {
            return Err(EstimateFailure::ZeroAmount(Stage::Buy));
        }

        bounded(
            "transfer",
            limit,
            backend.transfer_token(token, sender, request.receiver, buy_amount),
        )
        .await
        .map_err(fail(Stage::Buy))?;
        let after_receiver = bounded("balance_of", limit, backend.token_balance(token, request.receiver))
            .await
            .map_err(fail(Stage::Buy))?;

        let received = after_receiver.saturating_sub(prev_receiver);
        let buy_fee = loss_percent(buy_amount, received).ok_or(EstimateFailure::ZeroAmount(Stage::Buy))?;
        tracing::debug!(%buy_amount, %received, buy_fee, "buy leg simulated");

        // Sell: the receiver swaps everything it got back toward the sender.
        let prev_sender = bounded("balance_of", limit, backend.token_balance(token, request.sender))
            .await
            .map_err(fail(Stage::Sell))?;
        let receiver = bounded("impersonate", limit, backend.impersonate(request.receiver))
            .await
            .map_err(fail(Stage::Sell))?;

        let sell_amount = received;
        if sell_amount.is_zero() {
            return Err(EstimateFailure::ZeroAmount(Stage::Sell));
        }

        bounded(
            "swap_back",
            limit,
            backend.swap_back(token, &receiver, request.sender, sell_amount),
        )
        .await
        .map_err(fail(Stage::Sell))?;
        let after_sender = bounded("balance_of", limit, backend.token_balance(token, request.sender))
            .await
            .map_err(fail(Stage::Sell))?;

        let returned = after_sender.saturating_sub(prev_sender);
        let sell_fee = loss_percent(sell_amount, returned).ok_or(EstimateFailure::ZeroAmount(Stage::Sell))?;
        tracing::debug!(%sell_amount, %returned, sell_fee, "sell leg simulated");

        Ok(TaxBreakdown {
            pool_balance,
            buy_amount,
            received,
            buy_fee,
            sell_amount,
            returned,
            sell_fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_funding_balance() {
        assert_eq!(
            default_funding_balance(),
            U256::from_dec_str("262144000000000000000000").unwrap()
        );
    }
}

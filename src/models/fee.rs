use std::fmt;
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::utils::FeeForkError;

/// Fee reported when the tax could not be determined.
pub const FAILURE_SENTINEL: u8 = 100;

/// Response payload: `{"fee": n}` with `n` in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeResult {
    pub fee: u8,
}

impl FeeResult {
    pub fn new(fee: u8) -> Self {
        Self {
            fee: fee.min(FAILURE_SENTINEL),
        }
    }

    pub fn sentinel() -> Self {
        Self {
            fee: FAILURE_SENTINEL,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.fee == FAILURE_SENTINEL
    }

    /// Collapse a tagged estimate into the wire value.
    pub fn from_estimate(estimate: &Estimate) -> Self {
        match estimate {
            Ok(breakdown) => Self::new(breakdown.fee()),
            Err(_) => Self::sentinel(),
        }
    }
}

/// Reply sent instead of a [`FeeResult`] when the request itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Part of the estimation a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Initial balance reads
    Probe,
    /// Simulated buy (sender -> receiver transfer)
    Buy,
    /// Simulated sell (receiver swaps back to sender)
    Sell,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Probe => "probe",
            Stage::Buy => "buy",
            Stage::Sell => "sell",
        };
        f.write_str(name)
    }
}

/// Why an estimate fell back to the sentinel.
#[derive(Debug, Error)]
pub enum EstimateFailure {
    /// Impersonation or funding failed
    #[error("setup failed: {0}")]
    Setup(#[source] FeeForkError),

    #[error("{stage} simulation failed: {source}")]
    Simulation {
        stage: Stage,
        #[source]
        source: FeeForkError,
    },

    #[error("{0} amount is zero")]
    ZeroAmount(Stage),
}

impl EstimateFailure {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EstimateFailure::Setup(_) => None,
            EstimateFailure::Simulation { stage, .. } => Some(*stage),
            EstimateFailure::ZeroAmount(stage) => Some(*stage),
        }
    }
}

/// Measured buy and sell legs of one estimation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxBreakdown {
    /// Sender's token balance before the buy
    pub pool_balance: U256,
    /// Amount transferred to the receiver
    pub buy_amount: U256,
    /// Amount the receiver actually gained
    pub received: U256,
    pub buy_fee: u8,
    /// Amount swapped back to the sender
    pub sell_amount: U256,
    /// Amount the sender actually gained
    pub returned: U256,
    pub sell_fee: u8,
}

impl TaxBreakdown {
    pub fn fee(&self) -> u8 {
        self.buy_fee.max(self.sell_fee)
    }
}

pub type Estimate = std::result::Result<TaxBreakdown, EstimateFailure>;

//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;
use crate::blockchain::{ForkOptions, DEFAULT_GAS_LIMIT};
use crate::contracts::SwapBackCall;
use crate::core::{ResetConfig, DEFAULT_RESET_LAG};
use crate::estimator::{default_funding_balance, EstimatorConfig};
use crate::utils::{FeeForkError, Result};

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(10);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// WebSocket listen address
    pub listen: SocketAddr,
    /// Upstream JSON-RPC node that is forked
    pub rpc_url: String,
    /// Reset period
    pub block_time: Duration,
    /// Blocks behind the tip the fork is pinned to
    pub reset_lag: u64,
    /// Bound for each backend call; `None` disables it
    pub call_timeout: Option<Duration>,
    pub gas_limit: u64,
    pub swap_back: SwapBackCall,
}

impl ServerConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            rpc_url: rpc_url.into(),
            block_time: DEFAULT_BLOCK_TIME,
            reset_lag: DEFAULT_RESET_LAG,
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            gas_limit: DEFAULT_GAS_LIMIT,
            swap_back: SwapBackCall::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(FeeForkError::ConfigError("RPC URL must not be empty".into()));
        }
        if self.block_time.is_zero() {
            return Err(FeeForkError::ConfigError("block time must be positive".into()));
        }
        if self.gas_limit == 0 {
            return Err(FeeForkError::ConfigError("gas limit must be positive".into()));
        }
        Ok(())
    }

    pub fn estimator(&self) -> EstimatorConfig {
        EstimatorConfig {
            funding_balance: default_funding_balance(),
            call_timeout: self.call_timeout,
        }
    }

    pub fn reset(&self) -> ResetConfig {
        ResetConfig {
            fork_url: self.rpc_url.clone(),
            period: self.block_time,
            lag: self.reset_lag,
            call_timeout: self.call_timeout,
        }
    }

    pub fn fork(&self) -> ForkOptions {
        ForkOptions {
            gas_limit: self.gas_limit,
            swap_back: self.swap_back.clone(),
            request_timeout: self.call_timeout,
        }
    }
}

/// Seconds from the command line, 0 meaning "no limit".
pub fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::new("https://evm.astar.network");
        assert!(config.validate().is_ok());
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.reset().lag, 10);
        assert_eq!(config.reset().fork_url, "https://evm.astar.network");
        assert_eq!(config.estimator().call_timeout, Some(DEFAULT_CALL_TIMEOUT));
        assert_eq!(config.fork().request_timeout, Some(DEFAULT_CALL_TIMEOUT));
    }

    #[test]
    fn test_validation() {
        assert!(ServerConfig::new("  ").validate().is_err());

        let mut config = ServerConfig::new("http://localhost:8545");
        config.block_time = Duration::ZERO;
        assert!(matches!(config.validate(), Err(FeeForkError::ConfigError(_))));

        let mut config = ServerConfig::new("http://localhost:8545");
        config.gas_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_optional_secs() {
        assert_eq!(optional_secs(0), None);
        assert_eq!(optional_secs(5), Some(Duration::from_secs(5)));
    }
}

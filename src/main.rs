use std::net::SocketAddr;
use std::sync::Arc;
use clap::Parser;
use fee_fork::blockchain::{BlockchainClient, ForkBackend, DEFAULT_GAS_LIMIT};
use fee_fork::config::{optional_secs, ServerConfig, DEFAULT_LISTEN};
use fee_fork::contracts::{SwapBackCall, DEFAULT_SWAP_BACK_SIGNATURE};
use fee_fork::core::DEFAULT_RESET_LAG;
use fee_fork::server::FeeServer;
use fee_fork::{FeeEstimator, RequestCoordinator, ResetScheduler, Result, SessionLock};
use tokio::sync::watch;

/// Token fee oracle - answers buy/sell tax queries from a forked chain
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Upstream JSON-RPC node to fork
    #[arg(short, long, env = "FEE_FORK_RPC_URL")]
    rpc: String,

    /// WebSocket listen address
    #[arg(short, long, env = "FEE_FORK_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// Seconds between fork resets
    #[arg(long, env = "FEE_FORK_BLOCK_TIME", default_value_t = 10)]
    block_time: u64,

    /// Blocks behind the chain tip to fork at
    #[arg(long, env = "FEE_FORK_RESET_LAG", default_value_t = DEFAULT_RESET_LAG)]
    reset_lag: u64,

    /// Seconds allowed per backend call (0 disables the limit)
    #[arg(long, env = "FEE_FORK_CALL_TIMEOUT", default_value_t = 30)]
    call_timeout: u64,

    /// Gas limit of simulated transactions
    #[arg(long, env = "FEE_FORK_GAS_LIMIT", default_value_t = DEFAULT_GAS_LIMIT)]
    gas_limit: u64,

    /// Token function used to simulate the sell, shaped name(address,uint256)
    #[arg(long, env = "FEE_FORK_SWAP_BACK", default_value = DEFAULT_SWAP_BACK_SIGNATURE)]
    swap_back_signature: SwapBackCall,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            listen: self.listen,
            rpc_url: self.rpc,
            block_time: std::time::Duration::from_secs(self.block_time),
            reset_lag: self.reset_lag,
            call_timeout: optional_secs(self.call_timeout),
            gas_limit: self.gas_limit,
            swap_back: self.swap_back_signature,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let default_filter = if args.verbose { "fee_fork=debug" } else { "fee_fork=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let config = args.into_config();
    config.validate()?;

    tracing::info!("Started fork against {}", config.rpc_url);

    // Fork a little behind the tip, like every later reset does
    let tip = BlockchainClient::with_timeout(&config.rpc_url, config.call_timeout)
        .await?
        .block_number()
        .await?;
    let backend = ForkBackend::connect(
        &config.rpc_url,
        tip.saturating_sub(config.reset_lag),
        config.fork(),
    )
    .await?;

    let lock = Arc::new(SessionLock::new(backend));
    let coordinator = Arc::new(RequestCoordinator::new(
        lock.clone(),
        FeeEstimator::new(config.estimator()),
    ));
    let scheduler = ResetScheduler::new(lock, config.reset());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let resets = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let server = FeeServer::bind(config.listen).await?;
    let serving = tokio::spawn(server.serve(coordinator, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    let _ = shutdown_tx.send(true);

    if let Ok(result) = serving.await {
        result?;
    }
    let _ = resets.await;

    Ok(())
}

use fee_fork::blockchain::{BlockchainClient, ForkBackend, ForkOptions, DEFAULT_REQUEST_TIMEOUT};
use fee_fork::core::DEFAULT_RESET_LAG;
use fee_fork::contracts::{SwapBackCall, DEFAULT_SWAP_BACK_SIGNATURE};
use fee_fork::estimator::{EstimatorConfig, FeeEstimator};
use fee_fork::models::FeeRequest;
use fee_fork::FeeForkError;
use clap::Parser;

/// Token Fee Checker - measure the buy/sell tax of a token once
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Token contract address to check
    #[arg(value_name = "TOKEN_ADDRESS")]
    token: String,

    /// Holder the buy is sent from (usually the trading pair)
    #[arg(value_name = "SENDER")]
    sender: String,

    /// Account that receives the buy and sells it back
    #[arg(value_name = "RECEIVER")]
    receiver: String,

    /// RPC URL of the chain to fork
    #[arg(short, long, env = "FEE_FORK_RPC_URL", default_value = "https://evm.astar.network")]
    rpc: String,

    /// Fork at this block instead of a few behind the tip
    #[arg(short, long)]
    block: Option<u64>,

    /// Token function used to simulate the sell
    #[arg(long, default_value = DEFAULT_SWAP_BACK_SIGNATURE)]
    swap_back_signature: SwapBackCall,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let default_filter = if args.verbose { "fee_fork=debug" } else { "fee_fork=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    println!("\n🔍 Token Fee Checker");
    println!("====================\n");

    let parse = |what: &str, raw: &str| -> Result<ethers::types::Address, FeeForkError> {
        raw.parse()
            .map_err(|e| FeeForkError::InvalidAddress(format!("{} {:?}: {}", what, raw, e)))
    };
    let request = FeeRequest::new(
        parse("sender", &args.sender)?,
        parse("receiver", &args.receiver)?,
        parse("token", &args.token)?,
    );

    println!("🎯 Token: {:?}", request.token);
    println!("📤 Sender: {:?}", request.sender);
    println!("📥 Receiver: {:?}", request.receiver);
    println!("📡 RPC: {}\n", args.rpc);

    print!("Connecting... ");
    let height = match args.block {
        Some(height) => height,
        None => BlockchainClient::with_timeout(&args.rpc, Some(DEFAULT_REQUEST_TIMEOUT))
            .await?
            .block_number()
            .await?
            .saturating_sub(DEFAULT_RESET_LAG),
    };
    let options = ForkOptions {
        swap_back: args.swap_back_signature,
        ..ForkOptions::default()
    };
    let backend = ForkBackend::connect(&args.rpc, height, options).await?;
    println!("✅ Forked {} at block {}", backend.client()?.chain_name(), height);

    println!("\n🚀 Simulating buy and sell...\n");
    let estimator = FeeEstimator::new(EstimatorConfig::default());

    match estimator.simulate(&backend, &request).await {
        Ok(breakdown) => {
            println!("📊 Buy:");
            println!("   • Sent:     {}", breakdown.buy_amount);
            println!("   • Received: {}", breakdown.received);
            println!("   • Tax:      {}%", breakdown.buy_fee);
            println!("📊 Sell:");
            println!("   • Sent:     {}", breakdown.sell_amount);
            println!("   • Returned: {}", breakdown.returned);
            println!("   • Tax:      {}%", breakdown.sell_fee);

            println!("\n💰 Fee: {}%\n", breakdown.fee());
            Ok(())
        }
        Err(failure) => {
            println!("❌ Fee could not be measured: {}", failure);
            if let Some(stage) = failure.stage() {
                println!("   Failed during the {} stage", stage);
            }
            println!("\nPossible reasons:");
            println!("  • RPC connection issues");
            println!("  • Sender holds no tokens");
            println!("  • Token blocks transfers or the swap-back call\n");
            std::process::exit(1);
        }
    }
}

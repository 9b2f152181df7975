use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use crate::utils::{Result, FeeForkError};

/// Header fields a fork needs from the block it is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
}

/// Upstream chain RPC client
pub struct BlockchainClient {
    pub(crate) provider: Arc<Provider<Http>>,
    url: String,
    chain_id: u64,
}

impl BlockchainClient {
    /// Create a new client
    pub async fn new(rpc_url: &str) -> Result<Self> {
        Self::with_timeout(rpc_url, None).await
    }

    /// Create a client whose every HTTP request gives up after `request_timeout`.
    ///
    /// Fork state is fetched synchronously while the EVM runs, where no async
    /// timeout can interrupt it, so this is what bounds a stalled node.
    pub async fn with_timeout(rpc_url: &str, request_timeout: Option<Duration>) -> Result<Self> {
        let provider = http_provider(rpc_url, request_timeout)?;

        // Get chain ID
        let chain_id = provider.get_chainid().await?;

        tracing::info!("Connected to chain ID: {}", chain_id);

        Ok(Self::with_provider(provider, rpc_url, chain_id.as_u64()))
    }

    pub(crate) fn with_provider(provider: Provider<Http>, rpc_url: &str, chain_id: u64) -> Self {
        Self {
            provider: Arc::new(provider),
            url: rpc_url.to_string(),
            chain_id,
        }
    }

    /// Get current block number
    pub async fn block_number(&self) -> Result<u64> {
        let block = self.provider.get_block_number().await?;
        Ok(block.as_u64())
    }

    /// Number and timestamp of a block
    pub async fn block_context(&self, number: u64) -> Result<BlockContext> {
        let block = self.provider.get_block(number).await?
            .ok_or_else(|| FeeForkError::SimulationError(format!("Block {} not found", number)))?;

        Ok(BlockContext {
            number,
            timestamp: block.timestamp.as_u64(),
        })
    }

    /// URL this client was created with
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get chain ID
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Get chain name
    pub fn chain_name(&self) -> &'static str {
        match self.chain_id {
            1 => "Ethereum Mainnet",
            56 => "BNB Smart Chain",
            369 => "PulseChain",
            592 => "Astar",
            _ => "Unknown Chain",
        }
    }
}

/// HTTP transport with an optional per-request timeout
pub(crate) fn http_provider(rpc_url: &str, request_timeout: Option<Duration>) -> Result<Provider<Http>> {
    let invalid = |what: &str, e: String| FeeForkError::RpcError(ProviderError::CustomError(format!("{}: {}", what, e)));

    let url = reqwest::Url::parse(rpc_url).map_err(|e| invalid("Invalid RPC URL", e.to_string()))?;

    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    let http = builder
        .build()
        .map_err(|e| invalid("Failed to build HTTP client", e.to_string()))?;

    Ok(Provider::new(Http::new_with_client(url, http)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Accepts connections and never answers.
    pub(crate) async fn silent_node() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_rejects_invalid_url() {
        let result = BlockchainClient::new("not a url").await;
        assert!(matches!(result, Err(FeeForkError::RpcError(_))));
    }

    #[tokio::test]
    async fn test_silent_node_hits_request_timeout() {
        let (url, node) = silent_node().await;

        let started = std::time::Instant::now();
        let result = BlockchainClient::with_timeout(&url, Some(Duration::from_millis(200))).await;

        assert!(matches!(result, Err(FeeForkError::RpcError(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        node.abort();
    }
}

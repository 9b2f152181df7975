mod errors;

pub use errors::{FeeForkError, Result};

use std::future::Future;
use std::time::Duration;

/// Run `fut`, failing with [`FeeForkError::Timeout`] once `limit` elapses.
/// `None` means unbounded.
pub async fn bounded<T, F>(operation: &'static str, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| FeeForkError::Timeout { operation, after })?,
        None => fut.await,
    }
}

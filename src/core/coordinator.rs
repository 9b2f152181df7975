use std::sync::Arc;
use crate::core::{ResponseSink, SessionLock, SimulationBackend};
use crate::estimator::FeeEstimator;
use crate::models::{FeeRequest, FeeResult};
use crate::utils::Result;

/// Serializes fee requests onto the shared session.
///
/// Each request holds the session lock from estimation until its response
/// has been handed to the sink, so responses leave in lock order.
pub struct RequestCoordinator<B> {
    lock: Arc<SessionLock<B>>,
    estimator: FeeEstimator,
}

impl<B: SimulationBackend> RequestCoordinator<B> {
    pub fn new(lock: Arc<SessionLock<B>>, estimator: FeeEstimator) -> Self {
        Self { lock, estimator }
    }

    pub fn lock(&self) -> &Arc<SessionLock<B>> {
        &self.lock
    }

    /// Parse a raw message and serve it.
    ///
    /// A message that does not parse fails with
    /// [`MalformedRequest`](crate::utils::FeeForkError::MalformedRequest)
    /// without touching the lock.
    pub async fn serve_message<S>(&self, raw: &str, sink: &mut S) -> Result<FeeResult>
    where
        S: ResponseSink + ?Sized,
    {
        let request = FeeRequest::parse(raw)?;
        self.serve(&request, sink).await
    }

    /// Estimate under the lock and send the result before releasing it.
    ///
    /// Only a failing sink produces an error; the lock is released either way.
    pub async fn serve<S>(&self, request: &FeeRequest, sink: &mut S) -> Result<FeeResult>
    where
        S: ResponseSink + ?Sized,
    {
        tracing::debug!(token = ?request.token, sender = ?request.sender, "fee request queued");

        let session = self.lock.acquire("fee-request").await;
        let result = self.estimator.estimate(&*session, request).await;
        sink.send_fee(&result).await?;
        drop(session);

        Ok(result)
    }
}

//! Deadline and backoff around single backend calls

use sqlforge_core::RepairPolicy;
use sqlforge_core::synthesis::SynthesisError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("{operation} did not finish within {timeout:?}")]
    TimedOut { operation: &'static str, timeout: Duration },

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

impl CallError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::TimedOut { .. } => true,
            Self::Synthesis(e) => e.is_retryable(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Synthesis(e) => e.backend_error().and_then(|b| b.retry_after()),
            Self::TimedOut { .. } => None,
        }
    }
}

/// Run `call` under the policy's deadline, retrying retryable failures
/// with exponential backoff up to `max_retries` extra times.
pub async fn with_retries<T, F, Fut>(
    policy: &RepairPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SynthesisError>>,
{
    let mut retry = 0;
    loop {
        let result = match tokio::time::timeout(policy.call_timeout(), call()).await {
            Ok(result) => result.map_err(CallError::from),
            Err(_) => Err(CallError::TimedOut { operation, timeout: policy.call_timeout() }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                let wait = e.retry_after().unwrap_or_else(|| policy.backoff(retry));
                warn!("{} failed ({}), retrying in {:?}", operation, e, wait);
                tokio::time::sleep(wait).await;
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

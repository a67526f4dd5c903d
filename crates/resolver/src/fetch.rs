//! One authenticated retrieval attempt, outcome classification, and the
//! retry policy.
//!
//! Classification is deliberately narrow: 401 is the only status treated as
//! credential rejection, 503 the only one treated as retryable. Everything
//! else, including other 5xx statuses and connect failures, is terminal.

use crate::credentials::CredentialManager;
use assetgate_core::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Classified result of a single retrieval attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Binary payload retrieved
    Success(Bytes),
    /// The credential was rejected
    Unauthorized,
    /// The endpoint signaled a retryable condition
    Retryable { status: u16 },
}

/// Performs one authenticated retrieval attempt. The network lives behind
/// this seam; terminal failures are returned as errors directly.
#[async_trait]
pub trait ResourceTransport: Send + Sync {
    async fn attempt(&self, reference: &str, bearer: &str) -> Result<FetchOutcome>;
}

/// HTTP transport against the protected resource endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceTransport for HttpTransport {
    async fn attempt(&self, reference: &str, bearer: &str) -> Result<FetchOutcome> {
        let response = self
            .client
            .get(reference)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| Error::network(reference, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let payload = response
                .bytes()
                .await
                .map_err(|e| Error::network(reference, format!("body read failed: {e}")))?;
            return Ok(FetchOutcome::Success(payload));
        }

        match status.as_u16() {
            401 => Ok(FetchOutcome::Unauthorized),
            503 => Ok(FetchOutcome::Retryable {
                status: status.as_u16(),
            }),
            code => Err(Error::terminal(
                reference,
                format!("resource endpoint returned status {code}"),
            )),
        }
    }
}

/// Retry budget for a single logical resolution.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts for retryable failures
    pub max_transient_retries: u32,
    /// Delay before attempt n+1 is `retry_base_delay * n`
    pub retry_base_delay: Duration,
}

/// Drives retrieval attempts against a transport, applying the retry policy.
///
/// The caller holds the admission slot for the whole call, so retries never
/// re-enter the gate.
pub struct ResourceFetcher {
    transport: Arc<dyn ResourceTransport>,
    credentials: Arc<CredentialManager>,
    policy: RetryPolicy,
}

impl ResourceFetcher {
    #[must_use]
    pub fn new(
        transport: Arc<dyn ResourceTransport>,
        credentials: Arc<CredentialManager>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            credentials,
            policy,
        }
    }

    /// Fetch the payload for a reference, retrying per policy.
    ///
    /// A rejected credential is invalidated and retried exactly once with a
    /// freshly obtained one; a second rejection is terminal. Retryable
    /// statuses are retried up to the configured budget with linearly
    /// increasing delays. Anything else propagates immediately.
    pub async fn fetch(&self, reference: &str) -> Result<Bytes> {
        let mut auth_retried = false;
        let mut attempt: u32 = 1;

        loop {
            let credential = self.credentials.get_valid().await?;

            match self.transport.attempt(reference, &credential.token).await? {
                FetchOutcome::Success(payload) => {
                    debug!(reference, attempt, "fetch succeeded");
                    return Ok(payload);
                }
                FetchOutcome::Unauthorized => {
                    if auth_retried {
                        return Err(Error::authorization_rejected(reference));
                    }
                    warn!(reference, "credential rejected; refreshing and retrying once");
                    self.credentials.invalidate();
                    auth_retried = true;
                }
                FetchOutcome::Retryable { status } => {
                    if attempt >= self.policy.max_transient_retries {
                        return Err(Error::transient_exhausted(reference, attempt, status));
                    }
                    let delay = self.policy.retry_base_delay * attempt;
                    warn!(
                        reference,
                        status,
                        attempt,
                        ?delay,
                        "transient failure; retrying after delay"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

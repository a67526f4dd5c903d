//! Short-lived bearer credential acquisition with single-flight refresh.
//!
//! The manager owns the only copy of the current credential. Refreshes are
//! coalesced: concurrent callers observing a stale credential all await one
//! outstanding refresh and all receive its result, success or failure. A
//! failed refresh clears the cell so the next caller starts from scratch
//! (no negative caching).

use assetgate_core::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// A bearer credential with its derived expiry.
///
/// Replaced, never mutated: a refresh produces a new value.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: Instant,
}

impl Credential {
    /// Whether the credential is still usable given the refresh buffer.
    #[must_use]
    pub fn is_fresh(&self, refresh_buffer: Duration) -> bool {
        Instant::now() + refresh_buffer < self.expires_at
    }
}

/// Issues new credentials. The network is behind this seam.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Request one freshly issued token.
    async fn issue(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// HTTP credential source posting to the configured issuing endpoint.
pub struct HttpCredentialSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCredentialSource {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn issue(&self) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| Error::network(self.endpoint.as_str(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::credential_unavailable(format!(
                "credential endpoint returned status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::credential_unavailable(format!("unparseable token body: {e}")))?;

        if body.token.is_empty() {
            return Err(Error::credential_unavailable("endpoint returned an empty token"));
        }
        Ok(body.token)
    }
}

/// Seconds-since-epoch expiry claim embedded in a JWT payload.
#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: u64,
}

/// Derive a credential's expiry from its embedded `exp` claim when the token
/// is a decodable JWT; fall back to `default_ttl` from now otherwise.
fn derive_expiry(token: &str, default_ttl: Duration) -> Instant {
    let now = Instant::now();
    let fallback = now + default_ttl;

    let Some(payload) = token.split('.').nth(1) else {
        return fallback;
    };
    let Ok(decoded) = URL_SAFE_NO_PAD.decode(payload) else {
        return fallback;
    };
    let Ok(claim) = serde_json::from_slice::<ExpiryClaim>(&decoded) else {
        return fallback;
    };

    let now_unix = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if claim.exp <= now_unix {
        // Already expired by its own claim; keep it unusable but finite.
        return now;
    }
    now + Duration::from_secs(claim.exp - now_unix)
}

type SharedRefresh = Shared<BoxFuture<'static, std::result::Result<Credential, Arc<Error>>>>;

#[derive(Default)]
struct CredentialCell {
    current: Option<Credential>,
    refresh: Option<SharedRefresh>,
}

/// Owns the credential lifecycle: caching, single-flight refresh, forced
/// invalidation after a downstream authorization failure.
pub struct CredentialManager {
    source: Arc<dyn CredentialSource>,
    refresh_buffer: Duration,
    default_ttl: Duration,
    cell: Arc<Mutex<CredentialCell>>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(
        source: Arc<dyn CredentialSource>,
        refresh_buffer: Duration,
        default_ttl: Duration,
    ) -> Self {
        Self {
            source,
            refresh_buffer,
            default_ttl,
            cell: Arc::new(Mutex::new(CredentialCell::default())),
        }
    }

    /// Return a credential valid for at least the refresh buffer, refreshing
    /// if needed. Concurrent callers share one refresh.
    pub async fn get_valid(&self) -> Result<Credential> {
        let refresh = {
            let mut cell = self.cell.lock();
            if let Some(credential) = &cell.current {
                if credential.is_fresh(self.refresh_buffer) {
                    return Ok(credential.clone());
                }
            }
            match &cell.refresh {
                Some(existing) => existing.clone(),
                None => {
                    let refresh = self.spawn_refresh();
                    cell.refresh = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await.map_err(|e| match e.as_ref() {
            Error::Network { endpoint, message } => Error::credential_unavailable(format!(
                "credential endpoint '{endpoint}' unreachable: {message}"
            )),
            other => Error::credential_unavailable(other.to_string()),
        })
    }

    /// Unconditionally drop the cached credential so the next caller forces
    /// a refresh. Used after the resource endpoint rejects the token.
    pub fn invalidate(&self) {
        self.cell.lock().current = None;
        debug!("credential invalidated; next request will refresh");
    }

    /// Run one refresh in a detached task so every waiter, including late
    /// joiners, receives its settled result even if the first caller is
    /// cancelled mid-await.
    fn spawn_refresh(&self) -> SharedRefresh {
        let source = self.source.clone();
        let cell = self.cell.clone();
        let default_ttl = self.default_ttl;

        let task = tokio::spawn(async move {
            let outcome = source.issue().await.map(|token| Credential {
                expires_at: derive_expiry(&token, default_ttl),
                token,
            });

            let mut cell = cell.lock();
            cell.refresh = None;
            match outcome {
                Ok(credential) => {
                    debug!("credential refreshed");
                    cell.current = Some(credential.clone());
                    Ok(credential)
                }
                Err(e) => {
                    warn!("credential refresh failed: {e}");
                    cell.current = None;
                    Err(Arc::new(e))
                }
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Arc::new(Error::credential_unavailable(format!(
                    "refresh task aborted: {e}"
                )))),
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        issued: AtomicUsize,
        fail_first: AtomicUsize,
        ttl_claim: Option<u64>,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                issued: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(0),
                ttl_claim: None,
            }
        }

        fn failing_first(n: usize) -> Self {
            let source = Self::new();
            source.fail_first.store(n, Ordering::SeqCst);
            source
        }

        fn count(&self) -> usize {
            self.issued.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialSource for CountingSource {
        async fn issue(&self) -> Result<String> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first.load(Ordering::SeqCst) {
                return Err(Error::credential_unavailable("issuer offline"));
            }
            // Yield so concurrent callers pile onto the same refresh.
            tokio::task::yield_now().await;
            match self.ttl_claim {
                Some(exp_offset) => Ok(make_jwt(unix_now() + exp_offset)),
                None => Ok(format!("opaque-token-{n}")),
            }
        }
    }

    fn unix_now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn make_jwt(exp: u64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        format!("{header}.{payload}.sig")
    }

    fn manager_with(source: Arc<CountingSource>) -> CredentialManager {
        CredentialManager::new(source, Duration::from_secs(30), Duration::from_secs(240))
    }

    #[tokio::test]
    async fn credential_is_reused_while_fresh() {
        let source = Arc::new(CountingSource::new());
        let manager = manager_with(source.clone());

        let first = manager.get_valid().await.unwrap();
        let second = manager.get_valid().await.unwrap();
        assert_eq!(first.token, second.token);
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let source = Arc::new(CountingSource::new());
        let manager = Arc::new(manager_with(source.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.get_valid().await }));
        }
        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap().token);
        }

        assert_eq!(source.count(), 1);
        assert!(tokens.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_credential_triggers_exactly_one_refresh() {
        let source = Arc::new(CountingSource::new());
        // Opaque token: expiry falls back to the 240s default TTL.
        let manager = manager_with(source.clone());

        manager.get_valid().await.unwrap();
        assert_eq!(source.count(), 1);

        // Still inside the 30s refresh buffer of a 240s lifetime.
        tokio::time::advance(Duration::from_secs(180)).await;
        manager.get_valid().await.unwrap();
        assert_eq!(source.count(), 1);

        // Past expires_at - refresh_buffer.
        tokio::time::advance(Duration::from_secs(31)).await;
        manager.get_valid().await.unwrap();
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn refresh_failure_propagates_and_is_not_cached() {
        let source = Arc::new(CountingSource::failing_first(1));
        let manager = manager_with(source.clone());

        let err = manager.get_valid().await.unwrap_err();
        assert!(matches!(err, Error::CredentialUnavailable { .. }));

        // Next call retries from scratch and succeeds.
        let credential = manager.get_valid().await.unwrap();
        assert!(!credential.token.is_empty());
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refresh() {
        let source = Arc::new(CountingSource::new());
        let manager = manager_with(source.clone());

        let first = manager.get_valid().await.unwrap();
        manager.invalidate();
        let second = manager.get_valid().await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn jwt_expiry_claim_drives_freshness() {
        let token = make_jwt(unix_now() + 3600);
        let expires_at = derive_expiry(&token, Duration::from_secs(240));
        let remaining = expires_at - Instant::now();
        assert!(remaining > Duration::from_secs(3500));
        assert!(remaining <= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn undecodable_token_falls_back_to_default_ttl() {
        let expires_at = derive_expiry("not-a-jwt", Duration::from_secs(240));
        let remaining = expires_at - Instant::now();
        assert!(remaining <= Duration::from_secs(240));
        assert!(remaining > Duration::from_secs(230));
    }

    #[tokio::test]
    async fn already_expired_claim_is_immediately_stale() {
        let token = make_jwt(unix_now().saturating_sub(60));
        let credential = Credential {
            token,
            expires_at: derive_expiry(
                &make_jwt(unix_now().saturating_sub(60)),
                Duration::from_secs(240),
            ),
        };
        assert!(!credential.is_fresh(Duration::from_secs(30)));
    }
}

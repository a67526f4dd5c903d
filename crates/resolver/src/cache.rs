//! Resolution cache and in-flight registry.
//!
//! Both maps live under one mutex so a key's transition from IN_FLIGHT to
//! RESOLVED is atomic: a key is never observable in both at once. The
//! producer runs in a detached task whose shared join future is the
//! in-flight entry, so caller cancellation never cancels the underlying
//! resolution and every joiner receives the settled result, success or
//! failure. The entry is removed unconditionally on settlement, so a failed
//! resolution never blocks later retries.

use assetgate_core::{Error, LocalHandle, ResourceKey, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

type SharedResolution = Shared<BoxFuture<'static, std::result::Result<LocalHandle, Arc<Error>>>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<ResourceKey, LocalHandle>,
    in_flight: HashMap<ResourceKey, SharedResolution>,
}

/// Maps resource keys to resolved local handles and deduplicates concurrent
/// resolutions per key.
#[derive(Clone, Default)]
pub struct ResolutionCache {
    state: Arc<Mutex<CacheState>>,
}

impl ResolutionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached handle without touching the pipeline.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<LocalHandle> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Number of cached handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Resolve `key`, invoking `producer` at most once per key regardless of
    /// caller concurrency. Cached handles return immediately; concurrent
    /// callers for the same key join the existing in-flight resolution.
    pub async fn resolve<F, Fut>(&self, key: ResourceKey, producer: F) -> Result<LocalHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LocalHandle>> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock();
            if let Some(handle) = state.entries.get(&key) {
                debug!(key = %key, "resolution cache hit");
                return Ok(handle.clone());
            }
            if let Some(existing) = state.in_flight.get(&key) {
                debug!(key = %key, "joining in-flight resolution");
                existing.clone()
            } else {
                let shared = Self::spawn_resolution(self.state.clone(), key.clone(), producer());
                state.in_flight.insert(key, shared.clone());
                shared
            }
        };

        shared.await.map_err(|e| owned_error(&e))
    }

    /// Release every cached handle and clear the map. In-flight resolutions
    /// are not cancelled; they settle normally.
    ///
    /// Returns the number of handles released.
    pub fn invalidate_all(&self) -> usize {
        let released: Vec<LocalHandle> = {
            let mut state = self.state.lock();
            state.entries.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &released {
            handle.release();
        }
        debug!(count = released.len(), "resolution cache invalidated");
        released.len()
    }

    fn spawn_resolution<Fut>(
        state: Arc<Mutex<CacheState>>,
        key: ResourceKey,
        producer: Fut,
    ) -> SharedResolution
    where
        Fut: Future<Output = Result<LocalHandle>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let result = producer.await;
            // Store-and-remove under one lock: the key moves atomically from
            // the in-flight registry to the cache (or out of both on error).
            let mut state = state.lock();
            state.in_flight.remove(&key);
            match result {
                Ok(handle) => {
                    state.entries.insert(key, handle.clone());
                    Ok(handle)
                }
                Err(e) => Err(Arc::new(e)),
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Arc::new(Error::configuration(format!(
                    "resolution task aborted: {e}"
                )))),
            }
        }
        .boxed()
        .shared()
    }
}

/// Rebuild an owned error from the shared copy every joiner receives.
fn owned_error(error: &Arc<Error>) -> Error {
    match error.as_ref() {
        Error::CredentialUnavailable { message, .. } => {
            Error::credential_unavailable(message.clone())
        }
        Error::AuthorizationRejected { reference } => {
            Error::authorization_rejected(reference.clone())
        }
        Error::TransientExhausted {
            reference,
            attempts,
            last_status,
        } => Error::transient_exhausted(reference.clone(), *attempts, *last_status),
        Error::Terminal { reference, message } => {
            Error::terminal(reference.clone(), message.clone())
        }
        Error::Network { endpoint, message } => Error::network(endpoint.clone(), message.clone()),
        other => Error::configuration(other.to_string()),
    }
}

//! Public façade composing the resolution pipeline.
//!
//! `resolve` is the only entry point the rendering layer needs: references
//! outside the protected-host pattern pass through untouched, cached handles
//! return immediately, and every pipeline failure is absorbed into a
//! deterministic fallback plus a diagnostic event. Errors never cross this
//! boundary.

use crate::cache::ResolutionCache;
use crate::config::ResolverConfig;
use crate::credentials::{CredentialManager, CredentialSource, HttpCredentialSource};
use crate::fetch::{HttpTransport, ResourceFetcher, ResourceTransport, RetryPolicy};
use crate::gate::AdmissionGate;
use assetgate_core::{DiagnosticBus, LocalHandle, ResolverEvent, ResourceKey, Result};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Outcome of resolving a reference, as seen by the rendering layer.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The reference was not protected and is returned unchanged
    Passthrough(String),
    /// A locally usable handle for the protected resource
    Handle(LocalHandle),
    /// Resolution failed; the deterministic fallback reference applies
    Fallback(String),
}

impl Resolution {
    /// The URI the rendering layer should use.
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Resolution::Passthrough(reference) | Resolution::Fallback(reference) => reference,
            Resolution::Handle(handle) => handle.uri(),
        }
    }
}

/// Authenticated resource resolver.
pub struct AssetResolver {
    config: ResolverConfig,
    cache: ResolutionCache,
    gate: AdmissionGate,
    credentials: Arc<CredentialManager>,
    fetcher: Arc<ResourceFetcher>,
    diagnostics: DiagnosticBus,
}

impl AssetResolver {
    /// Build a resolver with HTTP wiring from the configuration. Requires a
    /// configured credential endpoint.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let endpoint = config.credential_endpoint.clone().ok_or_else(|| {
            assetgate_core::Error::configuration(
                "credential endpoint is required for HTTP resolution",
            )
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| assetgate_core::Error::configuration(format!("http client: {e}")))?;

        let source = Arc::new(HttpCredentialSource::new(client.clone(), endpoint));
        let transport = Arc::new(HttpTransport::new(client));
        Ok(Self::with_parts(config, source, transport))
    }

    /// Build a resolver over explicit source/transport implementations.
    /// This is the seam tests and non-HTTP embeddings use.
    #[must_use]
    pub fn with_parts(
        config: ResolverConfig,
        source: Arc<dyn CredentialSource>,
        transport: Arc<dyn ResourceTransport>,
    ) -> Self {
        let credentials = Arc::new(CredentialManager::new(
            source,
            config.refresh_buffer,
            config.default_credential_ttl,
        ));
        let fetcher = Arc::new(ResourceFetcher::new(
            transport,
            credentials.clone(),
            RetryPolicy {
                max_transient_retries: config.max_transient_retries,
                retry_base_delay: config.retry_base_delay,
            },
        ));
        Self {
            gate: AdmissionGate::new(config.gate_capacity),
            cache: ResolutionCache::new(),
            credentials,
            fetcher,
            diagnostics: DiagnosticBus::default(),
            config,
        }
    }

    /// Whether a reference falls under the protected-host pattern.
    /// Unparseable references are never protected.
    #[must_use]
    pub fn should_protect(&self, reference: &str) -> bool {
        match Url::parse(reference) {
            Ok(url) => url
                .host_str()
                .is_some_and(|host| self.config.protected_hosts.is_match(host)),
            Err(_) => false,
        }
    }

    /// Resolve a reference to a usable URI. Never fails: protected
    /// resolutions that error out yield the configured fallback, with the
    /// failure published on the diagnostic bus.
    pub async fn resolve(&self, reference: &str) -> Resolution {
        if !self.should_protect(reference) {
            self.diagnostics.publish(ResolverEvent::PassedThrough {
                reference: reference.to_string(),
            });
            return Resolution::Passthrough(reference.to_string());
        }

        let key = ResourceKey::normalize(reference);
        if let Some(handle) = self.cache.get(&key) {
            self.diagnostics.publish(ResolverEvent::CacheHit {
                key: key.as_str().to_string(),
            });
            return Resolution::Handle(handle);
        }

        let gate = self.gate.clone();
        let fetcher = self.fetcher.clone();
        let producer_key = key.clone();
        let producer_reference = reference.to_string();
        let outcome = self
            .cache
            .resolve(key.clone(), move || async move {
                // One slot covers the whole attempt sequence, retries included.
                let _slot = gate.acquire().await?;
                let payload = fetcher.fetch(&producer_reference).await?;
                Ok(LocalHandle::new(producer_key, payload))
            })
            .await;

        match outcome {
            Ok(handle) => {
                debug!(key = %key, uri = handle.uri(), "reference resolved");
                self.diagnostics.publish(ResolverEvent::Resolved {
                    key: key.as_str().to_string(),
                    size_bytes: handle.payload().len(),
                });
                Resolution::Handle(handle)
            }
            Err(e) => {
                warn!(reference, error = %e, "resolution failed; serving fallback");
                self.diagnostics.publish(ResolverEvent::FallbackServed {
                    reference: reference.to_string(),
                    error: e.to_string(),
                });
                Resolution::Fallback(self.config.fallback_reference.clone())
            }
        }
    }

    /// Release every cached handle and clear all credential state. Used for
    /// full teardown, e.g. on logout or configuration change.
    pub fn invalidate_all(&self) {
        let released = self.cache.invalidate_all();
        self.credentials.invalidate();
        self.diagnostics.publish(ResolverEvent::Invalidated {
            released_handles: released,
        });
    }

    /// Subscribe to resolver diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticBus {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchOutcome;
    use assetgate_core::Error;
    use async_trait::async_trait;
    use bytes::Bytes;
    use regex::Regex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource;

    #[async_trait]
    impl CredentialSource for FixedSource {
        async fn issue(&self) -> Result<String> {
            Ok("token".to_string())
        }
    }

    struct CountingTransport {
        attempts: AtomicUsize,
        fail_with_404: bool,
    }

    #[async_trait]
    impl ResourceTransport for CountingTransport {
        async fn attempt(&self, reference: &str, _bearer: &str) -> Result<FetchOutcome> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_with_404 {
                return Err(Error::terminal(reference, "resource endpoint returned status 404"));
            }
            Ok(FetchOutcome::Success(Bytes::from_static(b"pixels")))
        }
    }

    fn protected_config() -> ResolverConfig {
        ResolverConfig {
            protected_hosts: Regex::new(r"^cdn\.example\.com$").unwrap(),
            ..ResolverConfig::default()
        }
    }

    fn resolver(fail_with_404: bool) -> (AssetResolver, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport {
            attempts: AtomicUsize::new(0),
            fail_with_404,
        });
        let resolver =
            AssetResolver::with_parts(protected_config(), Arc::new(FixedSource), transport.clone());
        (resolver, transport)
    }

    #[tokio::test]
    async fn unprotected_references_pass_through_untouched() {
        let (resolver, transport) = resolver(false);

        let outcome = resolver.resolve("https://public.example.org/logo.svg").await;
        assert!(matches!(outcome, Resolution::Passthrough(_)));
        assert_eq!(outcome.uri(), "https://public.example.org/logo.svg");
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);
        assert!(resolver.cache.is_empty());
    }

    #[tokio::test]
    async fn malformed_references_pass_through() {
        let (resolver, transport) = resolver(false);

        let outcome = resolver.resolve("not a url at all").await;
        assert!(matches!(outcome, Resolution::Passthrough(_)));
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn protected_reference_resolves_to_a_local_handle() {
        let (resolver, transport) = resolver(false);

        let outcome = resolver.resolve("https://cdn.example.com/a.jpg").await;
        let Resolution::Handle(handle) = outcome else {
            panic!("expected a handle");
        };
        assert!(handle.uri().starts_with("mem://asset/"));
        assert_eq!(handle.payload().as_ref(), b"pixels");
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);

        // Second request is served from cache with no new fetch.
        let again = resolver.resolve("https://cdn.example.com/a.jpg").await;
        assert_eq!(again.uri(), handle.uri());
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_become_fallback_and_a_diagnostic_event() {
        let (resolver, _transport) = resolver(true);
        let mut events = resolver.diagnostics().subscribe();

        let outcome = resolver.resolve("https://cdn.example.com/missing.jpg").await;
        assert!(matches!(outcome, Resolution::Fallback(_)));
        assert_eq!(outcome.uri(), "about:blank#asset-unavailable");

        match events.recv().await.unwrap() {
            ResolverEvent::FallbackServed { reference, error } => {
                assert_eq!(reference, "https://cdn.example.com/missing.jpg");
                assert!(error.contains("404"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalidate_all_releases_handles_and_refetches() {
        let (resolver, transport) = resolver(false);

        let first = resolver.resolve("https://cdn.example.com/a.jpg").await;
        let Resolution::Handle(handle) = first else {
            panic!("expected a handle");
        };

        resolver.invalidate_all();
        assert!(handle.is_released());

        let second = resolver.resolve("https://cdn.example.com/a.jpg").await;
        let Resolution::Handle(fresh) = second else {
            panic!("expected a handle");
        };
        assert_ne!(fresh.uri(), handle.uri());
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn new_requires_a_credential_endpoint() {
        let Err(err) = AssetResolver::new(protected_config()) else {
            panic!("construction must fail without a credential endpoint");
        };
        assert!(matches!(err, Error::Configuration { .. }));
    }
}

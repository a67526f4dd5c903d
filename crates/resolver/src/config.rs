//! Resolver configuration with environment-variable loading.
//!
//! All recognized options live in one struct handed to the resolver at
//! construction; nothing reads the environment after startup.

use assetgate_core::constants::{
    ASSETGATE_CREDENTIAL_ENDPOINT_VAR, ASSETGATE_DEFAULT_TTL_MS_VAR,
    ASSETGATE_FALLBACK_REFERENCE_VAR, ASSETGATE_GATE_CAPACITY_VAR, ASSETGATE_MAX_RETRIES_VAR,
    ASSETGATE_PROTECTED_HOSTS_VAR, ASSETGATE_REFRESH_BUFFER_MS_VAR,
    ASSETGATE_RETRY_BASE_DELAY_MS_VAR, DEFAULT_CREDENTIAL_TTL_MS, DEFAULT_FALLBACK_REFERENCE,
    DEFAULT_GATE_CAPACITY, DEFAULT_MAX_TRANSIENT_RETRIES, DEFAULT_REFRESH_BUFFER_MS,
    DEFAULT_RETRY_BASE_DELAY_MS,
};
use assetgate_core::{Error, Result};
use regex::Regex;
use std::time::Duration;
use url::Url;

/// Configuration for the resolution pipeline.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Pattern matched against the host of a reference to decide protection
    pub protected_hosts: Regex,
    /// Endpoint issuing bearer credentials; None leaves HTTP wiring to the caller
    pub credential_endpoint: Option<Url>,
    /// Maximum concurrent outbound fetches
    pub gate_capacity: usize,
    /// How long before expiry a credential is considered stale
    pub refresh_buffer: Duration,
    /// Credential lifetime assumed when the expiry claim is undecodable
    pub default_credential_ttl: Duration,
    /// Maximum attempts for retryable fetch failures
    pub max_transient_retries: u32,
    /// Base delay between retryable attempts; grows linearly per attempt
    pub retry_base_delay: Duration,
    /// Deterministic reference returned when resolution fails
    pub fallback_reference: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            // Matches nothing until configured, so every reference passes through.
            protected_hosts: Regex::new("$^").expect("static pattern is valid"),
            credential_endpoint: None,
            gate_capacity: DEFAULT_GATE_CAPACITY,
            refresh_buffer: Duration::from_millis(DEFAULT_REFRESH_BUFFER_MS),
            default_credential_ttl: Duration::from_millis(DEFAULT_CREDENTIAL_TTL_MS),
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            fallback_reference: DEFAULT_FALLBACK_REFERENCE.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Load configuration from `ASSETGATE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(pattern) = std::env::var(ASSETGATE_PROTECTED_HOSTS_VAR) {
            config.protected_hosts = Regex::new(&pattern).map_err(|e| {
                Error::configuration(format!(
                    "invalid {ASSETGATE_PROTECTED_HOSTS_VAR} pattern '{pattern}': {e}"
                ))
            })?;
        }

        if let Ok(endpoint) = std::env::var(ASSETGATE_CREDENTIAL_ENDPOINT_VAR) {
            let url = Url::parse(&endpoint).map_err(|e| {
                Error::configuration(format!(
                    "invalid {ASSETGATE_CREDENTIAL_ENDPOINT_VAR} '{endpoint}': {e}"
                ))
            })?;
            config.credential_endpoint = Some(url);
        }

        if let Ok(capacity_str) = std::env::var(ASSETGATE_GATE_CAPACITY_VAR) {
            if let Ok(capacity) = capacity_str.parse::<usize>() {
                if capacity == 0 {
                    return Err(Error::configuration(format!(
                        "{ASSETGATE_GATE_CAPACITY_VAR} must be at least 1"
                    )));
                }
                config.gate_capacity = capacity;
            }
        }

        if let Ok(buffer_str) = std::env::var(ASSETGATE_REFRESH_BUFFER_MS_VAR) {
            if let Ok(millis) = buffer_str.parse::<u64>() {
                config.refresh_buffer = Duration::from_millis(millis);
            }
        }

        if let Ok(ttl_str) = std::env::var(ASSETGATE_DEFAULT_TTL_MS_VAR) {
            if let Ok(millis) = ttl_str.parse::<u64>() {
                config.default_credential_ttl = Duration::from_millis(millis);
            }
        }

        if let Ok(retries_str) = std::env::var(ASSETGATE_MAX_RETRIES_VAR) {
            if let Ok(retries) = retries_str.parse::<u32>() {
                config.max_transient_retries = retries.max(1);
            }
        }

        if let Ok(delay_str) = std::env::var(ASSETGATE_RETRY_BASE_DELAY_MS_VAR) {
            if let Ok(millis) = delay_str.parse::<u64>() {
                config.retry_base_delay = Duration::from_millis(millis);
            }
        }

        if let Ok(fallback) = std::env::var(ASSETGATE_FALLBACK_REFERENCE_VAR) {
            config.fallback_reference = fallback;
        }

        Ok(config)
    }
}

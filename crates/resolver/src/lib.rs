//! Authenticated resource resolution and caching for `assetgate`.
//!
//! Given an opaque reference to a protected binary resource, this crate
//! produces a locally usable handle while managing the credential lifecycle,
//! bounding concurrent fan-out, deduplicating concurrent requests for the
//! same resource, and retrying recoverable failures.
//!
//! ## Key Components
//!
//! - **`config`**: The [`ResolverConfig`] struct, with defaults and an
//!   environment-variable loader.
//! - **`credentials`**: Short-lived bearer credential acquisition with
//!   single-flight refresh.
//! - **`gate`**: FIFO admission gate bounding concurrent outbound fetches.
//! - **`fetch`**: One authenticated retrieval attempt plus the retry policy.
//! - **`cache`**: Handle cache and in-flight registry.
//! - **`resolver`**: The public façade composing the pipeline.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod fetch;
pub mod gate;
pub mod resolver;

pub use cache::ResolutionCache;
pub use config::ResolverConfig;
pub use credentials::{Credential, CredentialManager, CredentialSource, HttpCredentialSource};
pub use fetch::{FetchOutcome, HttpTransport, ResourceFetcher, ResourceTransport, RetryPolicy};
pub use gate::{AdmissionGate, AdmissionSlot};
pub use resolver::{AssetResolver, Resolution};

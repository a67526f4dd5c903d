//! Domain newtypes for the resolution pipeline.

use crate::constants::LOCAL_HANDLE_SCHEME;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// Normalized identity of a protected reference.
///
/// Used as the lookup key for both the in-flight registry and the resolution
/// cache. Two spellings of the same underlying resource must normalize to the
/// same key, so normalization parses the reference as a URL when possible:
/// hosts are lowercased, default ports elided, and fragments dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Normalize a raw reference into a key.
    #[must_use]
    pub fn normalize(reference: &str) -> Self {
        match Url::parse(reference.trim()) {
            Ok(mut url) => {
                url.set_fragment(None);
                Self(url.to_string())
            }
            // References that are not URLs still deduplicate by exact spelling.
            Err(_) => Self(reference.trim().to_string()),
        }
    }

    /// The normalized key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct HandleInner {
    key: ResourceKey,
    uri: String,
    payload: Bytes,
    released: AtomicBool,
}

/// A process-local, revocable reference to a resolved binary payload.
///
/// Handles are cheaply clonable; all clones observe a single `release`.
/// Releasing drops nothing eagerly (clones may still hold the bytes) but
/// marks the handle revoked so consumers stop using it.
#[derive(Clone)]
pub struct LocalHandle {
    inner: Arc<HandleInner>,
}

impl LocalHandle {
    /// Wrap a fetched payload in a new handle with a process-unique URI.
    #[must_use]
    pub fn new(key: ResourceKey, payload: Bytes) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                key,
                uri: format!("{LOCAL_HANDLE_SCHEME}{}", Uuid::new_v4()),
                payload,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// The key this handle resolves.
    #[must_use]
    pub fn key(&self) -> &ResourceKey {
        &self.inner.key
    }

    /// The process-local URI handed to the rendering layer.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    /// The resolved payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.inner.payload
    }

    /// Revoke the handle. Idempotent; observed by every clone.
    pub fn release(&self) {
        self.inner.released.store(true, Ordering::SeqCst);
    }

    /// Whether the handle has been revoked.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHandle")
            .field("key", &self.inner.key)
            .field("uri", &self.inner.uri)
            .field("len", &self.inner.payload.len())
            .field("released", &self.is_released())
            .finish()
    }
}

//! Diagnostic events published at the resolver boundary.
//!
//! Pipeline failures are absorbed into a fallback handle rather than
//! propagated to the rendering layer, so this bus is how they stay
//! observable. Subscribers attach via a broadcast channel; publishing never
//! blocks and never fails the pipeline.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::error;

/// Structured events describing resolution outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResolverEvent {
    /// A reference did not match the protected-host pattern
    PassedThrough { reference: String },
    /// A cached handle satisfied the request without network activity
    CacheHit { key: String },
    /// A resolution completed and its handle entered the cache
    Resolved { key: String, size_bytes: usize },
    /// A resolution failed and the caller received the fallback handle
    FallbackServed { reference: String, error: String },
    /// All cached handles were released
    Invalidated { released_handles: usize },
}

/// Broadcast publisher for [`ResolverEvent`]s.
#[derive(Debug, Clone)]
pub struct DiagnosticBus {
    sender: broadcast::Sender<ResolverEvent>,
}

impl DiagnosticBus {
    /// Create a bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ResolverEvent) {
        if let Err(e) = self.sender.send(event) {
            // Only worth reporting when someone was supposed to be listening.
            if self.sender.receiver_count() > 0 {
                error!("failed to broadcast resolver event: {e}");
            }
        }
    }

    /// Subscribe to subsequent events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.sender.subscribe()
    }
}

impl Default for DiagnosticBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = DiagnosticBus::default();
        let mut rx = bus.subscribe();

        bus.publish(ResolverEvent::CacheHit {
            key: "https://cdn.example.com/a.png".to_string(),
        });

        match rx.recv().await.unwrap() {
            ResolverEvent::CacheHit { key } => {
                assert_eq!(key, "https://cdn.example.com/a.png");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let bus = DiagnosticBus::default();
        bus.publish(ResolverEvent::Invalidated {
            released_handles: 0,
        });
    }
}
